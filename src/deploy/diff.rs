//! Input diffing and ignore-changes plumbing.
//!
//! The step generator owns diff policy; the engine only needs a structural
//! comparison of inputs for Update and Import display, plus the hook that
//! rolls ignored property paths back to their old values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepError};
use crate::resource::PropertyMap;

/// How a single property changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyDiffKind {
    /// The property was added.
    Add,
    /// The property's value changed.
    Update,
    /// The property was removed.
    Delete,
}

/// The structured diff for one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    /// How the property changed.
    pub kind: PropertyDiffKind,
}

/// Result of diffing a resource's inputs.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// True if any property differs.
    pub changes: bool,
    /// The keys that differ, in order.
    pub changed_keys: Vec<String>,
    /// Per-property structured diff.
    pub detailed_diff: BTreeMap<String, PropertyDiff>,
}

/// Computes the structural diff between old and new inputs.
#[must_use]
pub fn diff_inputs(olds: &PropertyMap, news: &PropertyMap) -> DiffResult {
    let changed_keys = news.changed_keys(olds);
    let mut detailed_diff = BTreeMap::new();
    for key in &changed_keys {
        let kind = match (olds.get(key), news.get(key)) {
            (None, Some(_)) => PropertyDiffKind::Add,
            (Some(_), None) => PropertyDiffKind::Delete,
            _ => PropertyDiffKind::Update,
        };
        detailed_diff.insert(key.clone(), PropertyDiff { kind });
    }
    DiffResult {
        changes: !changed_keys.is_empty(),
        changed_keys,
        detailed_diff,
    }
}

/// Rolls ignored property paths in `new_inputs` back to their old values.
///
/// A path present in the old inputs is copied over; a path absent from the
/// old inputs is removed from the new ones.
///
/// # Errors
///
/// Returns [`StepError::InvalidPropertyPath`] if a path descends through a
/// non-object value.
pub fn process_ignore_changes(
    new_inputs: &PropertyMap,
    old_inputs: &PropertyMap,
    ignore_changes: &[String],
) -> Result<PropertyMap> {
    let mut processed = new_inputs.clone();
    for path in ignore_changes {
        let applied = match old_inputs.get_path(path) {
            Some(value) => processed.set_path(path, value.clone()),
            None => processed.remove_path(path),
        };
        if !applied {
            return Err(StepError::InvalidPropertyPath { path: path.clone() });
        }
    }
    Ok(processed)
}
