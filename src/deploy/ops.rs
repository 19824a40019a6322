//! Step operation taxonomy and presentation.
//!
//! The string tokens, prefixes, and past-tense forms here are parsed by
//! external tools and must not change shape.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ANSI color specs for rendered step lines.
mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const FAINT: &str = "\x1b[2m";
    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
}

/// The operation performed by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepOp {
    /// Nothing to do.
    Same,
    /// Creating a new resource.
    Create,
    /// Updating an existing resource.
    Update,
    /// Deleting an existing resource.
    Delete,
    /// Replacing a resource with a new one.
    Replace,
    /// Creating a new resource for a replacement.
    CreateReplacement,
    /// Deleting an existing resource after replacement.
    DeleteReplaced,
    /// Reading an existing resource.
    Read,
    /// Reading an existing resource for a replacement.
    ReadReplacement,
    /// Refreshing an existing resource.
    Refresh,
    /// Removing a resource that was read.
    Discard,
    /// Discarding a read resource that was replaced.
    DiscardReplaced,
    /// Removing a pending-replace resource from state.
    RemovePendingReplace,
    /// Importing an existing resource.
    Import,
    /// Replacing an existing resource with an imported one.
    ImportReplacement,
}

/// All step operations, in display order.
pub const ALL_OPS: [StepOp; 15] = [
    StepOp::Same,
    StepOp::Create,
    StepOp::Update,
    StepOp::Delete,
    StepOp::Replace,
    StepOp::CreateReplacement,
    StepOp::DeleteReplaced,
    StepOp::Read,
    StepOp::ReadReplacement,
    StepOp::Refresh,
    StepOp::Discard,
    StepOp::DiscardReplaced,
    StepOp::RemovePendingReplace,
    StepOp::Import,
    StepOp::ImportReplacement,
];

impl StepOp {
    /// The canonical string token for this operation.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::CreateReplacement => "create-replacement",
            Self::DeleteReplaced => "delete-replaced",
            Self::Read => "read",
            Self::ReadReplacement => "read-replacement",
            Self::Refresh => "refresh",
            Self::Discard => "discard",
            Self::DiscardReplaced => "discard-replaced",
            Self::RemovePendingReplace => "remove-pending-replace",
            Self::Import => "import",
            Self::ImportReplacement => "import-replacement",
        }
    }

    /// A suggested color for lines of this op type.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Same | Self::RemovePendingReplace => ansi::FAINT,
            Self::Create | Self::CreateReplacement | Self::Import => ansi::GREEN,
            Self::Delete | Self::DeleteReplaced | Self::Discard | Self::DiscardReplaced => {
                ansi::RED
            }
            Self::Update | Self::Refresh => ansi::YELLOW,
            Self::Replace | Self::ReadReplacement | Self::ImportReplacement => ansi::MAGENTA,
            Self::Read => ansi::CYAN,
        }
    }

    /// A suggested color for lines of this op type that are still
    /// progressing.
    #[must_use]
    pub fn color_progress(self) -> String {
        format!("{}{}", ansi::BOLD, self.color())
    }

    /// A colored prefix for lines of this op type.
    #[must_use]
    pub fn prefix(self, done: bool) -> String {
        let color = if done {
            self.color().to_string()
        } else {
            self.color_progress()
        };
        format!("{color}{}", self.raw_prefix())
    }

    /// The uncolorized prefix text.
    #[must_use]
    pub const fn raw_prefix(self) -> &'static str {
        match self {
            Self::Same => "  ",
            Self::Create => "+ ",
            Self::Delete => "- ",
            Self::Update | Self::Refresh => "~ ",
            Self::Replace => "+-",
            Self::CreateReplacement => "++",
            Self::DeleteReplaced => "--",
            Self::Read => "> ",
            Self::ReadReplacement => ">>",
            Self::Discard => "< ",
            Self::DiscardReplaced => "<<",
            Self::RemovePendingReplace => "~ ",
            Self::Import => "= ",
            Self::ImportReplacement => "=>",
        }
    }

    /// The control suffix appended after a rendered line.
    ///
    /// Updates and replacements colorize entire lines, so every op
    /// terminates with a reset.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        ansi::RESET
    }

    /// The past-tense form of this operation.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Same => "samed",
            Self::Create => "created",
            Self::Update => "updated",
            Self::Replace => "replaced",
            Self::CreateReplacement => "create-replacementd",
            Self::ReadReplacement => "read-replacementd",
            Self::Refresh => "refreshed",
            Self::Read => "read",
            Self::Discard | Self::DiscardReplaced => "discarded",
            Self::Delete | Self::DeleteReplaced => "deleted",
            Self::Import | Self::ImportReplacement => "imported",
            Self::RemovePendingReplace => "removed",
        }
    }

    /// Returns true if this operation is no more impactful than the
    /// constraint, under a user-imposed mode restriction.
    #[must_use]
    pub fn constrained_to(self, constraint: Self) -> bool {
        match constraint {
            Self::Same
            | Self::Delete
            | Self::Read
            | Self::ReadReplacement
            | Self::Refresh
            | Self::Discard
            | Self::DiscardReplaced
            | Self::RemovePendingReplace
            | Self::Import
            | Self::ImportReplacement => self == constraint,
            Self::Create => matches!(self, Self::Same | Self::Create),
            Self::Update => matches!(self, Self::Same | Self::Update),
            Self::Replace | Self::CreateReplacement | Self::DeleteReplaced => {
                matches!(self, Self::Same | Self::Update) || self == constraint
            }
        }
    }
}

impl fmt::Display for StepOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_stable() {
        let tokens: Vec<&str> = ALL_OPS.iter().map(|op| op.token()).collect();
        assert_eq!(
            tokens,
            vec![
                "same",
                "create",
                "update",
                "delete",
                "replace",
                "create-replacement",
                "delete-replaced",
                "read",
                "read-replacement",
                "refresh",
                "discard",
                "discard-replaced",
                "remove-pending-replace",
                "import",
                "import-replacement",
            ]
        );
    }

    #[test]
    fn test_raw_prefixes_are_stable() {
        let prefixes: Vec<&str> = ALL_OPS.iter().map(|op| op.raw_prefix()).collect();
        assert_eq!(
            prefixes,
            vec![
                "  ", "+ ", "~ ", "- ", "+-", "++", "--", "> ", ">>", "~ ", "< ", "<<", "~ ",
                "= ", "=>",
            ]
        );
    }

    #[test]
    fn test_presentation_is_nonempty_for_every_op() {
        for op in ALL_OPS {
            assert!(!op.token().is_empty());
            assert!(!op.color().is_empty());
            assert!(!op.raw_prefix().is_empty());
            assert!(!op.suffix().is_empty());
            assert!(!op.past_tense().is_empty());
            assert!(!op.prefix(true).is_empty());
            assert!(!op.color_progress().is_empty());
        }
    }

    #[test]
    fn test_past_tense_concatenation_forms() {
        assert_eq!(StepOp::Same.past_tense(), "samed");
        assert_eq!(StepOp::CreateReplacement.past_tense(), "create-replacementd");
        assert_eq!(StepOp::Read.past_tense(), "read");
        assert_eq!(StepOp::DeleteReplaced.past_tense(), "deleted");
    }

    #[test]
    fn test_constrained_to_table() {
        use StepOp::{
            Create, CreateReplacement, Delete, DeleteReplaced, Discard, DiscardReplaced, Import,
            ImportReplacement, Read, ReadReplacement, Refresh, RemovePendingReplace, Replace,
            Same, Update,
        };

        let exact_only = [
            Same,
            Delete,
            Read,
            ReadReplacement,
            Refresh,
            Discard,
            DiscardReplaced,
            RemovePendingReplace,
            Import,
            ImportReplacement,
        ];
        for constraint in ALL_OPS {
            for op in ALL_OPS {
                let expected = if exact_only.contains(&constraint) {
                    op == constraint
                } else {
                    match constraint {
                        Create => matches!(op, Same | Create),
                        Update => matches!(op, Same | Update),
                        Replace | CreateReplacement | DeleteReplaced => {
                            matches!(op, Same | Update) || op == constraint
                        }
                        _ => unreachable!("constraint covered above"),
                    }
                };
                assert_eq!(
                    op.constrained_to(constraint),
                    expected,
                    "op {op} constrained to {constraint}"
                );
            }
        }
    }
}
