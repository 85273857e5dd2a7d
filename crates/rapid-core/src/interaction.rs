//! Confirmation hook for destructive operations.

use tracing::warn;

/// Asks the user before irreversible steps.
pub trait Interaction {
    /// Ask a yes/no question.
    fn confirm(&self, question: &str) -> bool;

    /// Show a warning the user should read before confirming.
    fn important_warning(&self, lines: &[String]);
}

/// Answers every question with a fixed reply and sends warnings to the log.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Interaction for FixedAnswer {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }

    fn important_warning(&self, lines: &[String]) {
        for line in lines {
            warn!("{line}");
        }
    }
}
