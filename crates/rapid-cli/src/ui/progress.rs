//! Single-line download progress bar on stderr.

use std::io::{Write, stderr};
use std::sync::atomic::{AtomicU64, Ordering};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::tty::IsTty;
use rapid_core::Progress;

use super::format_size;

const WIDTH: usize = 40;

/// Redraws whenever the whole percentage changes. Draws nothing when
/// stderr is not a terminal.
#[derive(Debug)]
pub struct ProgressBar {
    done: AtomicU64,
    maximum: AtomicU64,
    /// Last drawn percentage plus one; zero before the first draw.
    drawn: AtomicU64,
    enabled: bool,
}

impl ProgressBar {
    /// A bar that draws if stderr is a terminal.
    pub fn new() -> Self {
        Self::with_output(stderr().is_tty())
    }

    fn with_output(enabled: bool) -> Self {
        Self {
            done: AtomicU64::new(0),
            maximum: AtomicU64::new(0),
            drawn: AtomicU64::new(0),
            enabled,
        }
    }

    /// End the bar's line, if anything was drawn.
    pub fn finish(&self) {
        if self.enabled && self.drawn.load(Ordering::Relaxed) > 0 {
            eprintln!();
        }
    }

    fn draw(&self) {
        let done = self.done.load(Ordering::Relaxed);
        let maximum = self.maximum.load(Ordering::Relaxed);
        let percent = percent(done, maximum);
        if self.drawn.swap(percent + 1, Ordering::Relaxed) == percent + 1 {
            return;
        }

        let mut err = stderr();
        let drawn = err
            .queue(MoveToColumn(0))
            .and_then(|e| e.queue(Clear(ClearType::CurrentLine)))
            .and_then(|e| e.queue(Print(render(done, maximum))))
            .and_then(|e| e.flush());
        if let Err(e) = drawn {
            tracing::debug!("progress bar: {e}");
        }
    }
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for ProgressBar {
    fn advance(&self, bytes: u64) {
        self.done.fetch_add(bytes, Ordering::Relaxed);
        if self.enabled {
            self.draw();
        }
    }

    fn set_maximum(&self, bytes: u64) {
        self.maximum.store(bytes, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn maximum(&self) -> u64 {
        self.maximum.load(Ordering::Relaxed)
    }
}

fn percent(done: u64, maximum: u64) -> u64 {
    if maximum == 0 {
        return 100;
    }
    done.min(maximum) * 100 / maximum
}

/// One line of bar: `[####    ]  50%  1.0 KiB / 2.0 KiB`.
fn render(done: u64, maximum: u64) -> String {
    let percent = percent(done, maximum);
    let filled = (percent as usize * WIDTH) / 100;
    format!(
        "[{}{}] {percent:>3}%  {} / {}",
        "#".repeat(filled),
        " ".repeat(WIDTH - filled),
        format_size(done.min(maximum)),
        format_size(maximum),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let line = render(1024, 2048);
        assert!(line.starts_with(&format!("[{}{}]", "#".repeat(20), " ".repeat(20))));
        assert!(line.contains(" 50%"));
        assert!(line.ends_with("1.0 KiB / 2.0 KiB"));
    }

    #[test]
    fn test_render_clamps_overshoot() {
        assert!(render(10, 5).contains("100%"));
        assert!(render(0, 0).contains("100%"));
    }

    #[test]
    fn test_draws_once_per_percent() {
        let bar = ProgressBar::with_output(true);
        bar.set_maximum(1000);
        bar.advance(500);
        assert_eq!(bar.drawn.load(Ordering::Relaxed), 51);
        bar.advance(1);
        assert_eq!(bar.drawn.load(Ordering::Relaxed), 51);
        bar.finish();
    }

    #[test]
    fn test_set_maximum_restarts() {
        let bar = ProgressBar::with_output(false);
        bar.set_maximum(10);
        bar.advance(10);
        bar.set_maximum(20);
        assert_eq!(bar.done.load(Ordering::Relaxed), 0);
        assert_eq!(bar.maximum(), 20);
    }
}
