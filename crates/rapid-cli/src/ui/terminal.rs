//! Questions and warnings on stdin/stdout.

use std::io::{self, BufRead, Write};

use crossterm::style::Stylize;
use rapid_core::Interaction;

use crate::select::{Choice, Chooser, parse_choice};

/// Line-based prompts. With `assume_yes`, confirmations are answered
/// without reading stdin; choices still are asked.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
    assume_yes: bool,
}

impl Terminal {
    /// A terminal answering confirmations itself if `assume_yes`.
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    fn ask(prompt: &str) -> Option<String> {
        print!("{prompt}");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

impl Interaction for Terminal {
    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            println!("{question} [y/N] y");
            return true;
        }
        Self::ask(&format!("{question} [y/N] "))
            .is_some_and(|answer| is_yes(&answer))
    }

    fn important_warning(&self, lines: &[String]) {
        for line in lines {
            println!("{}", line.as_str().yellow().bold());
        }
    }
}

impl Chooser for Terminal {
    fn choose(&self, noun: &str, candidates: &[String]) -> Choice {
        println!("Multiple {noun}s found:");
        for (i, candidate) in candidates.iter().enumerate() {
            println!("{:2}.  {candidate}", i + 1);
        }
        Self::ask(&format!("Which {noun} do you mean? (enter number or 'all')   "))
            .map_or(Choice::Cancel, |answer| parse_choice(&answer))
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
