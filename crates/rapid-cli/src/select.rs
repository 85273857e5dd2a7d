//! Narrowing a list of names or tags down to what the user meant.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Selections this large are refused rather than listed.
pub const NARROW_LIMIT: usize = 100;

/// Case-insensitive match of a search term against candidates.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// The candidate contains the (lowercased) term.
    Substring(String),
    /// The candidate matches the pattern anywhere.
    Regex(Regex),
}

impl Matcher {
    /// Build a matcher for `term`, as a regular expression if `regex` is set.
    ///
    /// # Errors
    ///
    /// Returns the parse error of an invalid pattern.
    pub fn new(term: &str, regex: bool) -> Result<Self, regex::Error> {
        if regex {
            RegexBuilder::new(term)
                .case_insensitive(true)
                .build()
                .map(Self::Regex)
        } else {
            Ok(Self::Substring(term.to_lowercase()))
        }
    }

    /// True if `candidate` is selected by this matcher.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Substring(term) => candidate.to_lowercase().contains(term.as_str()),
            Self::Regex(re) => re.is_match(candidate),
        }
    }
}

/// Answer to "which one do you mean?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Every listed candidate.
    All,
    /// The candidate at this zero-based index.
    One(usize),
    /// No usable answer.
    Cancel,
}

/// Asks the user to pick among several matches.
pub trait Chooser {
    /// Present `candidates` (all of one `noun`) and return the user's pick.
    fn choose(&self, noun: &str, candidates: &[String]) -> Choice;
}

/// Why a search term selected nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// Nothing matched.
    #[error("No {noun}s matching {term} found.")]
    NoMatch {
        /// What was searched, e.g. `tag`.
        noun: String,
        /// The search term.
        term: String,
    },

    /// Too many matches to list.
    #[error("{NARROW_LIMIT} or more matching {noun}s found, please narrow your search.")]
    TooMany {
        /// What was searched.
        noun: String,
    },

    /// The user did not pick a valid entry.
    #[error("no {noun} selected")]
    Cancelled {
        /// What was searched.
        noun: String,
    },
}

/// Candidates from `haystack` matching `term`, asking `chooser` when there
/// is more than one.
///
/// # Errors
///
/// See [`SelectError`].
pub fn select<I, S>(
    noun: &str,
    term: &str,
    matcher: &Matcher,
    haystack: I,
    chooser: &dyn Chooser,
) -> Result<Vec<String>, SelectError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected: Vec<String> = haystack
        .into_iter()
        .filter(|candidate| matcher.matches(candidate.as_ref()))
        .map(|candidate| candidate.as_ref().to_string())
        .collect();

    match selected.len() {
        0 => Err(SelectError::NoMatch {
            noun: noun.to_string(),
            term: term.to_string(),
        }),
        1 => Ok(selected),
        n if n >= NARROW_LIMIT => Err(SelectError::TooMany {
            noun: noun.to_string(),
        }),
        _ => match chooser.choose(noun, &selected) {
            Choice::All => Ok(selected),
            Choice::One(index) if index < selected.len() => {
                Ok(vec![selected.swap_remove(index)])
            }
            Choice::One(_) | Choice::Cancel => Err(SelectError::Cancelled {
                noun: noun.to_string(),
            }),
        },
    }
}

/// Parse a typed answer: `all`, or a one-based index.
pub fn parse_choice(answer: &str) -> Choice {
    let answer = answer.trim();
    if answer == "all" {
        return Choice::All;
    }
    match answer.parse::<usize>() {
        Ok(n) if n >= 1 => Choice::One(n - 1),
        _ => Choice::Cancel,
    }
}
