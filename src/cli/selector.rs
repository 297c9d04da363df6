//! Step selector typed at the prompt or passed with `--step`

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Marker that extends a selection to every later step
pub const RUN_TO_END_MARKER: char = '*';

/// Which steps to run: one index, optionally through to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSelector {
    pub index: usize,
    pub to_end: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Please enter a step number, not gibberish.")]
pub struct SelectorError;

impl FromStr for StepSelector {
    type Err = SelectorError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (digits, to_end) = match input.strip_suffix(RUN_TO_END_MARKER) {
            Some(digits) => (digits.trim_end(), true),
            None => (input, false),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(SelectorError);
        }

        let index = digits.parse().map_err(|_| SelectorError)?;
        Ok(Self { index, to_end })
    }
}

impl fmt::Display for StepSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.to_end {
            write!(f, "{}{}", self.index, RUN_TO_END_MARKER)
        } else {
            write!(f, "{}", self.index)
        }
    }
}
