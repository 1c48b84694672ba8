//! User feedback on assistant replies
//!
//! Feedback is appended to a CSV log with every field quoted, so question and
//! answer text may contain commas, quotes or newlines.

pub mod store;

pub use store::{CsvFeedbackLog, FeedbackStore, FEEDBACK_HEADER};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Thumbs up or thumbs down on one reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Good,
    Bad,
}

impl Feedback {
    /// Both choices, in the order they are offered to the user
    pub const ALL: [Feedback; 2] = [Feedback::Good, Feedback::Bad];

    /// Label written to the log
    pub fn label(&self) -> &'static str {
        match self {
            Feedback::Good => "Good",
            Feedback::Bad => "Bad",
        }
    }

    /// Label shown in prompts
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Feedback::Good => "👍 Good",
            Feedback::Bad => "👎 Bad",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Feedback {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .trim_start_matches(['👍', '👎'])
            .trim()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "good" | "up" | "+" => Ok(Feedback::Good),
            "bad" | "down" | "-" => Ok(Feedback::Bad),
            _ => Err(crate::Error::Validation(format!(
                "unknown feedback '{}', expected 'good' or 'bad'",
                s
            ))),
        }
    }
}

/// One submitted feedback row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// User question the reply answered
    pub question: String,
    /// Assistant reply being rated
    pub response: String,
    /// The rating
    pub feedback: Feedback,
}

impl FeedbackRecord {
    pub fn new(
        question: impl Into<String>,
        response: impl Into<String>,
        feedback: Feedback,
    ) -> Self {
        Self {
            question: question.into(),
            response: response.into(),
            feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feedback() {
        assert_eq!("good".parse::<Feedback>().unwrap(), Feedback::Good);
        assert_eq!(" Bad ".parse::<Feedback>().unwrap(), Feedback::Bad);
        assert_eq!("👍 Good".parse::<Feedback>().unwrap(), Feedback::Good);
        assert_eq!("👎 Bad".parse::<Feedback>().unwrap(), Feedback::Bad);
        assert!("meh".parse::<Feedback>().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Feedback::Good.to_string(), "Good");
        assert_eq!(Feedback::Bad.prompt_label(), "👎 Bad");
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Feedback::Good).unwrap(), "\"good\"");
        let parsed: Feedback = serde_json::from_str("\"bad\"").unwrap();
        assert_eq!(parsed, Feedback::Bad);
    }
}
