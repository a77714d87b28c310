//! BotBrawl Judge - AI judging for underground battles
//!
//! A panel of independently prompted judges scores both responses on four
//! criteria (wit, originality, delivery, impact; integers 1-10). The panel
//! verdict is the mean of per-judge averages, with a draw when the two sides
//! land within the configured threshold.
//!
//! Judging never fails outright: a judge that errors, times out or returns
//! unusable output is replaced by neutral scores (all 5s).
//!
//! This crate also defines the [`ContentModerator`] contract used before a
//! generated response is published.

mod moderation;
mod panel;
mod scores;

pub use moderation::{moderate_or_pass, ContentModerator, Moderation, PassthroughModerator};
pub use panel::{
    decide, JudgeInput, JudgePanel, JudgePersona, PanelVerdict, Scorecard, FALLBACK_REASONING,
};
pub use scores::{parse_scores, CriterionScores, ParsedScores, MAX_SCORE, MIN_SCORE, NEUTRAL_SCORE};

use botbrawl_llm::LlmError;
use botbrawl_types::BrawlError;
use thiserror::Error;

/// Errors from a single judge call or a moderation call
#[derive(Error, Debug, Clone)]
pub enum JudgeError {
    #[error("Malformed judge reply: {message}")]
    MalformedReply { message: String },

    #[error("Score {value} outside 1-10")]
    ScoreOutOfRange { value: u8 },

    #[error("Judge timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Moderation failed: {message}")]
    ModerationFailed { message: String },

    #[error(transparent)]
    Provider(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, JudgeError>;

impl From<JudgeError> for BrawlError {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::Timeout { .. } => BrawlError::DependencyTimeout {
                service: "judge".to_string(),
            },
            JudgeError::Provider(err) => err.into(),
            JudgeError::ModerationFailed { message } => BrawlError::DependencyFailed {
                service: "moderation".to_string(),
                reason: message,
            },
            other => BrawlError::DependencyFailed {
                service: "judge".to_string(),
                reason: other.to_string(),
            },
        }
    }
}
