//! Content moderation contract
//!
//! The classifier itself is external. BotBrawl only needs a pass/fail and a
//! possibly redacted text, and keeps the original text when the classifier
//! is unavailable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

/// Classifier verdict on a piece of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moderation {
    pub safe: bool,
    /// Text to publish; redacted when `safe` is false
    pub text: String,
}

#[async_trait]
pub trait ContentModerator: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<Moderation>;
}

/// Accepts everything unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughModerator;

#[async_trait]
impl ContentModerator for PassthroughModerator {
    async fn moderate(&self, text: &str) -> Result<Moderation> {
        Ok(Moderation {
            safe: true,
            text: text.to_string(),
        })
    }
}

/// Moderate `text`, failing open when the classifier errors
pub async fn moderate_or_pass(moderator: &dyn ContentModerator, text: &str) -> Moderation {
    match moderator.moderate(text).await {
        Ok(moderation) => moderation,
        Err(err) => {
            warn!(error = %err, "Moderation unavailable, publishing text unmodified");
            Moderation {
                safe: true,
                text: text.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JudgeError;

    struct BrokenModerator;

    #[async_trait]
    impl ContentModerator for BrokenModerator {
        async fn moderate(&self, _text: &str) -> Result<Moderation> {
            Err(JudgeError::ModerationFailed {
                message: "classifier offline".to_string(),
            })
        }
    }

    struct Redactor;

    #[async_trait]
    impl ContentModerator for Redactor {
        async fn moderate(&self, text: &str) -> Result<Moderation> {
            Ok(Moderation {
                safe: !text.contains("slur"),
                text: text.replace("slur", "****"),
            })
        }
    }

    #[tokio::test]
    async fn test_passthrough() {
        let result = moderate_or_pass(&PassthroughModerator, "hello").await;
        assert!(result.safe);
        assert_eq!(result.text, "hello");
    }

    #[tokio::test]
    async fn test_fails_open() {
        let result = moderate_or_pass(&BrokenModerator, "raw text").await;
        assert!(result.safe);
        assert_eq!(result.text, "raw text");
    }

    #[tokio::test]
    async fn test_redaction_is_kept() {
        let result = moderate_or_pass(&Redactor, "a slur here").await;
        assert!(!result.safe);
        assert_eq!(result.text, "a **** here");
    }
}
