//! Criterion scores and their parsing from judge output

use serde::{Deserialize, Serialize};

use crate::{JudgeError, Result};

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;
pub const NEUTRAL_SCORE: u8 = 5;

/// One judge's scores for one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionScores {
    pub wit: u8,
    pub originality: u8,
    pub delivery: u8,
    pub impact: u8,
}

impl CriterionScores {
    pub fn new(wit: u8, originality: u8, delivery: u8, impact: u8) -> Self {
        Self {
            wit,
            originality,
            delivery,
            impact,
        }
    }

    pub fn neutral() -> Self {
        Self::new(NEUTRAL_SCORE, NEUTRAL_SCORE, NEUTRAL_SCORE, NEUTRAL_SCORE)
    }

    fn values(&self) -> [u8; 4] {
        [self.wit, self.originality, self.delivery, self.impact]
    }

    pub fn average(&self) -> f64 {
        self.values().iter().map(|v| *v as f64).sum::<f64>() / 4.0
    }

    pub fn validate(&self) -> Result<()> {
        for value in self.values() {
            if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                return Err(JudgeError::ScoreOutOfRange { value });
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawScorecard {
    side_a: CriterionScores,
    side_b: CriterionScores,
    #[serde(default)]
    reasoning: String,
}

/// Parsed judge reply: scores for both sides plus reasoning
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScores {
    pub side_a: CriterionScores,
    pub side_b: CriterionScores,
    pub reasoning: String,
}

/// Parse a judge reply
///
/// Models often wrap JSON in prose or code fences, so the outermost
/// `{...}` span is extracted first. Out-of-range scores reject the reply.
pub fn parse_scores(reply: &str) -> Result<ParsedScores> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(JudgeError::MalformedReply {
                message: "no JSON object in reply".to_string(),
            })
        }
    };

    let raw: RawScorecard = serde_json::from_str(json).map_err(|e| JudgeError::MalformedReply {
        message: e.to_string(),
    })?;
    raw.side_a.validate()?;
    raw.side_b.validate()?;

    Ok(ParsedScores {
        side_a: raw.side_a,
        side_b: raw.side_b,
        reasoning: raw.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average() {
        assert_eq!(CriterionScores::new(7, 8, 7, 8).average(), 7.5);
        assert_eq!(CriterionScores::neutral().average(), 5.0);
    }

    #[test]
    fn test_parse_clean_json() {
        let reply = r#"{"side_a": {"wit": 7, "originality": 8, "delivery": 6, "impact": 9},
                        "side_b": {"wit": 5, "originality": 5, "delivery": 5, "impact": 5},
                        "reasoning": "A landed harder"}"#;
        let parsed = parse_scores(reply).unwrap();
        assert_eq!(parsed.side_a, CriterionScores::new(7, 8, 6, 9));
        assert_eq!(parsed.reasoning, "A landed harder");
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = "Here you go:\n```json\n{\"side_a\": {\"wit\": 3, \"originality\": 4, \"delivery\": 5, \"impact\": 6}, \"side_b\": {\"wit\": 6, \"originality\": 5, \"delivery\": 4, \"impact\": 3}}\n```";
        let parsed = parse_scores(reply).unwrap();
        assert_eq!(parsed.side_b.wit, 6);
        assert!(parsed.reasoning.is_empty());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let reply = r#"{"side_a": {"wit": 11, "originality": 8, "delivery": 6, "impact": 9},
                        "side_b": {"wit": 5, "originality": 5, "delivery": 5, "impact": 5}}"#;
        assert!(matches!(
            parse_scores(reply),
            Err(JudgeError::ScoreOutOfRange { value: 11 })
        ));

        let reply = r#"{"side_a": {"wit": 0, "originality": 8, "delivery": 6, "impact": 9},
                        "side_b": {"wit": 5, "originality": 5, "delivery": 5, "impact": 5}}"#;
        assert!(parse_scores(reply).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_scores("I refuse to judge this"),
            Err(JudgeError::MalformedReply { .. })
        ));
        assert!(parse_scores(r#"{"side_a": "great"}"#).is_err());
    }
}
