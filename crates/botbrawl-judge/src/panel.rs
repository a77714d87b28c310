//! The judge panel

use std::sync::Arc;

use botbrawl_llm::{CompletionProvider, CompletionRequest};
use botbrawl_types::{JudgeConfig, Side};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scores::{parse_scores, CriterionScores};
use crate::{JudgeError, Result};

/// Reasoning recorded when a judge could not produce usable scores
pub const FALLBACK_REASONING: &str = "unable to score";

/// A judge persona: a name and the criteria it leans on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgePersona {
    pub name: String,
    pub emphasis: String,
}

impl JudgePersona {
    pub fn new(name: impl Into<String>, emphasis: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emphasis: emphasis.into(),
        }
    }

    /// The standing three-judge lineup
    pub fn default_panel() -> Vec<JudgePersona> {
        vec![
            JudgePersona::new(
                "The Critic",
                "You reward wit and originality above all; recycled jokes score low.",
            ),
            JudgePersona::new(
                "The Showman",
                "You care about delivery and rhythm; a clumsy line loses points however clever.",
            ),
            JudgePersona::new(
                "The Crowd",
                "You judge impact: which response would get the loudest reaction from a live audience.",
            ),
        ]
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are {name}, a judge in an underground AI battle. {emphasis}\n\
             Score each side on wit, originality, delivery and impact, each an integer from 1 to 10.\n\
             Reply with JSON only:\n\
             {{\"side_a\": {{\"wit\": n, \"originality\": n, \"delivery\": n, \"impact\": n}}, \
             \"side_b\": {{\"wit\": n, \"originality\": n, \"delivery\": n, \"impact\": n}}, \
             \"reasoning\": \"one or two sentences\"}}",
            name = self.name,
            emphasis = self.emphasis,
        )
    }
}

/// One judge's verdict on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub judge: String,
    pub side_a: CriterionScores,
    pub side_b: CriterionScores,
    pub reasoning: String,
    /// Neutral scores substituted for a failed call
    pub fallback: bool,
}

impl Scorecard {
    fn neutral(judge: &str) -> Self {
        Self {
            judge: judge.to_string(),
            side_a: CriterionScores::neutral(),
            side_b: CriterionScores::neutral(),
            reasoning: FALLBACK_REASONING.to_string(),
            fallback: true,
        }
    }
}

/// Aggregated panel result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelVerdict {
    pub scorecards: Vec<Scorecard>,
    pub average_a: f64,
    pub average_b: f64,
    /// `None` is a draw
    pub winner: Option<Side>,
}

impl PanelVerdict {
    /// Aggregate scorecards: per judge per side average of the four criteria,
    /// then the mean across judges
    pub fn aggregate(scorecards: Vec<Scorecard>, draw_threshold: f64) -> Self {
        let judges = scorecards.len().max(1) as f64;
        let average_a = scorecards.iter().map(|s| s.side_a.average()).sum::<f64>() / judges;
        let average_b = scorecards.iter().map(|s| s.side_b.average()).sum::<f64>() / judges;

        Self {
            winner: decide(average_a, average_b, draw_threshold),
            scorecards,
            average_a,
            average_b,
        }
    }

    pub fn fallback_count(&self) -> usize {
        self.scorecards.iter().filter(|s| s.fallback).count()
    }
}

/// Averages closer than `draw_threshold` are a draw; otherwise the higher wins
pub fn decide(average_a: f64, average_b: f64, draw_threshold: f64) -> Option<Side> {
    if (average_a - average_b).abs() < draw_threshold {
        None
    } else if average_a > average_b {
        Some(Side::A)
    } else {
        Some(Side::B)
    }
}

/// The two responses under judgement
#[derive(Debug, Clone)]
pub struct JudgeInput<'a> {
    pub brief: &'a str,
    pub response_a: &'a str,
    pub response_b: &'a str,
}

/// A fixed panel of independently prompted judges
pub struct JudgePanel {
    provider: Arc<dyn CompletionProvider>,
    personas: Vec<JudgePersona>,
    config: JudgeConfig,
}

impl JudgePanel {
    /// Panel of `config.panel_size` judges drawn from the default lineup
    pub fn new(provider: Arc<dyn CompletionProvider>, config: JudgeConfig) -> Self {
        let lineup = JudgePersona::default_panel();
        let personas = lineup
            .iter()
            .cycle()
            .take(config.panel_size.max(1))
            .enumerate()
            .map(|(i, persona)| {
                if i < lineup.len() {
                    persona.clone()
                } else {
                    JudgePersona::new(format!("{} #{}", persona.name, i + 1), persona.emphasis.clone())
                }
            })
            .collect();

        Self {
            provider,
            personas,
            config,
        }
    }

    pub fn with_personas(mut self, personas: Vec<JudgePersona>) -> Self {
        self.personas = personas;
        self
    }

    pub fn personas(&self) -> &[JudgePersona] {
        &self.personas
    }

    /// Run every judge in parallel and aggregate
    ///
    /// Never fails: a judge that errors, times out or replies with unusable
    /// scores contributes neutral scores instead.
    pub async fn judge(&self, input: JudgeInput<'_>) -> PanelVerdict {
        let input = &input;
        let calls = self.personas.iter().map(|persona| async move {
            match self.score_once(persona, input).await {
                Ok(card) => card,
                Err(err) => {
                    warn!(judge = %persona.name, error = %err, "Judge failed, using neutral scores");
                    Scorecard::neutral(&persona.name)
                }
            }
        });
        let scorecards = join_all(calls).await;

        let verdict = PanelVerdict::aggregate(scorecards, self.config.draw_threshold);
        info!(
            average_a = verdict.average_a,
            average_b = verdict.average_b,
            winner = ?verdict.winner,
            fallbacks = verdict.fallback_count(),
            "Judge panel verdict"
        );
        verdict
    }

    async fn score_once(&self, persona: &JudgePersona, input: &JudgeInput<'_>) -> Result<Scorecard> {
        let request = CompletionRequest::prompt(
            persona.system_prompt(),
            format!(
                "Challenge: {}\n\nSide A:\n{}\n\nSide B:\n{}",
                input.brief, input.response_a, input.response_b
            ),
        )
        .with_temperature(0.3)
        .with_json_mode();

        let timeout = self.config.call_timeout();
        let response = tokio::time::timeout(timeout, self.provider.complete(request))
            .await
            .map_err(|_| JudgeError::Timeout {
                seconds: timeout.as_secs(),
            })??;

        let parsed = parse_scores(&response.content)?;
        Ok(Scorecard {
            judge: persona.name.clone(),
            side_a: parsed.side_a,
            side_b: parsed.side_b,
            reasoning: parsed.reasoning,
            fallback: false,
        })
    }
}
