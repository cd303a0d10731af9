//! Rubric grading of clinician questions.
//!
//! The generator is asked for a JSON verdict with five 0-5 scores. Output
//! that cannot be parsed degrades to a neutral [`Evaluation::fallback`]
//! rather than an error, since grading is advisory.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use medsim_rag::RetrievalResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::TextGenerator;
use crate::error::Result;
use crate::prompt::evaluation_prompt;

/// Temperature used for grading.
pub const EVALUATION_TEMPERATURE: f32 = 0.1;

/// One rubric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Relevance,
    DiagnosticUtility,
    ClaritySpecificity,
    EmpathyProfessionalism,
    HipaaEthics,
}

impl Criterion {
    /// Every criterion in display order.
    pub const ALL: [Criterion; 5] = [
        Self::Relevance,
        Self::DiagnosticUtility,
        Self::ClaritySpecificity,
        Self::EmpathyProfessionalism,
        Self::HipaaEthics,
    ];

    /// JSON key of the criterion.
    pub fn key(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::DiagnosticUtility => "diagnostic_utility",
            Self::ClaritySpecificity => "clarity_specificity",
            Self::EmpathyProfessionalism => "empathy_professionalism",
            Self::HipaaEthics => "hipaa_ethics",
        }
    }

    /// Weight in [`Evaluation::overall`].
    pub fn weight(self) -> f32 {
        match self {
            Self::Relevance | Self::DiagnosticUtility => 0.30,
            Self::ClaritySpecificity => 0.20,
            Self::EmpathyProfessionalism | Self::HipaaEthics => 0.10,
        }
    }

    /// Human-readable label, e.g. `Diagnostic Utility`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Relevance => "Relevance",
            Self::DiagnosticUtility => "Diagnostic Utility",
            Self::ClaritySpecificity => "Clarity & Specificity",
            Self::EmpathyProfessionalism => "Empathy & Professionalism",
            Self::HipaaEthics => "HIPAA & Ethics",
        }
    }
}

/// Qualitative bucket for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    Excellent,
    Good,
    NeedsFocus,
    OffTrack,
}

impl Band {
    /// ≥4.5 excellent, ≥3.5 good, ≥2.5 needs focus, otherwise off-track.
    pub fn from_score(score: f32) -> Self {
        if score >= 4.5 {
            Self::Excellent
        } else if score >= 3.5 {
            Self::Good
        } else if score >= 2.5 {
            Self::NeedsFocus
        } else {
            Self::OffTrack
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::NeedsFocus => "Needs focus",
            Self::OffTrack => "Off-track",
        })
    }
}

/// A graded question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Criterion key to 0-5 score. Criteria the grader omitted are absent.
    #[serde(default)]
    pub scores: BTreeMap<String, f32>,
    /// Criterion key to a short justification.
    #[serde(default)]
    pub reasoning: BTreeMap<String, String>,
    /// Interview phase the question seems to belong to (e.g. `hpi`).
    #[serde(default)]
    pub phase_guess: String,
    /// Free-form warnings such as `leading_question`.
    #[serde(default)]
    pub risk_flags: Vec<String>,
}

impl Evaluation {
    /// Neutral grade used when the grader's output is unusable.
    pub fn fallback() -> Self {
        let keys = Criterion::ALL.iter().map(|c| c.key().to_string());
        Self {
            scores: keys.clone().map(|k| (k, 3.0)).collect(),
            reasoning: keys.map(|k| (k, "Auto-fallback (could not parse JSON).".to_string())).collect(),
            phase_guess: "hpi".to_string(),
            risk_flags: vec!["parse_error".to_string()],
        }
    }

    /// Parse grader output, tolerating prose or code fences around the JSON
    /// object. Returns `None` if no object can be decoded.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Ok(evaluation) = serde_json::from_str(raw.trim()) {
            return Some(evaluation);
        }
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&raw[start..=end]).ok()
    }

    /// Score for `criterion`, if the grader gave one.
    pub fn score(&self, criterion: Criterion) -> Option<f32> {
        self.scores.get(criterion.key()).copied()
    }

    /// Weighted mean over the criteria present, 0 when none are.
    pub fn overall(&self) -> f32 {
        let (sum, weight) = Criterion::ALL
            .iter()
            .filter_map(|&c| self.score(c).map(|s| (s * c.weight(), c.weight())))
            .fold((0.0, 0.0), |(s, w), (ds, dw)| (s + ds, w + dw));
        if weight > 0.0 { sum / weight } else { 0.0 }
    }

    /// Band of [`overall`](Self::overall).
    pub fn band(&self) -> Band {
        Band::from_score(self.overall())
    }

    /// One-line rationale: diagnostic utility, else relevance.
    pub fn brief(&self) -> Option<&str> {
        [Criterion::DiagnosticUtility, Criterion::Relevance]
            .iter()
            .filter_map(|c| self.reasoning.get(c.key()))
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }
}

/// Grades clinician questions with a [`TextGenerator`].
#[derive(Clone)]
pub struct Evaluator {
    generator: Arc<dyn TextGenerator>,
}

impl Evaluator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Grade `question` against the retrieved `contexts`.
    ///
    /// # Errors
    ///
    /// Only generator failures are errors; unparsable output yields
    /// [`Evaluation::fallback`].
    pub async fn evaluate(&self, question: &str, contexts: &[RetrievalResult]) -> Result<Evaluation> {
        let prompt = evaluation_prompt(question, contexts);
        let raw = self.generator.generate(&prompt, EVALUATION_TEMPERATURE).await?;
        match Evaluation::parse(&raw) {
            Some(evaluation) => {
                debug!(overall = evaluation.overall(), phase = %evaluation.phase_guess, "question graded");
                Ok(evaluation)
            }
            None => {
                warn!(model = self.generator.name(), output_len = raw.len(), "unparsable evaluation, using fallback");
                Ok(Evaluation::fallback())
            }
        }
    }
}
