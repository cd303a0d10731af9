//! Study and virtual-patient conversations.
//!
//! [`ConversationState`] is a plain value: every [`Tutor`] call takes the
//! current state and hands back the next one. Nothing about a conversation
//! lives inside the tutor, so one tutor can serve many sessions.

use std::sync::Arc;

use medsim_rag::{RetrievalResult, Retriever};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::TextGenerator;
use crate::config::GenerationConfig;
use crate::error::Result;
use crate::evaluator::{Evaluation, Evaluator};
use crate::persona::Persona;
use crate::prompt::{OPENING_QUERY, OPENING_QUESTION, patient_prompt, study_prompt};

/// Lowest temperature used for patient role-play.
pub const MIN_PATIENT_TEMPERATURE: f32 = 0.2;

/// What the user is talking to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Cited question answering over the whole corpus.
    #[default]
    Study,
    /// Role-play with one sampled case.
    Patient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Chunks the reply was grounded on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<RetrievalResult>,
    /// Case the reply was restricted to, in patient mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Grade of the user message this turn answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl Turn {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            contexts: Vec::new(),
            source_id: None,
            evaluation: None,
        }
    }
}

/// The simulated patient of a patient-mode session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientCase {
    /// Indexed case the patient is built from; `None` when nothing was indexed.
    pub source_id: Option<String>,
    pub persona: Persona,
}

/// Everything a session remembers between calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub mode: Mode,
    pub history: Vec<Turn>,
    pub patient: Option<PatientCase>,
}

impl ConversationState {
    /// An empty state in `mode`.
    pub fn new(mode: Mode) -> Self {
        Self { mode, ..Self::default() }
    }

    /// The most recent assistant turn.
    pub fn last_reply(&self) -> Option<&Turn> {
        self.history.iter().rev().find(|t| t.role == Role::Assistant)
    }
}

/// An answer with the chunks it cites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub contexts: Vec<RetrievalResult>,
}

/// Drives study and patient conversations over a [`Retriever`].
pub struct Tutor {
    retriever: Arc<Retriever>,
    generator: Arc<dyn TextGenerator>,
    evaluator: Evaluator,
    temperature: f32,
    top_k: usize,
}

impl Tutor {
    /// Create a tutor sampling at `config.temperature`, retrieving the
    /// retriever's default number of chunks per turn.
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<dyn TextGenerator>,
        config: &GenerationConfig,
    ) -> Self {
        let top_k = retriever.default_top_k();
        Self {
            evaluator: Evaluator::new(generator.clone()),
            retriever,
            generator,
            temperature: config.temperature,
            top_k,
        }
    }

    /// Override the number of chunks retrieved per turn.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn patient_temperature(&self) -> f32 {
        self.temperature.max(MIN_PATIENT_TEMPERATURE)
    }

    /// Answer a study question without grading it, optionally searching
    /// only the case `source_id`.
    pub async fn answer(&self, question: &str, source_id: Option<&str>) -> Result<Answer> {
        let contexts = self.retriever.retrieve(question, self.top_k, source_id).await?;
        let text = self.generator.generate(&study_prompt(question, &contexts), self.temperature).await?;
        Ok(Answer { text, contexts })
    }

    /// Grade a question against `contexts`.
    pub async fn evaluate(&self, question: &str, contexts: &[RetrievalResult]) -> Result<Evaluation> {
        self.evaluator.evaluate(question, contexts).await
    }

    /// Seat a new patient: sample a case, draw a persona and generate the
    /// patient's answer to the opening question. Switches to patient mode.
    pub async fn start_patient(&self, mut state: ConversationState) -> Result<ConversationState> {
        let source_id = self.retriever.sample_source_id().await;
        let persona = Persona::random(&mut rand::thread_rng());

        let contexts = match source_id.as_deref() {
            Some(id) => self.retriever.retrieve(OPENING_QUERY, self.top_k, Some(id)).await?,
            None => {
                warn!("no indexed case to sample, patient starts without context");
                Vec::new()
            }
        };

        let prompt = patient_prompt(OPENING_QUESTION, &contexts, Some(&persona));
        let opening = self.generator.generate(&prompt, self.patient_temperature()).await?;
        info!(source_id = source_id.as_deref(), persona = %persona.name, "new patient");

        state.mode = Mode::Patient;
        state.history.push(Turn {
            role: Role::Assistant,
            content: opening,
            contexts,
            source_id: source_id.clone(),
            evaluation: None,
        });
        state.patient = Some(PatientCase { source_id, persona });
        Ok(state)
    }

    /// Reply to one user message and grade it.
    ///
    /// In patient mode retrieval is restricted to the seated case and the
    /// reply is in character; in study mode the whole corpus is searched and
    /// the reply is a cited answer. Both the user turn and the reply are
    /// appended to the returned history.
    pub async fn handle_turn(
        &self,
        mut state: ConversationState,
        input: &str,
    ) -> Result<ConversationState> {
        let reply = match state.mode {
            Mode::Patient => {
                let source_id = state.patient.as_ref().and_then(|p| p.source_id.clone());
                let contexts =
                    self.retriever.retrieve(input, self.top_k, source_id.as_deref()).await?;
                let persona = state.patient.as_ref().map(|p| &p.persona);
                let prompt = patient_prompt(input, &contexts, persona);
                let content = self.generator.generate(&prompt, self.patient_temperature()).await?;
                let evaluation = self.evaluator.evaluate(input, &contexts).await?;
                Turn { role: Role::Assistant, content, contexts, source_id, evaluation: Some(evaluation) }
            }
            Mode::Study => {
                let Answer { text, contexts } = self.answer(input, None).await?;
                let evaluation = self.evaluator.evaluate(input, &contexts).await?;
                Turn {
                    role: Role::Assistant,
                    content: text,
                    contexts,
                    source_id: None,
                    evaluation: Some(evaluation),
                }
            }
        };

        state.history.push(Turn::user(input));
        state.history.push(reply);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_empty_study() {
        let state = ConversationState::default();
        assert_eq!(state.mode, Mode::Study);
        assert!(state.history.is_empty());
        assert!(state.last_reply().is_none());
    }

    #[test]
    fn turns_serialize_compactly() {
        let json = serde_json::to_value(Turn::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }
}
