//! Session flow tests with a scripted generator over an in-memory index.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medsim_model::{
    Band, ConversationState, GenerationConfig, Mode, ModelError, Role, TextGenerator, Tutor,
};
use medsim_rag::{Document, EmbeddingProvider, InMemoryVectorStore, Indexer, Retriever};

const DIM: usize = 8;

struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> medsim_rag::Result<Vec<f32>> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        Ok((0..DIM).map(|i| ((hash.wrapping_add(i as u64)) as f32).sin()).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

const GOOD_GRADE: &str = r#"{"scores":{"relevance":5,"diagnostic_utility":5,"clarity_specificity":5,"empathy_professionalism":4,"hipaa_ethics":5},"reasoning":{"diagnostic_utility":"targets onset"},"phase_guess":"hpi","risk_flags":[]}"#;

/// Answers grading prompts with `grade` and everything else with a numbered reply.
struct ScriptedGenerator {
    grade: String,
    fail: bool,
    calls: Mutex<Vec<(String, f32)>>,
}

impl ScriptedGenerator {
    fn new(grade: &str) -> Self {
        Self { grade: grade.to_string(), fail: false, calls: Mutex::new(Vec::new()) }
    }

    fn failing() -> Self {
        Self { fail: true, ..Self::new(GOOD_GRADE) }
    }

    fn calls(&self) -> Vec<(String, f32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> medsim_model::Result<String> {
        if self.fail {
            return Err(ModelError::Generation { message: "offline".into() });
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push((prompt.to_string(), temperature));
        if prompt.contains("Student question:") {
            Ok(self.grade.clone())
        } else {
            Ok(format!("reply #{}", calls.len()))
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

async fn retriever(docs: Vec<Document>) -> Arc<Retriever> {
    let store = Arc::new(InMemoryVectorStore::new());
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder);
    Indexer::builder()
        .collection("cases")
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .build()
        .unwrap()
        .index(docs)
        .await
        .unwrap();
    Arc::new(
        Retriever::builder()
            .collection("cases")
            .embedding_provider(embedder)
            .vector_store(store)
            .build()
            .unwrap(),
    )
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("PMC1", "A 45-year-old presented with crushing chest pain radiating to the jaw."),
        Document::new("PMC2", "A child presented with a barking cough and inspiratory stridor."),
        Document::new("PMC3", "An elderly woman reported progressive memory loss over two years."),
    ]
}

fn tutor(retriever: Arc<Retriever>, generator: Arc<ScriptedGenerator>, temperature: f32) -> Tutor {
    let config = GenerationConfig::default().with_temperature(temperature);
    Tutor::new(retriever, generator, &config).with_top_k(2)
}

#[tokio::test]
async fn new_patient_opens_with_a_grounded_reply() {
    let generator = Arc::new(ScriptedGenerator::new(GOOD_GRADE));
    let tutor = tutor(retriever(corpus()).await, generator.clone(), 0.0);

    let state = tutor.start_patient(ConversationState::default()).await.unwrap();
    assert_eq!(state.mode, Mode::Patient);
    let patient = state.patient.as_ref().unwrap();
    let case = patient.source_id.clone().unwrap();
    assert!(["PMC1", "PMC2", "PMC3"].contains(&case.as_str()));

    assert_eq!(state.history.len(), 1);
    let opening = &state.history[0];
    assert_eq!(opening.role, Role::Assistant);
    assert!(!opening.contexts.is_empty());
    assert!(opening.contexts.iter().all(|c| c.source_id == case));

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.contains("Clinician says: What brings you in today?"));
    assert!(calls[0].0.contains(&format!("Name: {}", patient.persona.name)));
    // Role-play never samples below 0.2.
    assert!((calls[0].1 - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn patient_turns_stay_on_the_seated_case_and_are_graded() {
    let generator = Arc::new(ScriptedGenerator::new(GOOD_GRADE));
    let tutor = tutor(retriever(corpus()).await, generator.clone(), 0.6);

    let state = tutor.start_patient(ConversationState::default()).await.unwrap();
    let case = state.patient.as_ref().and_then(|p| p.source_id.clone()).unwrap();
    let state = tutor.handle_turn(state, "When did it start?").await.unwrap();

    assert_eq!(state.history.len(), 3);
    assert_eq!(state.history[1].role, Role::User);
    assert_eq!(state.history[1].content, "When did it start?");

    let reply = state.last_reply().unwrap();
    assert_eq!(reply.source_id.as_deref(), Some(case.as_str()));
    assert!(reply.contexts.iter().all(|c| c.source_id == case));
    let evaluation = reply.evaluation.as_ref().unwrap();
    assert_eq!(evaluation.band(), Band::Excellent);
    assert_eq!(evaluation.brief(), Some("targets onset"));

    let calls = generator.calls();
    let temps: Vec<f32> = calls.iter().map(|(_, t)| *t).collect();
    assert_eq!(temps, vec![0.6, 0.6, 0.1]);
}

#[tokio::test]
async fn study_turns_search_everything() {
    let generator = Arc::new(ScriptedGenerator::new(GOOD_GRADE));
    let tutor = tutor(retriever(corpus()).await, generator.clone(), 0.0);

    let state = tutor.handle_turn(ConversationState::new(Mode::Study), "causes of stridor").await.unwrap();
    let reply = state.last_reply().unwrap();
    assert_eq!(reply.contexts.len(), 2);
    assert!(reply.source_id.is_none());
    assert!(state.patient.is_none());

    let (prompt, temperature) = &generator.calls()[0];
    assert!(prompt.contains("User question: causes of stridor"));
    assert_eq!(*temperature, 0.0);
}

#[tokio::test]
async fn unparsable_grade_falls_back() {
    let generator = Arc::new(ScriptedGenerator::new("I think it was a fine question."));
    let tutor = tutor(retriever(corpus()).await, generator, 0.2);

    let state = tutor.handle_turn(ConversationState::default(), "Any fever?").await.unwrap();
    let evaluation = state.last_reply().and_then(|t| t.evaluation.clone()).unwrap();
    assert_eq!(evaluation.risk_flags, vec!["parse_error"]);
    assert_eq!(evaluation.band(), Band::NeedsFocus);
}

#[tokio::test]
async fn empty_index_still_seats_a_patient() {
    let generator = Arc::new(ScriptedGenerator::new(GOOD_GRADE));
    let tutor = tutor(retriever(Vec::new()).await, generator, 0.2);

    let state = tutor.start_patient(ConversationState::default()).await.unwrap();
    assert_eq!(state.patient.as_ref().unwrap().source_id, None);
    assert!(state.history[0].contexts.is_empty());

    let state = tutor.handle_turn(state, "How are you feeling?").await.unwrap();
    assert_eq!(state.history.len(), 3);
}

#[tokio::test]
async fn generator_failure_is_returned() {
    let generator = Arc::new(ScriptedGenerator::failing());
    let tutor = tutor(retriever(corpus()).await, generator, 0.2);

    let err = tutor.handle_turn(ConversationState::default(), "Hello").await.unwrap_err();
    assert!(matches!(err, ModelError::Generation { .. }));
}

#[tokio::test]
async fn answer_cites_retrieved_chunks() {
    let generator = Arc::new(ScriptedGenerator::new(GOOD_GRADE));
    let tutor = tutor(retriever(corpus()).await, generator.clone(), 0.2);

    let answer = tutor.answer("memory loss", None).await.unwrap();
    assert_eq!(answer.contexts.len(), 2);
    let prompt = &generator.calls()[0].0;
    for c in &answer.contexts {
        assert!(prompt.contains(&format!("[Source: {}]", c.source_id)));
    }
}

#[tokio::test]
async fn answer_can_be_restricted_to_one_case() {
    let generator = Arc::new(ScriptedGenerator::new(GOOD_GRADE));
    let tutor = tutor(retriever(corpus()).await, generator, 0.2);

    let answer = tutor.answer("symptoms", Some("PMC2")).await.unwrap();
    assert_eq!(answer.contexts.len(), 1);
    assert_eq!(answer.contexts[0].source_id, "PMC2");
}
