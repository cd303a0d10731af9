//! # medsim-model
//!
//! Text generation on top of [`medsim_rag`] retrieval.
//!
//! ## Overview
//!
//! - [`TextGenerator`] - prompt in, completion out; `OllamaGenerator` talks
//!   to a local Ollama server (feature `ollama`, on by default)
//! - [`Evaluator`] - grades a clinician's question on a five-criterion rubric
//! - [`Tutor`] - study-mode answers and virtual-patient role-play, threading
//!   an explicit [`ConversationState`] through every call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use medsim_model::{ConversationState, GenerationConfig, Mode, OllamaGenerator, Tutor};
//!
//! let config = GenerationConfig::from_env()?;
//! let tutor = Tutor::new(retriever, Arc::new(OllamaGenerator::new(config.clone())?), &config);
//!
//! let state = tutor.start_patient(ConversationState::new(Mode::Patient)).await?;
//! let state = tutor.handle_turn(state, "When did the pain start?").await?;
//! println!("{}", state.last_reply().map(|t| t.content.as_str()).unwrap_or_default());
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod persona;
pub mod prompt;
pub mod session;

#[cfg(feature = "ollama")]
pub use client::OllamaGenerator;
pub use client::TextGenerator;
pub use config::GenerationConfig;
pub use error::{ModelError, Result};
pub use evaluator::{Band, Criterion, EVALUATION_TEMPERATURE, Evaluation, Evaluator};
pub use persona::Persona;
pub use session::{Answer, ConversationState, Mode, PatientCase, Role, Tutor, Turn};
