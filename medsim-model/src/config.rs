//! Generation backend settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Default Ollama endpoint for text generation.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default request timeout for generation calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for a text generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL of the generation server.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature for answers. Patient replies never go below 0.2.
    pub temperature: f32,
    /// Per-request timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GenerationConfig {
    /// Create a config for `model` at `endpoint` with default sampling.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), model: model.into(), ..Self::default() }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `OLLAMA_ENDPOINT`, `OLLAMA_MODEL` and `TEMPERATURE` from the
    /// environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        if let Some(endpoint) = get("OLLAMA_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            config.model = model;
        }
        if let Some(t) = get("TEMPERATURE") {
            config.temperature = t.trim().parse().map_err(|e| {
                ModelError::Config(format!("invalid value '{t}' for TEMPERATURE: {e}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ModelError::Config("model must not be empty".to_string()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ModelError::Config(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let c = GenerationConfig::default();
        assert_eq!(c.model, "llama3.2:3b");
        assert_eq!(c.temperature, 0.2);
        assert_eq!(c.timeout, Duration::from_secs(120));
    }

    #[test]
    fn env_overrides() {
        let c = GenerationConfig::from_lookup(lookup(&[
            ("OLLAMA_MODEL", "mistral"),
            ("TEMPERATURE", "0.7"),
        ]))
        .unwrap();
        assert_eq!(c.model, "mistral");
        assert!((c.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn bad_temperature_is_rejected() {
        assert!(GenerationConfig::from_lookup(lookup(&[("TEMPERATURE", "warm")])).is_err());
        assert!(GenerationConfig::from_lookup(lookup(&[("TEMPERATURE", "-1")])).is_err());
    }

    #[test]
    fn serializes_timeout_as_seconds() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json["timeout"], 120);
    }
}
