//! Text generation clients.

use async_trait::async_trait;

use crate::error::Result;

/// A backend that completes a prompt.
///
/// One call, one completion: no streaming and no retries. Callers choose the
/// temperature per call so the same backend can serve deterministic grading
/// and looser role-play.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` sampling at `temperature`.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Model or backend name used in logs.
    fn name(&self) -> &str;
}

#[cfg(feature = "ollama")]
pub use ollama::OllamaGenerator;

#[cfg(feature = "ollama")]
mod ollama {
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, error};

    use super::TextGenerator;
    use crate::config::GenerationConfig;
    use crate::error::{ModelError, Result};

    /// A [`TextGenerator`] calling Ollama's `/api/generate` endpoint.
    ///
    /// ```rust,ignore
    /// use medsim_model::{GenerationConfig, OllamaGenerator, TextGenerator};
    ///
    /// let llm = OllamaGenerator::new(GenerationConfig::from_env()?)?;
    /// let text = llm.generate("Summarise the case.", 0.2).await?;
    /// ```
    pub struct OllamaGenerator {
        client: reqwest::Client,
        endpoint: String,
        model: String,
    }

    impl OllamaGenerator {
        /// Create a generator from `config`.
        pub fn new(config: GenerationConfig) -> Result<Self> {
            config.validate()?;
            let client = reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| ModelError::generation(format!("failed to build client: {e}")))?;
            Ok(Self {
                client,
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                model: config.model,
            })
        }
    }

    #[derive(Serialize)]
    struct GenerateRequest<'a> {
        model: &'a str,
        prompt: &'a str,
        stream: bool,
        options: Options,
    }

    #[derive(Serialize)]
    struct Options {
        temperature: f32,
    }

    #[derive(Deserialize)]
    struct GenerateResponse {
        #[serde(default)]
        response: String,
    }

    #[derive(Deserialize)]
    struct ErrorResponse {
        error: String,
    }

    #[async_trait]
    impl TextGenerator for OllamaGenerator {
        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
            debug!(model = %self.model, prompt_len = prompt.len(), temperature, "generating");

            let url = format!("{}/api/generate", self.endpoint);
            let body = GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: Options { temperature },
            };
            let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
                error!(model = %self.model, %url, error = %e, "generation request failed");
                ModelError::generation(format!("request to {url} failed: {e}"))
            })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let detail =
                    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
                error!(model = %self.model, %status, "generation API error");
                return Err(ModelError::generation(format!("server returned {status}: {detail}")));
            }

            let decoded: GenerateResponse = response.json().await.map_err(|e| {
                error!(model = %self.model, error = %e, "failed to parse generation response");
                ModelError::generation(format!("failed to parse response: {e}"))
            })?;
            Ok(decoded.response)
        }

        fn name(&self) -> &str {
            &self.model
        }
    }

}
