//! Guided inference client for the vLLM backend.
//!
//! Talks the OpenAI-compatible chat completions API with vLLM's guided-JSON
//! extras. Generation is greedy (temperature 0). An unparseable completion is
//! retried once with constrained decoding; if that also fails to validate the
//! paragraph simply yields nothing.

pub mod prompts;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::InferenceConfig;
use crate::error::InferenceError;
use crate::extract::TripletList;

/// One chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Client for guided triplet generation.
pub struct GuidedLlm {
    http: reqwest::Client,
    base_url: String,
    model_name: String,
    max_tokens: u32,
    schema: Value,
}

impl GuidedLlm {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            model_name: config.model_name.clone(),
            max_tokens: config.max_tokens,
            schema: TripletList::json_schema(),
        }
    }

    /// Block until the backend's health endpoint answers. The backend loads
    /// model weights at boot and can take minutes to come up.
    pub async fn wait_ready(&self) {
        tracing::info!(base_url = %self.base_url, "Waiting for inference backend");
        loop {
            let healthy = self
                .http
                .get(format!("{}/health", self.base_url))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .is_ok();
            if healthy {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
        tracing::info!("Inference backend ready");
    }

    /// Generate a triplet list for one prompt. `Ok(None)` means the model's
    /// output never validated against the schema.
    pub async fn guided_generate(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Option<TripletList>, InferenceError> {
        for constrained in [false, true] {
            let content = self.complete(messages, constrained).await?;
            match serde_json::from_str::<TripletList>(&content) {
                Ok(list) => return Ok(Some(list)),
                Err(e) if constrained => {
                    tracing::warn!(error = %e, "Constrained completion failed validation");
                    return Ok(None);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Retrying with constrained decoding");
                }
            }
        }
        unreachable!("constrained attempt always returns");
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        constrained: bool,
    ) -> Result<String, InferenceError> {
        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "temperature": 0.0,
            "max_tokens": self.max_tokens,
            // llama 3 tokenizer bug: the backend does not always stop on eot.
            "stop_token_ids": [128001, 128009],
        });
        if constrained {
            body["guided_json"] = Value::String(self.schema.to_string());
            body["guided_decoding_backend"] = Value::String("lm-format-enforcer".to_string());
        }

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(InferenceError::EmptyCompletion)
    }
}
