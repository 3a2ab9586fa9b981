use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::app::ports::ModelPort;
use crate::config::YandexSettings;
use crate::constants::SYSTEM_PROMPT;
use crate::error::ModelError;
use crate::observability::metrics;

/// Completion client for the YandexGPT foundation models API.
pub struct YandexGptModel {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    max_tokens: String,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    text: String,
}

impl YandexGptModel {
    pub fn from_settings(settings: &YandexSettings) -> Result<Self, ModelError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ModelError::Config("YANDEX_API_KEY is not set".to_string()))?;
        let model_uri = settings
            .model_uri
            .clone()
            .ok_or_else(|| ModelError::Config("YANDEX_MODEL_URI is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            api_key,
            model_uri,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: 0.0,
                max_tokens: "2000".to_string(),
            },
            messages: vec![
                Message {
                    role: "system",
                    text: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    text: prompt,
                },
            ],
        }
    }
}

#[async_trait]
impl ModelPort for YandexGptModel {
    #[instrument(skip_all, fields(prompt_chars = prompt.chars().count()))]
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let started = Instant::now();
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                metrics::model::request_failed("transport");
                ModelError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Model service rejected the request");
            metrics::model::request_failed("status");
            return Err(ModelError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let text = completion
            .result
            .alternatives
            .into_iter()
            .next()
            .map(|alternative| alternative.message.text)
            .ok_or_else(|| {
                metrics::model::request_failed("empty");
                ModelError::EmptyResponse
            })?;

        metrics::model::request_succeeded(started.elapsed().as_secs_f64());
        debug!(reply_chars = text.chars().count(), "Model replied");
        Ok(text)
    }
}
