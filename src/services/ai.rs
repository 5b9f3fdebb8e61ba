use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiConfig;
use crate::models::MAX_DESCRIPTION_CHARS;

const SYSTEM_PROMPT: &str = "You help people write todo items. Given a todo title and a short \
description, reply with an improved, concrete description of at most a few sentences. \
Reply with the description text only.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI enrichment is not configured")]
    NotConfigured,
    #[error("request to AI service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI service returned status {0}")]
    Status(u16),
    #[error("AI service returned no content")]
    EmptyResponse,
}

/// Rewrites a todo description with the help of a generative model.
#[rocket::async_trait]
pub trait DescriptionEnricher: Send + Sync {
    async fn enrich(&self, title: &str, description: &str) -> Result<String, AiError>;
}

/// Used when no API key is configured.
pub struct DisabledEnricher;

#[rocket::async_trait]
impl DescriptionEnricher for DisabledEnricher {
    async fn enrich(&self, _title: &str, _description: &str) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionEnricher {
    client: reqwest::Client,
    config: AiConfig,
}

impl ChatCompletionEnricher {
    /// Requests that outlive `config.timeout` fail with `AiError::Http`.
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        Ok(ChatCompletionEnricher { client, config })
    }
}

#[rocket::async_trait]
impl DescriptionEnricher for ChatCompletionEnricher {
    async fn enrich(&self, title: &str, description: &str) -> Result<String, AiError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: user_prompt(title, description) },
            ],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AiError::EmptyResponse)?;

        clip_description(&content).ok_or(AiError::EmptyResponse)
    }
}

fn user_prompt(title: &str, description: &str) -> String {
    format!("Title: {title}\nDescription: {description}")
}

/// Trim and cut to the stored description limit; `None` when nothing is left.
pub fn clip_description(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_DESCRIPTION_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn config_for(api_url: String, timeout: Duration) -> AiConfig {
        AiConfig {
            api_key: "test-key".to_string(),
            api_url,
            model: "test-model".to_string(),
            timeout,
        }
    }

    #[test]
    fn clip_trims_and_limits() {
        assert_eq!(clip_description("  buy milk \n").as_deref(), Some("buy milk"));
        assert_eq!(clip_description("   "), None);
        let long = "ü".repeat(MAX_DESCRIPTION_CHARS + 50);
        assert_eq!(clip_description(&long).unwrap().chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn prompt_mentions_title_and_description() {
        let prompt = user_prompt("Groceries", "milk");
        assert!(prompt.contains("Groceries"));
        assert!(prompt.contains("milk"));
    }

    #[rocket::async_test]
    async fn disabled_enricher_refuses() {
        let result = DisabledEnricher.enrich("Groceries", "milk").await;
        assert!(matches!(result, Err(AiError::NotConfigured)));
    }

    #[rocket::async_test]
    async fn silent_endpoint_times_out() {
        // Accepts connections into the backlog but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        let enricher = ChatCompletionEnricher::new(config_for(url, Duration::from_millis(300))).unwrap();

        let started = Instant::now();
        let result = enricher.enrich("Groceries", "milk").await;
        assert!(matches!(result, Err(AiError::Http(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
        drop(listener);
    }
}
