/// OpenAI-compatible chat-completions provider.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ProviderError, TextCompletionProvider};
use crate::config::ProviderConfig;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpProvider {
    /// Build a provider from config. The API key is read from the environment
    /// variable named by `api_key_env`; a missing key is allowed for local
    /// endpoints that do not need one.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("proofmark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl TextCompletionProvider for HttpProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Envelope(e.to_string()))?;
        debug!("{} returned {} choice(s)", self.endpoint, parsed.choices.len());

        extract_content(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn extract_content(resp: ChatResponse) -> Result<String, ProviderError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .ok_or_else(|| ProviderError::Envelope("missing choices[0].message.content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content_ok() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"{\"issues\":[]}"}}]}"#)
                .unwrap();
        assert_eq!(extract_content(resp).unwrap(), r#"{"issues":[]}"#);
    }

    #[test]
    fn test_extract_content_missing() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_content(resp),
            Err(ProviderError::Envelope(_))
        ));
    }

    #[test]
    fn test_new_without_key() {
        let config = ProviderConfig {
            api_key_env: "PROOFMARK_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..ProviderConfig::default()
        };
        let provider = HttpProvider::new(&config).unwrap();
        assert!(provider.api_key.is_none());
        assert_eq!(provider.name(), config.model);
    }
}
