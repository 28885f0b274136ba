use crate::config::LlmConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String>;
}

/// Builds the configured text-generation client. Credentials are validated
/// here, before any generation is attempted.
pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => {
            let cfg = config.openai.as_ref().ok_or_else(|| {
                Error::Configuration("llm.provider is \"openai\" but llm.openai is missing".into())
            })?;
            let api_key = cfg.resolve_api_key().ok_or_else(|| {
                Error::Configuration(
                    "no OpenAI API key. Set llm.openai.api_key in config.yml or OPENAI_API_KEY."
                        .into(),
                )
            })?;
            Ok(Box::new(OpenAiClient::new(
                &api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
            )))
        }
        "ollama" => {
            let cfg = config.ollama.as_ref().ok_or_else(|| {
                Error::Configuration("llm.provider is \"ollama\" but llm.ollama is missing".into())
            })?;
            Ok(Box::new(OllamaClient::new(&cfg.base_url, &cfg.model)))
        }
        other => Err(Error::Configuration(format!(
            "unknown LLM provider: {}",
            other
        ))),
    }
}

// --- OpenAI-compatible ---

#[derive(Debug)]
struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageResponse,
}

#[derive(Deserialize)]
struct OpenAiMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::upstream("openai", e))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            log::error!("OpenAI API error: {}", error_text);
            return Err(Error::upstream("openai", error_text));
        }

        let result: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream("openai", e))?;
        if let Some(choice) = result.choices.first() {
            if let Some(content) = &choice.message.content {
                return Ok(content.clone());
            }
        }

        Err(Error::upstream("openai", "response empty or missing content"))
    }
}

// --- Ollama ---

#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions { temperature },
        };

        let resp = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::upstream("ollama", e))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            log::error!("Ollama API error: {}", error_text);
            return Err(Error::upstream("ollama", error_text));
        }

        let result: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream("ollama", e))?;
        Ok(result.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OllamaConfig, OpenAiConfig};

    #[test]
    fn openai_response_parsing_success() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Once upon a time there was a robot."
                },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21 }
        }"#;

        let result: OpenAiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.choices[0].message.content.as_deref(),
            Some("Once upon a time there was a robot.")
        );
    }

    #[test]
    fn openai_response_parsing_missing_content() {
        let json = r#"{ "choices": [{ "message": { "role": "assistant" } }] }"#;
        let result: OpenAiResponse = serde_json::from_str(json).unwrap();
        assert!(result.choices[0].message.content.is_none());
    }

    #[test]
    fn ollama_response_parsing_success() {
        let json = r#"{
            "model": "llama3",
            "message": { "role": "assistant", "content": "Draft story." },
            "done": true
        }"#;
        let result: OllamaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(result.message.content, "Draft story.");
    }

    #[test]
    fn factory_rejects_missing_provider_section() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            openai: None,
            ollama: None,
        };
        let err = create_llm(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let config = LlmConfig {
            provider: "skynet".to_string(),
            openai: Some(OpenAiConfig::default()),
            ollama: None,
        };
        let err = create_llm(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn factory_accepts_ollama_without_credentials() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            openai: None,
            ollama: Some(OllamaConfig {
                base_url: "http://127.0.0.1:11434".to_string(),
                model: "llama3".to_string(),
            }),
        };
        assert!(create_llm(&config).is_ok());
    }
}
