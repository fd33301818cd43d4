use crate::domain::ports::{LanguageModel, OracleRequest};
use crate::utils::error::{AlignError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI 相容的 chat-completions 端點
pub struct ChatCompletionModel {
    client: Client,
    config: ChatModelConfig,
}

impl ChatCompletionModel {
    pub fn new(config: ChatModelConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionModel {
    async fn invoke(&self, request: &OracleRequest) -> Result<Value> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.context,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut http_request = self.client.post(self.url()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request.send().await.map_err(|e| AlignError::Oracle {
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AlignError::Oracle {
                message: format!("model endpoint returned {}", status),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| AlignError::ResponseFormat {
            message: format!("unexpected chat response: {}", e),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AlignError::ResponseFormat {
                message: "chat response has no content".to_string(),
            })?;

        Ok(Value::String(content))
    }
}
