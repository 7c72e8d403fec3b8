//! OpenAI chat-completions connector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{post_json, HttpFailure};
use super::{run_blocking, BackendKind, Connector, Reply};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1500;

pub(crate) const EMPTY_CHOICES: &str = "The AI returned an empty response.";
pub(crate) const EMPTY_CONTENT: &str = "No response from AI.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Talks to an OpenAI-compatible `/chat/completions` endpoint.
///
/// The credential and model are fixed at construction; each `respond` makes
/// exactly one request.
#[derive(Clone)]
pub struct OpenAiConnector {
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiConnector {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Reply {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let url = format!("{}/chat/completions", self.base_url);
        match post_json::<_, ChatResponse>(&url, Some(&self.api_key), &request) {
            Ok(response) => match response.choices.into_iter().next() {
                Some(choice) => match choice.message.content {
                    Some(content) if !content.is_empty() => Reply::text(content),
                    _ => Reply::text(EMPTY_CONTENT),
                },
                None => Reply::text(EMPTY_CHOICES),
            },
            Err(HttpFailure::Status { code, message }) => {
                log::warn!("openai {} returned {}: {}", self.model, code, message);
                Reply::error(format!("An OpenAI API error occurred: {message}"))
            }
            Err(HttpFailure::Connection(detail)) => {
                log::warn!("openai unreachable: {}", detail);
                Reply::error(format!("Could not reach the OpenAI API: {detail}"))
            }
            Err(HttpFailure::Decode(detail)) => {
                Reply::error(format!("An unexpected error occurred: {detail}"))
            }
        }
    }
}

#[async_trait]
impl Connector for OpenAiConnector {
    fn name(&self) -> &str {
        BackendKind::OpenAi.label()
    }

    async fn respond(&self, prompt: &str) -> Reply {
        let this = self.clone();
        let prompt = prompt.to_string();
        run_blocking(move || this.complete(&prompt)).await
    }
}
