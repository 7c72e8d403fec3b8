//! Local Ollama daemon connector.
//!
//! The daemon is assumed to be running; nothing is checked at construction.
//! Connectivity problems surface on the first `respond`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{post_json, HttpFailure};
use super::{run_blocking, BackendKind, Connector, Reply};

pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Clone)]
pub struct OllamaConnector {
    model: String,
    host: String,
}

impl OllamaConnector {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_host(model, DEFAULT_HOST)
    }

    pub fn with_host(model: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat(&self, prompt: &str) -> Reply {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let url = format!("{}/api/chat", self.host);
        match post_json::<_, ChatResponse>(&url, None, &request) {
            Ok(response) => Reply::text(response.message.content),
            Err(HttpFailure::Status { code, message })
                if code == 404 || message.contains("not found") =>
            {
                Reply::error(model_not_found(&self.model))
            }
            Err(HttpFailure::Status { message, .. }) => {
                Reply::error(format!("An Ollama API error occurred: {message}"))
            }
            Err(HttpFailure::Connection(detail)) => {
                log::warn!("ollama at {} unreachable: {}", self.host, detail);
                Reply::error(service_unreachable())
            }
            Err(HttpFailure::Decode(detail)) => {
                Reply::error(format!("An unexpected error occurred: {detail}"))
            }
        }
    }
}

fn model_not_found(model: &str) -> String {
    format!(
        "Error: Model '{model}' not found.\n\n\
         Please pull it first by running: `ollama pull {model}`"
    )
}

fn service_unreachable() -> String {
    "Error: Could not connect to Ollama service.\n\n\
     Please ensure the Ollama application is running on your local machine \
     (start it with `ollama serve`)."
        .to_string()
}

#[async_trait]
impl Connector for OllamaConnector {
    fn name(&self) -> &str {
        BackendKind::Ollama.label()
    }

    async fn respond(&self, prompt: &str) -> Reply {
        let this = self.clone();
        let prompt = prompt.to_string();
        run_blocking(move || this.chat(&prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::http::testing::{closed_port_url, respond_once};

    #[tokio::test]
    async fn returns_message_content() {
        let (base, captured) = respond_once(
            200,
            r#"{"model":"llama3","message":{"role":"assistant","content":"Hey!"},"done":true}"#,
        );
        let connector = OllamaConnector::with_host("llama3", base);

        assert_eq!(connector.respond("Hi").await, Reply::text("Hey!"));

        let request = captured.recv().unwrap();
        assert_eq!(request.request_line, "POST /api/chat HTTP/1.1");
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "Hi");
    }

    #[tokio::test]
    async fn unreachable_service_gives_start_guidance() {
        let connector = OllamaConnector::with_host("llama3", closed_port_url());
        let reply = connector.respond("Hi").await;

        assert!(reply.is_error);
        assert!(reply.text.contains("Could not connect to Ollama service"));
        assert!(reply.text.contains("ollama serve"));
        assert!(!reply.text.contains("unexpected"));
    }

    #[tokio::test]
    async fn missing_model_gives_pull_guidance() {
        let (base, _captured) = respond_once(
            404,
            r#"{"error":"model \"codellama\" not found, try pulling it first"}"#,
        );
        let connector = OllamaConnector::with_host("codellama", base);
        let reply = connector.respond("Hi").await;

        assert!(reply.is_error);
        assert!(reply.text.contains("Model 'codellama' not found"));
        assert!(reply.text.contains("`ollama pull codellama`"));
    }

    #[tokio::test]
    async fn other_api_errors_are_wrapped() {
        let (base, _captured) = respond_once(500, r#"{"error":"out of memory"}"#);
        let connector = OllamaConnector::with_host("llama3", base);
        let reply = connector.respond("Hi").await;

        assert!(reply.is_error);
        assert_eq!(reply.text, "An Ollama API error occurred: out of memory");
    }

    #[tokio::test]
    async fn malformed_body_is_generic_error() {
        let (base, _captured) = respond_once(200, r#"{"unexpected":true}"#);
        let connector = OllamaConnector::with_host("llama3", base);
        let reply = connector.respond("Hi").await;

        assert!(reply.is_error);
        assert!(reply.text.starts_with("An unexpected error occurred"));
    }
}
