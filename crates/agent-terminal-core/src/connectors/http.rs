//! Blocking JSON-over-HTTP plumbing shared by the HTTP connectors.
//!
//! Requests go through `ureq` on a blocking thread; failures are sorted into
//! the three classes the connectors report differently.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The server answered with a non-success status.
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// No usable connection (refused, DNS, TLS, reset).
    #[error("{0}")]
    Connection(String),

    /// The response body was not what we expected.
    #[error("{0}")]
    Decode(String),
}

/// POST `body` as JSON to `url` and decode the JSON response.
pub fn post_json<B, R>(url: &str, bearer: Option<&str>, body: &B) -> Result<R, HttpFailure>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let mut request = ureq::post(url).set("Content-Type", "application/json");
    if let Some(token) = bearer {
        request = request.set("Authorization", &format!("Bearer {token}"));
    }

    let payload =
        serde_json::to_value(body).map_err(|e| HttpFailure::Decode(e.to_string()))?;

    match request.send_json(payload) {
        Ok(response) => response
            .into_json::<R>()
            .map_err(|e| HttpFailure::Decode(format!("Invalid response body: {e}"))),
        Err(ureq::Error::Status(code, response)) => {
            let raw = response.into_string().unwrap_or_default();
            Err(HttpFailure::Status {
                code,
                message: error_message_from_body(&raw),
            })
        }
        Err(ureq::Error::Transport(transport)) => {
            Err(HttpFailure::Connection(transport.to_string()))
        }
    }
}

/// Pull the human-readable message out of an error body.
///
/// Handles `{"error": "..."}`, `{"error": {"message": "..."}}` and falls back
/// to the raw text.
pub fn error_message_from_body(raw: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(raw) else {
        return raw.trim().to_string();
    };

    let error = json.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| error.and_then(|e| e.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| raw.trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::{closed_port_url, respond_once};
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_from_nested_object() {
        let raw = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message_from_body(raw), "Incorrect API key provided");
    }

    #[test]
    fn error_message_from_flat_string() {
        let raw = r#"{"error":"model \"llama9\" not found, try pulling it first"}"#;
        assert_eq!(
            error_message_from_body(raw),
            "model \"llama9\" not found, try pulling it first"
        );
    }

    #[test]
    fn error_message_falls_back_to_raw_text() {
        assert_eq!(error_message_from_body("  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn post_json_decodes_success() {
        let (base, captured) = respond_once(200, r#"{"ok":true}"#);
        let result: serde_json::Value =
            post_json(&format!("{base}/echo"), Some("sk-test"), &json!({"a": 1})).unwrap();
        assert_eq!(result, json!({"ok": true}));

        let request = captured.recv().unwrap();
        assert_eq!(request.request_line, "POST /echo HTTP/1.1");
        assert!(request
            .headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case("authorization: Bearer sk-test")));
        assert_eq!(request.body, r#"{"a":1}"#);
    }

    #[test]
    fn post_json_reports_status_with_message() {
        let (base, _captured) = respond_once(429, r#"{"error":{"message":"Rate limit reached"}}"#);
        let err = post_json::<_, serde_json::Value>(&base, None, &json!({})).unwrap_err();
        assert_eq!(
            err,
            HttpFailure::Status {
                code: 429,
                message: "Rate limit reached".to_string()
            }
        );
    }

    #[test]
    fn post_json_reports_connection_failure() {
        let err = post_json::<_, serde_json::Value>(&closed_port_url(), None, &json!({}))
            .unwrap_err();
        assert!(matches!(err, HttpFailure::Connection(_)));
    }

    #[test]
    fn post_json_reports_undecodable_body() {
        let (base, _captured) = respond_once(200, "not json");
        let err = post_json::<_, serde_json::Value>(&base, None, &json!({})).unwrap_err();
        assert!(matches!(err, HttpFailure::Decode(_)));
    }
}
