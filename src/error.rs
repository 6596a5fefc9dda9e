/// Channel-level failures.
///
/// Anything that only damages a single frame, content part or tool call is
/// reported as a [`crate::Warning`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CodexError {
    #[error(
        "Codex API error: HTTP {status} {status_text}{}",
        .body.as_deref().filter(|b| !b.is_empty()).map(|b| format!(": {b}")).unwrap_or_default()
    )]
    Http {
        status: u16,
        status_text: String,
        body: Option<String>,
    },

    #[error("failed to reach Codex backend: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("network stream error: {0}")]
    Stream(#[source] reqwest::Error),

    #[error("Codex backend returned no response body")]
    MissingBody,

    #[error("failed to obtain credentials: {0:#}")]
    Credentials(#[source] anyhow::Error),

    #[error("request aborted")]
    Aborted,

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_mentions_status_and_body() {
        let err = CodexError::Http {
            status: 401,
            status_text: "Unauthorized".to_string(),
            body: Some("invalid token".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"), "got: {msg}");
        assert!(msg.contains("invalid token"), "got: {msg}");
    }

    #[test]
    fn http_error_without_body_has_no_trailing_separator() {
        let err = CodexError::Http {
            status: 502,
            status_text: "Bad Gateway".to_string(),
            body: None,
        };
        assert_eq!(err.to_string(), "Codex API error: HTTP 502 Bad Gateway");
    }
}
