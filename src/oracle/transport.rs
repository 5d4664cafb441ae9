//! Oracle transport with streaming support.
//!
//! Provides robust oracle API communication with:
//! - Streaming responses (no total timeout, activity-based timeout)
//! - Non-streaming fallback for endpoints that ignore `stream`
//! - Connection health checks
//!
//! Requests are sent with a spawned `curl` process; the request body is
//! piped through stdin because inlined screenshots routinely exceed the
//! argv size limit.

use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use async_trait::async_trait;

use crate::config::{self, OracleSettings};

/// Result type for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors that can occur during oracle operations
#[derive(Debug)]
pub enum OracleError {
    /// Failed to connect to the oracle endpoint, or the endpoint rejected
    /// the request (auth, quota, malformed payload)
    Connection(String),
    /// No activity for too long during streaming
    ActivityTimeout(Duration),
    /// The endpoint answered with something that is not a model response
    InvalidResponse(String),
    /// Structured content was requested but the response carried none
    Parse(String),
    /// IO error
    Io(std::io::Error),
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Connection(msg) => write!(f, "Connection failed: {}", msg),
            OracleError::ActivityTimeout(d) => write!(f, "No response for {:?}", d),
            OracleError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            OracleError::Parse(msg) => write!(f, "Unparseable structured content: {}", msg),
            OracleError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for OracleError {}

impl From<std::io::Error> for OracleError {
    fn from(e: std::io::Error) -> Self {
        OracleError::Io(e)
    }
}

/// One content part of a user turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

/// Base64-inlined image payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64_png(data: String) -> Self {
        Self {
            kind: "base64".to_string(),
            media_type: "image/png".to_string(),
            data,
        }
    }
}

/// One turn of the accumulated exchange.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Turn {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// A complete oracle request: optional system prompt plus ordered turns.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OracleRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Turn>,
}

/// Transport capable of sending an [`OracleRequest`] and returning the
/// model's text.
#[async_trait]
pub trait OracleTransport: Send + Sync {
    async fn invoke(&self, request: &OracleRequest) -> OracleResult<String>;
}

/// Check if an oracle endpoint is reachable (connection-only check).
///
/// This only verifies the server accepts connections - it doesn't wait for a
/// full response since vision requests can take 30+ seconds.
pub async fn check_health(endpoint: &str, timeout_secs: u64) -> OracleResult<bool> {
    let scheme = if endpoint.starts_with("http://") { "http" } else { "https" };
    let url = endpoint.trim_start_matches("http://").trim_start_matches("https://");
    let host = url.split('/').next().unwrap_or("127.0.0.1:443");

    let output = Command::new("curl")
        .args([
            "-s",
            "-o", "/dev/null",
            "-w", "%{http_code}",
            "--connect-timeout", &timeout_secs.to_string(),
            "--max-time", &timeout_secs.to_string(),
            "-I",
            &format!("{}://{}", scheme, host),
        ])
        .output()
        .await?;

    let status = String::from_utf8_lossy(&output.stdout);
    // Any response (even 4xx/5xx) means the server is reachable;
    // 000 means the connection failed entirely.
    let code: u16 = status.trim().parse().unwrap_or(0);
    Ok(code > 0)
}

/// Production [`OracleTransport`] speaking the messages API over `curl`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    settings: OracleSettings,
}

impl HttpTransport {
    /// Transport configured from the global configuration.
    pub fn new() -> Self {
        Self {
            settings: config::get().oracle.clone(),
        }
    }

    /// Transport with explicit settings.
    pub fn with_settings(settings: OracleSettings) -> Self {
        Self { settings }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.settings.endpoint = endpoint.into();
        self
    }

    pub fn activity_timeout(mut self, seconds: u64) -> Self {
        self.settings.activity_timeout = seconds;
        self
    }

    fn curl_command(&self) -> Command {
        let mut cmd = Command::new("curl");
        cmd.args([
            "-s",
            "-N",
            "-X", "POST",
            &self.settings.endpoint,
            "-H", "Content-Type: application/json",
            "-H", &format!("x-api-key: {}", self.settings.api_key),
            "-H", "anthropic-version: 2023-06-01",
            "--connect-timeout", &self.settings.connect_timeout.to_string(),
            "-d", "@-",
        ]);
        cmd
    }

    fn request_body(&self, request: &OracleRequest, stream: bool) -> OracleResult<String> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        if stream {
            body["stream"] = serde_json::Value::Bool(true);
        }
        serde_json::to_string(&body).map_err(|e| OracleError::InvalidResponse(e.to_string()))
    }

    async fn invoke_streaming(&self, request: &OracleRequest) -> OracleResult<String> {
        let body = self.request_body(request, true)?;
        let activity_timeout = Duration::from_secs(self.settings.activity_timeout);

        let mut child = self
            .curl_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OracleError::Io(std::io::Error::other("Failed to open curl stdin")))?;
        stdin.write_all(body.as_bytes()).await?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OracleError::Io(std::io::Error::other("Failed to capture curl stdout")))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut full_content = String::new();
        loop {
            let line = match tokio::time::timeout(activity_timeout, lines.next_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(OracleError::Io(e)),
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(OracleError::ActivityTimeout(activity_timeout));
                }
            };

            if let Some(fault) = parse_sse_line(&line, &mut full_content) {
                let _ = child.kill().await;
                return Err(OracleError::Connection(fault));
            }
        }

        let status = child.wait().await?;
        if !status.success() && full_content.is_empty() {
            return Err(OracleError::Connection("curl process failed".to_string()));
        }

        // If streaming yielded nothing, the endpoint probably ignored the
        // stream flag; retry without it.
        if full_content.is_empty() {
            return self.invoke_non_streaming(request).await;
        }

        Ok(full_content)
    }

    async fn invoke_non_streaming(&self, request: &OracleRequest) -> OracleResult<String> {
        let body = self.request_body(request, false)?;

        let mut child = self
            .curl_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OracleError::Io(std::io::Error::other("Failed to open curl stdin")))?;
        stdin.write_all(body.as_bytes()).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(OracleError::Connection(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let response: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        extract_message_text(&response)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OracleTransport for HttpTransport {
    async fn invoke(&self, request: &OracleRequest) -> OracleResult<String> {
        self.invoke_streaming(request).await
    }
}

/// Parse one SSE line, appending any text delta to `content`.
///
/// Returns `Some(message)` when the line carries a server-reported error.
fn parse_sse_line(line: &str, content: &mut String) -> Option<String> {
    let data = line.strip_prefix("data: ")?;
    let json: serde_json::Value = serde_json::from_str(data).ok()?;

    match json["type"].as_str() {
        Some("content_block_delta") => {
            if let Some(text) = json["delta"]["text"].as_str() {
                content.push_str(text);
            }
            None
        }
        Some("error") => Some(
            json["error"]["message"]
                .as_str()
                .unwrap_or("unknown server error")
                .to_string(),
        ),
        _ => None,
    }
}

/// Extract the model text from a non-streaming messages response.
fn extract_message_text(response: &serde_json::Value) -> OracleResult<String> {
    if response["type"].as_str() == Some("error") {
        return Err(OracleError::Connection(
            response["error"]["message"]
                .as_str()
                .unwrap_or("unknown server error")
                .to_string(),
        ));
    }

    let blocks = response["content"]
        .as_array()
        .ok_or_else(|| OracleError::InvalidResponse("response carries no content".to_string()))?;

    let mut text = String::new();
    for block in blocks {
        if block["type"].as_str() == Some("text") {
            if let Some(part) = block["text"].as_str() {
                text.push_str(part);
            }
        }
    }

    if text.is_empty() {
        return Err(OracleError::InvalidResponse(
            "response carries no text blocks".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sse_text_delta() {
        let mut content = String::new();
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"<action>"}}"#;
        assert!(parse_sse_line(line, &mut content).is_none());
        assert_eq!(content, "<action>");
    }

    #[test]
    fn test_parse_sse_ignores_other_events() {
        let mut content = String::new();
        for line in [
            r#"data: {"type":"message_start","message":{}}"#,
            r#"data: {"type":"content_block_stop","index":0}"#,
            "event: ping",
            "",
        ] {
            assert!(parse_sse_line(line, &mut content).is_none());
        }
        assert!(content.is_empty());
    }

    #[test]
    fn test_parse_sse_surfaces_server_error() {
        let mut content = String::new();
        let line = r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(parse_sse_line(line, &mut content), Some("Overloaded".to_string()));
    }

    #[test]
    fn test_extract_message_text() {
        let response = json!({
            "type": "message",
            "content": [
                {"type": "text", "text": "first "},
                {"type": "text", "text": "second"}
            ]
        });
        assert_eq!(extract_message_text(&response).unwrap(), "first second");
    }

    #[test]
    fn test_extract_message_text_error_payload() {
        let response = json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        });
        let err = extract_message_text(&response).unwrap_err();
        assert!(matches!(err, OracleError::Connection(msg) if msg.contains("x-api-key")));
    }

    #[test]
    fn test_extract_message_text_empty_content() {
        let response = json!({"type": "message", "content": []});
        assert!(matches!(
            extract_message_text(&response),
            Err(OracleError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_request_serialization_shape() {
        let request = OracleRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            system: Some("be terse".to_string()),
            messages: vec![Turn {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Text { text: "look at this".to_string() },
                    ContentBlock::Image {
                        source: ImageSource::base64_png("aGk=".to_string()),
                    },
                ],
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "be terse");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["type"], "image");
        assert_eq!(value["messages"][0]["content"][1]["source"]["type"], "base64");
        assert_eq!(value["messages"][0]["content"][1]["source"]["media_type"], "image/png");
    }

    #[test]
    fn test_request_omits_absent_system() {
        let request = OracleRequest {
            model: "m".to_string(),
            max_tokens: 16,
            system: None,
            messages: vec![],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_transport_builder() {
        let transport = HttpTransport::with_settings(OracleSettings::defaults())
            .endpoint("http://localhost:9000/v1/messages")
            .activity_timeout(30);
        assert_eq!(transport.settings.endpoint, "http://localhost:9000/v1/messages");
        assert_eq!(transport.settings.activity_timeout, 30);
    }
}
