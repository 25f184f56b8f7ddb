//! JSON-RPC transport layer for language server communication.
//!
//! Frames messages with `Content-Length` headers over any async byte
//! streams. Production wires this to the server process stdio; tests use
//! `tokio::io::duplex` pipes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// JSON-RPC message types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: i64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: i64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A successful response carrying `result`.
    pub fn success(id: i64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// An error response.
    pub fn failure(id: i64, code: i64, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Write half of the transport.
pub struct MessageWriter<W> {
    sink: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Sends one framed JSON-RPC message.
    pub async fn write(&mut self, message: &JsonRpcMessage) -> Result<()> {
        let content = serde_json::to_string(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", content.len());

        self.sink.write_all(header.as_bytes()).await?;
        self.sink.write_all(content.as_bytes()).await?;
        self.sink.flush().await?;

        log::trace!("Sent: {}", content);
        Ok(())
    }
}

/// Read half of the transport.
pub struct MessageReader<R> {
    source: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source: BufReader::new(source),
        }
    }

    /// Reads the next framed message as raw JSON. Returns
    /// [`Error::ChannelClosed`] on clean EOF.
    pub async fn read(&mut self) -> Result<Value> {
        let mut content_length: Option<usize> = None;
        let mut header_line = String::new();

        loop {
            header_line.clear();
            let bytes_read = self.source.read_line(&mut header_line).await?;
            if bytes_read == 0 {
                return Err(Error::ChannelClosed);
            }

            let line = header_line.trim();
            if line.is_empty() {
                break;
            }

            if let Some(len_str) = line.strip_prefix("Content-Length: ") {
                content_length = Some(
                    len_str
                        .parse()
                        .map_err(|_| Error::Framing(format!("bad Content-Length: {line}")))?,
                );
            }
        }

        let content_length = content_length
            .ok_or_else(|| Error::Framing("missing Content-Length header".to_string()))?;

        let mut content = vec![0u8; content_length];
        self.source.read_exact(&mut content).await?;

        let content_str = String::from_utf8(content)
            .map_err(|_| Error::Framing("message body is not UTF-8".to_string()))?;

        log::trace!("Received: {}", content_str);

        Ok(serde_json::from_str(&content_str)?)
    }
}

/// Classifies a raw JSON value as a request, response, or notification.
pub fn parse_message(value: &Value) -> Option<JsonRpcMessage> {
    let has_id = value.get("id").is_some();
    let has_method = value.get("method").is_some();

    match (has_id, has_method) {
        (true, false) => serde_json::from_value(value.clone())
            .ok()
            .map(JsonRpcMessage::Response),
        (true, true) => serde_json::from_value(value.clone())
            .ok()
            .map(JsonRpcMessage::Request),
        (false, true) => serde_json::from_value(value.clone())
            .ok()
            .map(JsonRpcMessage::Notification),
        (false, false) => None,
    }
}
