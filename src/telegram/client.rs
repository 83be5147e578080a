use std::io;
use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::SendError;

use super::{MessageId, Messenger, ProgressFn};

/// Public Bot API server. A self-hosted server lifts the upload limit.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Size of each chunk streamed into an upload body.
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Telegram Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    /// Create a new client for the given bot token.
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            token,
        }
    }

    /// Point the client at a different Bot API server.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    /// Send a request and unwrap the Bot API envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, SendError> {
        let response = request.send().await?;
        let status = response.status();
        debug!("Telegram {} response status: {}", method, status);

        let body = response.text().await?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) => {
                return Err(SendError::Api {
                    code: status.as_u16(),
                    description: body.chars().take(500).collect(),
                })
            }
        };

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| SendError::MissingResult(method.to_string()));
        }

        let description = envelope
            .description
            .unwrap_or_else(|| format!("{method} failed"));

        if let Some(seconds) = envelope.parameters.and_then(|p| p.retry_after) {
            return Err(SendError::FloodWait {
                seconds,
                description,
            });
        }

        Err(SendError::Api {
            code: envelope.error_code.unwrap_or(status.as_u16()),
            description,
        })
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<MessageId, SendError> {
        let request = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }));

        let message: SentMessage = self.call("sendMessage", request).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), SendError> {
        let request = self
            .client
            .post(self.method_url("editMessageText"))
            .json(&json!({ "chat_id": chat_id, "message_id": message_id, "text": text }));

        // Result is the edited message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", request).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_id: MessageId) -> Result<(), SendError> {
        let request = self
            .client
            .post(self.method_url("deleteMessage"))
            .json(&json!({ "chat_id": chat_id, "message_id": message_id }));

        let _: bool = self.call("deleteMessage", request).await?;
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: &str,
        path: &Path,
        file_name: &str,
        progress: ProgressFn,
    ) -> Result<MessageId, SendError> {
        let file = File::open(path).await?;
        let total = file.metadata().await?.len();

        debug!("Uploading {} ({} bytes) as {}", path.display(), total, file_name);

        let body = Body::wrap_stream(progress_stream(file, total, progress));
        let document = Part::stream_with_length(body, total)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", document);

        let request = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form);

        let message: SentMessage = self.call("sendDocument", request).await?;
        Ok(message.message_id)
    }
}

/// Stream a file in chunks, reporting cumulative bytes after each one.
fn progress_stream(
    file: File,
    total: u64,
    progress: ProgressFn,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    stream::unfold((file, 0u64, false), move |(mut file, sent, failed)| {
        let progress = progress.clone();
        async move {
            if failed {
                return None;
            }

            let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    let sent = sent + n as u64;
                    progress(sent, total);
                    Some((Ok(buf), (file, sent, false)))
                }
                Err(e) => Some((Err(e), (file, sent, true))),
            }
        }
    })
}

// API response types

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: MessageId,
}
