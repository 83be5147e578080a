pub mod client;
pub mod flood;

pub use client::{TelegramClient, DEFAULT_API_URL};
pub use flood::{handle_flood_wait, FloodWait, Sleeper, TokioSleeper};

use crate::error::SendError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub type MessageId = i64;

/// Upload progress callback: `(bytes sent, total bytes)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// The messaging operations the uploader needs.
///
/// Errors must render their rate-limit signal in `Display` so that
/// `handle_flood_wait` can recognize it.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<MessageId, SendError>;

    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), SendError>;

    async fn delete_message(&self, chat_id: &str, message_id: MessageId) -> Result<(), SendError>;

    /// Upload a file as a document, reporting progress as bytes go out.
    async fn send_file(
        &self,
        chat_id: &str,
        path: &Path,
        file_name: &str,
        progress: ProgressFn,
    ) -> Result<MessageId, SendError>;
}
