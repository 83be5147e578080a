use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SendError;
use crate::split::PartFile;
use crate::telegram::{
    handle_flood_wait, MessageId, Messenger, ProgressFn, Sleeper, TokioSleeper,
};

/// Status edits happen at most once per this many percent.
const PROGRESS_STEP_PERCENT: u64 = 5;

/// How long a success status stays visible before it is deleted.
const DEFAULT_STATUS_LINGER: Duration = Duration::from_secs(3);

/// Outcome of uploading a single part.
#[derive(Debug, Clone)]
pub struct PartOutcome {
    pub index: usize,
    pub message_id: Option<MessageId>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl PartOutcome {
    /// One line for the run summary.
    pub fn summary_line(&self) -> String {
        let seconds = self.duration_ms as f64 / 1000.0;
        match (self.message_id, &self.error) {
            (Some(id), _) => format!("Part {}: message {} in {:.2}s", self.index, id, seconds),
            (None, Some(error)) => {
                format!("Part {}: failed after {:.2}s: {}", self.index, seconds, error)
            }
            (None, None) => format!("Part {}: failed after {:.2}s", self.index, seconds),
        }
    }
}

/// Ordered per-part outcomes of one batch.
#[derive(Debug, Clone, Default)]
pub struct UploadResult {
    pub outcomes: Vec<PartOutcome>,
    pub total_time: Duration,
}

impl UploadResult {
    /// Message ids of the parts that were sent, in part order. Failed parts
    /// are omitted.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.outcomes.iter().filter_map(|o| o.message_id).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.message_id.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Final status line for the chat.
    pub fn status_text(&self, file_name: &str) -> String {
        if self.is_complete() {
            format!(
                "Finished sending '{}' in {} parts.",
                file_name,
                self.outcomes.len()
            )
        } else {
            format!(
                "Finished sending '{}'. {} parts sent, but some failed.",
                file_name,
                self.succeeded()
            )
        }
    }
}

/// Sends files to one chat, strictly in order, with per-file status
/// messages and a single rate-limited retry.
pub struct UploadOrchestrator {
    messenger: Arc<dyn Messenger>,
    sleeper: Arc<dyn Sleeper>,
    chat_id: String,
    status_messages: bool,
    show_progress: bool,
    status_linger: Duration,
}

impl UploadOrchestrator {
    /// Create a new orchestrator sending to `chat_id`.
    pub fn new(messenger: Arc<dyn Messenger>, chat_id: impl Into<String>) -> Self {
        Self {
            messenger,
            sleeper: Arc::new(TokioSleeper),
            chat_id: chat_id.into(),
            status_messages: true,
            show_progress: true,
            status_linger: DEFAULT_STATUS_LINGER,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Enable or disable status messages in the chat.
    pub fn with_status_messages(mut self, enabled: bool) -> Self {
        self.status_messages = enabled;
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_status_linger(mut self, linger: Duration) -> Self {
        self.status_linger = linger;
        self
    }

    /// Send all parts in order. A failed part is recorded and the batch
    /// continues with the next one.
    pub async fn upload_parts(&self, file_name: &str, parts: &[PartFile]) -> UploadResult {
        let started = Instant::now();
        let total = parts.len();

        let announcement = if self.status_messages {
            self.post_status(&format!("Sending '{}' in {} parts...", file_name, total))
                .await
        } else {
            None
        };

        let mut outcomes = Vec::with_capacity(total);

        for part in parts {
            let display_name = part_display_name(file_name, part.index, total);
            info!("Sending part {}: {}", part.index, part.path.display());

            let part_started = Instant::now();
            let result = self.send_file(&part.path, &display_name).await;
            let duration_ms = part_started.elapsed().as_millis() as u64;

            match result {
                Ok(message_id) => {
                    info!("Sent part {}, message ID: {}", part.index, message_id);
                    outcomes.push(PartOutcome {
                        index: part.index,
                        message_id: Some(message_id),
                        error: None,
                        duration_ms,
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to send part {} ({}): {}",
                        part.index,
                        part.path.display(),
                        e
                    );
                    outcomes.push(PartOutcome {
                        index: part.index,
                        message_id: None,
                        error: Some(e.to_string()),
                        duration_ms,
                    });
                }
            }
        }

        let result = UploadResult {
            outcomes,
            total_time: started.elapsed(),
        };

        info!(
            "Upload complete: {}/{} parts sent in {:.2}s",
            result.succeeded(),
            total,
            result.total_time.as_secs_f64()
        );

        if self.status_messages {
            let final_text = result.status_text(file_name);
            match announcement {
                Some(id) => {
                    if let Err(e) = self
                        .messenger
                        .edit_message(&self.chat_id, id, &final_text)
                        .await
                    {
                        warn!("Failed to edit final status message: {}", e);
                        self.post_status(&final_text).await;
                    }
                }
                None => {
                    self.post_status(&final_text).await;
                }
            }
        }

        result
    }

    /// Send one file with a status message, progress reporting, and a single
    /// retry after a rate-limit wait.
    pub async fn send_file(
        &self,
        path: &Path,
        display_name: &str,
    ) -> Result<MessageId, SendError> {
        let size = tokio::fs::metadata(path).await?.len();
        let size_mb = size as f64 / 1024.0 / 1024.0;

        let status = if self.status_messages {
            self.post_status(&format!("⬆️ Sending: {} ({:.2} MB)", display_name, size_mb))
                .await
        } else {
            None
        };

        let progress_bar = self.show_progress.then(|| {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                         {bytes}/{total_bytes} ({eta}) {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_message(display_name.to_string());
            pb
        });

        let (tx, mut rx) = watch::channel((0u64, size));
        let progress: ProgressFn = {
            let pb = progress_bar.clone();
            Arc::new(move |sent: u64, total: u64| {
                if let Some(ref pb) = pb {
                    pb.set_length(total);
                    pb.set_position(sent);
                }
                tx.send_replace((sent, total));
            })
        };

        let started = Instant::now();
        info!("Starting upload for: {}", display_name);

        let mut result = self
            .send_tracked(path, display_name, progress.clone(), status, &mut rx)
            .await;

        if let Err(ref e) = result {
            warn!("Error sending {}: {}", display_name, e);
            if handle_flood_wait(&e.to_string(), self.sleeper.as_ref()).await {
                info!("Flood wait handled for {}. Retrying...", display_name);
                result = self
                    .send_tracked(path, display_name, progress, status, &mut rx)
                    .await;
                if result.is_ok() {
                    info!("Retry successful for {}", display_name);
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();

        if let Some(pb) = progress_bar {
            if result.is_ok() {
                pb.finish_with_message(format!("✓ {display_name}"));
            } else {
                pb.abandon_with_message(format!("✗ {display_name}"));
            }
        }

        match &result {
            Ok(_) => {
                let text = format!(
                    "✅ Sent: {} ({:.2} MB) in {:.2} s",
                    display_name, size_mb, elapsed
                );
                info!("{}", text);
                self.finish_success_status(status, &text).await;
            }
            Err(e) => {
                let text = format!(
                    "❌ Failed to send {} after {:.2} s: {}",
                    display_name, elapsed, e
                );
                warn!("{}", text);
                self.finish_failure_status(status, &text).await;
            }
        }

        result
    }

    /// Run one upload attempt, editing the status message as progress
    /// crosses each step.
    async fn send_tracked(
        &self,
        path: &Path,
        display_name: &str,
        progress: ProgressFn,
        status: Option<MessageId>,
        rx: &mut watch::Receiver<(u64, u64)>,
    ) -> Result<MessageId, SendError> {
        let send = self
            .messenger
            .send_file(&self.chat_id, path, display_name, progress);
        tokio::pin!(send);

        let mut last_step: Option<u64> = None;

        loop {
            tokio::select! {
                result = &mut send => return result,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return send.await;
                    }
                    let (sent, total) = *rx.borrow_and_update();
                    let Some(message_id) = status else { continue };
                    let Some(step) = progress_step(sent, total, last_step) else { continue };
                    last_step = Some(step);

                    let text = format!(
                        "⬆️ Sending: {} ({:.2}/{:.2} MB) {}%",
                        display_name,
                        sent as f64 / 1024.0 / 1024.0,
                        total as f64 / 1024.0 / 1024.0,
                        step
                    );
                    let edit = self
                        .messenger
                        .edit_message(&self.chat_id, message_id, &text)
                        .await;
                    if let Err(e) = edit {
                        if !handle_flood_wait(&e.to_string(), self.sleeper.as_ref()).await {
                            warn!(
                                "Could not update progress message for {}: {}",
                                display_name, e
                            );
                        }
                    }
                }
            }
        }
    }

    async fn post_status(&self, text: &str) -> Option<MessageId> {
        match self.messenger.send_message(&self.chat_id, text).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Could not send status message: {}", e);
                None
            }
        }
    }

    async fn finish_success_status(&self, status: Option<MessageId>, text: &str) {
        if !self.status_messages {
            return;
        }

        let Some(message_id) = status else {
            self.post_status(text).await;
            return;
        };

        match self.messenger.edit_message(&self.chat_id, message_id, text).await {
            Ok(()) => self.sleeper.sleep(self.status_linger).await,
            Err(e) => warn!("Failed to edit success message: {}", e),
        }

        if let Err(e) = self.messenger.delete_message(&self.chat_id, message_id).await {
            if !is_missing_message(&e) {
                warn!("Failed to delete status message: {}", e);
            }
        }
    }

    async fn finish_failure_status(&self, status: Option<MessageId>, text: &str) {
        if !self.status_messages {
            return;
        }

        match status {
            Some(message_id) => {
                if let Err(e) = self
                    .messenger
                    .edit_message(&self.chat_id, message_id, text)
                    .await
                {
                    debug!("Failed to edit failure message: {}", e);
                    self.post_status(text).await;
                }
            }
            None => {
                self.post_status(text).await;
            }
        }
    }
}

/// `"<name> (Part i/N)"`
pub fn part_display_name(file_name: &str, index: usize, total: usize) -> String {
    format!("{} (Part {}/{})", file_name, index, total)
}

/// The progress step to report, if a new one has been reached.
fn progress_step(sent: u64, total: u64, last_step: Option<u64>) -> Option<u64> {
    if total == 0 {
        return None;
    }
    let percent = (sent.min(total) * 100) / total;
    let step = percent - percent % PROGRESS_STEP_PERCENT;
    (last_step != Some(step)).then_some(step)
}

/// Deleting a message that is already gone is not worth a warning.
fn is_missing_message(error: &SendError) -> bool {
    let text = error.to_string();
    text.contains("message to delete not found") || text.contains("MESSAGE_ID_INVALID")
}
