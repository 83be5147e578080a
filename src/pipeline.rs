use crate::config::Config;
use crate::error::{Result, TgsplitError};
use crate::media::{detect_mime, is_video, ProcessRunner, SystemRunner, OCTET_STREAM};
use crate::split::{split_generic, PartFile, PartSet, SplitKind, VideoSplitter};
use crate::telegram::{MessageId, Messenger, Sleeper, TelegramClient, TokioSleeper};
use crate::upload::{PartOutcome, UploadOrchestrator};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-run options that do not come from the config file.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Destination chat id or `@channel` username.
    pub chat_id: String,
    /// Show progress bars.
    pub show_progress: bool,
}

impl PipelineConfig {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            show_progress: true,
        }
    }
}

/// External services the pipeline talks to.
pub struct Collaborators {
    pub messenger: Arc<dyn Messenger>,
    pub runner: Arc<dyn ProcessRunner>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Collaborators {
    /// The Bot API client plus the real ffmpeg tools.
    pub fn telegram(config: &Config) -> Result<Self> {
        let token = config.bot_token.clone().ok_or_else(|| {
            TgsplitError::Config(
                "Bot token not set. Set TGSPLIT_BOT_TOKEN environment variable.".to_string(),
            )
        })?;

        Ok(Self {
            messenger: Arc::new(
                TelegramClient::new(token).with_api_url(config.api_url.clone()),
            ),
            runner: Arc::new(SystemRunner),
            sleeper: Arc::new(TokioSleeper),
        })
    }
}

/// Statistics from one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_time: Duration,
    pub split_time: Duration,
    pub upload_time: Duration,
    pub file_size: u64,
    pub parts_sent: usize,
    pub parts_failed: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Ids of the delivered messages, in part order.
    pub message_ids: Vec<MessageId>,
    /// Whether every part was delivered.
    pub complete: bool,
    pub part_count: usize,
    /// `None` when the file was small enough to send whole.
    pub split: Option<SplitKind>,
    /// Per-part delivery details, in part order.
    pub outcomes: Vec<PartOutcome>,
    pub stats: PipelineStats,
}

impl PipelineResult {
    /// The line printed on stdout: one id, or ids joined by commas.
    pub fn output_line(&self) -> String {
        self.message_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Outcomes of the parts that were not delivered.
    pub fn failures(&self) -> impl Iterator<Item = &PartOutcome> {
        self.outcomes.iter().filter(|o| o.message_id.is_none())
    }
}

/// Send a file to a chat, splitting it first if it exceeds the ceiling.
pub async fn upload_file(
    input: &Path,
    config: &Config,
    pipeline_config: PipelineConfig,
) -> Result<PipelineResult> {
    let collaborators = Collaborators::telegram(config)?;
    upload_file_with(input, config, pipeline_config, collaborators).await
}

/// [`upload_file`] with injected collaborators.
pub async fn upload_file_with(
    input: &Path,
    config: &Config,
    pipeline_config: PipelineConfig,
    collaborators: Collaborators,
) -> Result<PipelineResult> {
    let start_time = Instant::now();

    if !input.is_file() {
        return Err(TgsplitError::FileNotFound(input.display().to_string()));
    }

    let file_size = std::fs::metadata(input)?.len();
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let orchestrator = UploadOrchestrator::new(collaborators.messenger, pipeline_config.chat_id)
        .with_sleeper(collaborators.sleeper)
        .with_status_messages(config.status_messages)
        .with_progress(pipeline_config.show_progress);

    info!(
        "File: {} ({:.2} MB), limit: {:.2} MB",
        input.display(),
        file_size as f64 / 1024.0 / 1024.0,
        config.max_file_size() as f64 / 1024.0 / 1024.0
    );

    // Small enough to go in one piece
    if file_size <= config.max_file_size() {
        let upload_start = Instant::now();
        let message_id = orchestrator.send_file(input, &file_name).await?;
        let upload_time = upload_start.elapsed();

        return Ok(PipelineResult {
            message_ids: vec![message_id],
            complete: true,
            part_count: 1,
            split: None,
            outcomes: vec![PartOutcome {
                index: 1,
                message_id: Some(message_id),
                error: None,
                duration_ms: upload_time.as_millis() as u64,
            }],
            stats: PipelineStats {
                total_time: start_time.elapsed(),
                split_time: Duration::ZERO,
                upload_time,
                file_size,
                parts_sent: 1,
                parts_failed: 0,
            },
        });
    }

    info!("File exceeds limit, splitting...");
    let split_start = Instant::now();

    let mime = detect_mime(input).unwrap_or_else(|e| {
        warn!("Could not detect file type ({}), treating as binary", e);
        OCTET_STREAM.to_string()
    });
    debug!("Detected MIME type: {}", mime);

    let split_config = config.split_config();
    let (kind, parts): (SplitKind, Vec<PartFile>) = if is_video(&mime) {
        info!("Detected video file, splitting by duration");
        let splitter = VideoSplitter::with_runner(collaborators.runner, split_config);
        (SplitKind::Video, splitter.split(input)?)
    } else {
        info!("Non-video file, splitting by size");
        (SplitKind::Generic, split_generic(input, split_config.part_size)?)
    };

    if parts.is_empty() {
        return Err(crate::error::SplitError::NoParts {
            path: input.display().to_string(),
            size: file_size,
        }
        .into());
    }

    let split_time = split_start.elapsed();
    info!(
        "Created {} {} parts in {:.2}s",
        parts.len(),
        kind,
        split_time.as_secs_f64()
    );

    // Parts are removed when this guard drops unless they are kept
    let part_set = PartSet::from_parts(parts);

    let upload_start = Instant::now();
    let upload = orchestrator
        .upload_parts(&file_name, part_set.parts())
        .await;
    let upload_time = upload_start.elapsed();

    let part_count = part_set.len();
    if config.keep_parts {
        let kept = part_set.into_parts();
        info!("Keeping {} part files beside the source", kept.len());
    } else {
        debug!("Cleaning up {} part files", part_count);
        drop(part_set);
    }

    Ok(PipelineResult {
        message_ids: upload.message_ids(),
        complete: upload.is_complete(),
        part_count,
        split: Some(kind),
        stats: PipelineStats {
            total_time: start_time.elapsed(),
            split_time,
            upload_time,
            file_size,
            parts_sent: upload.succeeded(),
            parts_failed: upload.failed(),
        },
        outcomes: upload.outcomes,
    })
}

/// Print a summary of the run to stderr.
pub fn print_summary(result: &PipelineResult) {
    eprintln!();
    eprintln!("═══════════════════════════════════════════════════════════════");
    if result.complete {
        eprintln!("                        Upload Complete                        ");
    } else {
        eprintln!("                  Upload Finished With Failures                ");
    }
    eprintln!("═══════════════════════════════════════════════════════════════");
    eprintln!();
    eprintln!(
        "  Size:       {:.2} MB",
        result.stats.file_size as f64 / 1024.0 / 1024.0
    );
    match result.split {
        Some(kind) => eprintln!("  Split:      {} ({} parts)", kind, result.part_count),
        None => eprintln!("  Split:      not needed"),
    }
    eprintln!(
        "  Sent:       {} of {}",
        result.stats.parts_sent, result.part_count
    );
    eprintln!("  Messages:   {}", result.output_line());
    eprintln!();
    eprintln!("  Parts:");
    for outcome in &result.outcomes {
        eprintln!("    {}", outcome.summary_line());
    }
    eprintln!();
    eprintln!("  Timing:");
    eprintln!(
        "    Split:       {:.2}s",
        result.stats.split_time.as_secs_f64()
    );
    eprintln!(
        "    Upload:      {:.2}s",
        result.stats.upload_time.as_secs_f64()
    );
    eprintln!(
        "    Total:       {:.2}s",
        result.stats.total_time.as_secs_f64()
    );
    eprintln!();
    eprintln!("═══════════════════════════════════════════════════════════════");
}
