use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tgsplit::config::Config;
use tgsplit::pipeline::{print_summary, upload_file, PipelineConfig};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "tgsplit")]
#[command(version, about = "Send files to Telegram, splitting them when they are too large")]
#[command(long_about = "Send a file to a Telegram chat. Files over the size limit are split first: \
videos into independently playable segments with ffmpeg, anything else into raw byte parts.")]
struct Cli {
    /// Target chat id or @channel username
    #[arg(allow_negative_numbers = true)]
    chat_id: String,

    /// File to send
    file: PathBuf,

    /// Maximum size of a single upload in bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Part size in bytes for non-video files
    #[arg(long)]
    part_size: Option<u64>,

    /// Keep part files after uploading
    #[arg(long)]
    keep_parts: bool,

    /// Do not post status messages to the chat
    #[arg(long)]
    no_status: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(max_size) = self.max_size {
            config.max_file_size = Some(max_size);
        }
        if let Some(part_size) = self.part_size {
            config.part_size = Some(part_size);
        }
        if self.keep_parts {
            config.keep_parts = true;
        }
        if self.no_status {
            config.status_messages = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    // stdout carries the message ids
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    config
        .validate()
        .context("Configuration validation failed")?;

    info!("File:  {}", cli.file.display());
    info!("Chat:  {}", cli.chat_id);

    let pipeline_config = PipelineConfig {
        chat_id: cli.chat_id.clone(),
        show_progress: !cli.no_progress,
    };

    let result = upload_file(&cli.file, &config, pipeline_config)
        .await
        .with_context(|| format!("Failed to send {}", cli.file.display()))?;

    print_summary(&result);

    if !result.message_ids.is_empty() {
        println!("{}", result.output_line());
    }

    if result.complete {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            "{} of {} parts failed to send",
            result.stats.parts_failed, result.part_count
        );
        for failure in result.failures() {
            warn!("{}", failure.summary_line());
        }
        Ok(ExitCode::FAILURE)
    }
}
