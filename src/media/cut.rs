use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::CutError;

use super::process::ProcessRunner;

pub const FFMPEG: &str = "ffmpeg";

/// Copies `[start, start + duration)` of a media file into a new file
/// without re-encoding.
pub trait Cutter: Send + Sync {
    fn cut(&self, source: &Path, start: f64, duration: f64, dest: &Path) -> Result<(), CutError>;
}

/// Stream-copy cutter backed by `ffmpeg`.
pub struct FfmpegCutter {
    runner: Arc<dyn ProcessRunner>,
}

impl FfmpegCutter {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

impl Cutter for FfmpegCutter {
    fn cut(&self, source: &Path, start: f64, duration: f64, dest: &Path) -> Result<(), CutError> {
        let args = cut_args(source, start, duration, dest);

        let output = self.runner.run(FFMPEG, &args).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CutError::ToolMissing {
                    tool: FFMPEG.to_string(),
                }
            } else {
                CutError::Spawn {
                    tool: FFMPEG.to_string(),
                    source: e,
                }
            }
        })?;

        if !output.success {
            return Err(CutError::Failed {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        debug!("Cut {} -> {}", source.display(), dest.display());
        Ok(())
    }
}

/// Build the ffmpeg arguments for one stream-copy segment.
///
/// Seeks before the input for speed, maps every stream, and shifts
/// timestamps so the segment never starts negative.
pub fn cut_args(source: &Path, start: f64, duration: f64, dest: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-y".into(),
        "-ss".into(),
        format_timestamp(start),
        "-i".into(),
        source.to_string_lossy().into_owned(),
        "-t".into(),
        format!("{:.3}", duration.max(0.0)),
        "-c".into(),
        "copy".into(),
        "-map".into(),
        "0".into(),
        "-avoid_negative_ts".into(),
        "make_non_negative".into(),
        "-movflags".into(),
        "+faststart".into(),
        dest.to_string_lossy().into_owned(),
    ]
}

/// Format seconds as `HH:MM:SS.mmm` for `-ss`.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };

    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    format!("{hours:02}:{minutes:02}:{secs:02}.{ms:03}")
}
