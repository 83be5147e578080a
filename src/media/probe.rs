use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::ProbeError;

use super::process::ProcessRunner;

pub const FFPROBE: &str = "ffprobe";

/// Measures the playable duration of a media file, in seconds.
pub trait Prober: Send + Sync {
    /// Returns a duration strictly greater than zero, or an error.
    fn probe(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Duration prober backed by `ffprobe` JSON output.
pub struct FfprobeProber {
    runner: Arc<dyn ProcessRunner>,
}

impl FfprobeProber {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn run_json(&self, path: &Path, entries: &[&str]) -> Result<String, ProbeError> {
        let mut args: Vec<String> = vec!["-v".into(), "error".into()];
        args.extend(entries.iter().map(|s| s.to_string()));
        args.extend(["-of".to_string(), "json".to_string()]);
        args.push(path.to_string_lossy().into_owned());

        let output = self.runner.run(FFPROBE, &args).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ProbeError::ToolMissing {
                    tool: FFPROBE.to_string(),
                }
            } else {
                ProbeError::Spawn {
                    tool: FFPROBE.to_string(),
                    source: e,
                }
            }
        })?;

        if !output.success {
            return Err(ProbeError::Failed {
                path: path.display().to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl Prober for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
        let format_json = self.run_json(path, &["-show_entries", "format=duration"])?;
        let format_probe: FormatProbe = parse_json(path, &format_json)?;

        let raw = match non_empty(format_probe.format.and_then(|f| f.duration)) {
            Some(d) => d,
            None => {
                // Some containers only carry a duration on the stream
                debug!(
                    "No container duration for {}, querying first video stream",
                    path.display()
                );
                let stream_json = self.run_json(
                    path,
                    &["-show_entries", "stream=duration", "-select_streams", "v:0"],
                )?;
                let stream_probe: StreamProbe = parse_json(path, &stream_json)?;
                non_empty(stream_probe.streams.into_iter().next().and_then(|s| s.duration))
                    .ok_or_else(|| ProbeError::NoDuration(path.display().to_string()))?
            }
        };

        let duration: f64 = raw.trim().parse().map_err(|e| ProbeError::Unparsable {
            path: path.display().to_string(),
            detail: format!("duration '{}': {e}", raw.trim()),
        })?;

        if !duration.is_finite() || duration <= 0.0 {
            return Err(ProbeError::InvalidDuration {
                path: path.display().to_string(),
                duration,
            });
        }

        debug!("Duration of {}: {:.3}s", path.display(), duration);
        Ok(duration)
    }
}

fn parse_json<'a, T: Deserialize<'a>>(path: &Path, json: &'a str) -> Result<T, ProbeError> {
    serde_json::from_str(json).map_err(|e| ProbeError::Unparsable {
        path: path.display().to_string(),
        detail: format!("{e}; output: {}", json.trim()),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct FormatProbe {
    #[serde(default)]
    format: Option<FormatSection>,
}

#[derive(Debug, Deserialize)]
struct FormatSection {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamProbe {
    #[serde(default)]
    streams: Vec<StreamSection>,
}

#[derive(Debug, Deserialize)]
struct StreamSection {
    #[serde(default)]
    duration: Option<String>,
}
