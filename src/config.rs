use crate::error::{Result, TgsplitError};
use crate::split::SplitConfig;
use crate::telegram::DEFAULT_API_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Upload ceiling of a self-hosted Bot API server, kept a little under the
/// 2000 MiB it accepts.
pub const LOCAL_API_MAX_FILE_SIZE: u64 = 1950 * 1024 * 1024;

/// `sendDocument` limit of the public Bot API endpoint.
pub const PUBLIC_API_MAX_FILE_SIZE: u64 = 50 * 1000 * 1000;

/// Aim for 95% of the ceiling since bitrate is only an average.
pub const DEFAULT_SAFETY_FACTOR: f64 = 0.95;

pub const DEFAULT_MIN_SEGMENT_DURATION: f64 = 1.0;

pub const DEFAULT_MAX_SEGMENTS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot_token: Option<String>,
    pub api_url: String,
    /// Derived from `api_url` when unset.
    pub max_file_size: Option<u64>,
    /// Defaults to the ceiling, and never exceeds it.
    pub part_size: Option<u64>,
    pub safety_factor: f64,
    pub min_segment_duration: f64,
    pub max_segments: usize,
    pub keep_parts: bool,
    pub status_messages: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            max_file_size: None,
            part_size: None,
            safety_factor: DEFAULT_SAFETY_FACTOR,
            min_segment_duration: DEFAULT_MIN_SEGMENT_DURATION,
            max_segments: DEFAULT_MAX_SEGMENTS,
            keep_parts: false,
            status_messages: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => warn!(
                        "Ignoring malformed config file {}: {}",
                        config_path.display(),
                        e
                    ),
                }
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment-style variables.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TGSPLIT_BOT_TOKEN").or_else(|| lookup("BOT_TOKEN")) {
            self.bot_token = Some(token);
        }
        if let Some(url) = lookup("TGSPLIT_API_URL") {
            self.api_url = url;
        }
        if let Some(size) = lookup("TGSPLIT_MAX_FILE_SIZE") {
            if let Ok(s) = size.trim().parse() {
                self.max_file_size = Some(s);
            }
        }
        if let Some(size) = lookup("TGSPLIT_PART_SIZE") {
            if let Ok(s) = size.trim().parse() {
                self.part_size = Some(s);
            }
        }
        if let Some(keep) = lookup("TGSPLIT_KEEP_PARTS") {
            self.keep_parts = matches!(keep.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.as_deref().map_or(true, str::is_empty) {
            return Err(TgsplitError::Config(
                "Bot token not set. Export it with: export TGSPLIT_BOT_TOKEN=123456:ABC..."
                    .to_string(),
            ));
        }

        if self.max_file_size == Some(0) {
            return Err(TgsplitError::Config(
                "Maximum file size must be greater than 0".to_string(),
            ));
        }

        if self.part_size == Some(0) {
            return Err(TgsplitError::Config(
                "Part size must be greater than 0".to_string(),
            ));
        }

        if self.uses_public_api() && self.max_file_size() > PUBLIC_API_MAX_FILE_SIZE {
            return Err(TgsplitError::Config(format!(
                "The public Bot API accepts documents up to {} bytes, got a limit of {}. \
                 Lower the limit or set TGSPLIT_API_URL to a self-hosted server.",
                PUBLIC_API_MAX_FILE_SIZE,
                self.max_file_size()
            )));
        }

        if !(self.safety_factor > 0.0 && self.safety_factor <= 1.0) {
            return Err(TgsplitError::Config(format!(
                "Safety factor must be in (0, 1], got {}",
                self.safety_factor
            )));
        }

        if !(self.min_segment_duration > 0.0) {
            return Err(TgsplitError::Config(
                "Minimum segment duration must be greater than 0".to_string(),
            ));
        }

        if self.max_segments == 0 {
            return Err(TgsplitError::Config(
                "Maximum segment count must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The upload ceiling in bytes. Unless set explicitly it follows the
    /// server: the public endpoint caps documents at 50 MB.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or_else(|| {
            if self.uses_public_api() {
                PUBLIC_API_MAX_FILE_SIZE
            } else {
                LOCAL_API_MAX_FILE_SIZE
            }
        })
    }

    /// Byte part size for non-video files, capped at the ceiling.
    pub fn part_size(&self) -> u64 {
        let ceiling = self.max_file_size();
        self.part_size.map_or(ceiling, |size| size.min(ceiling))
    }

    pub fn uses_public_api(&self) -> bool {
        self.api_url.trim().trim_end_matches('/') == DEFAULT_API_URL
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig {
            ceiling: self.max_file_size(),
            part_size: self.part_size(),
            safety_factor: self.safety_factor,
            min_segment_duration: self.min_segment_duration,
            max_segments: self.max_segments,
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tgsplit").join("config.toml"))
    }
}
