use thiserror::Error;

/// Failures of the external media-probing tool.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{tool} not found. Please install FFmpeg (includes FFprobe) and add it to your PATH")]
    ToolMissing { tool: String },

    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("FFprobe failed for {path}: {stderr}")]
    Failed { path: String, stderr: String },

    #[error("Failed to parse FFprobe output for {path}: {detail}")]
    Unparsable { path: String, detail: String },

    #[error("No duration reported for {0}")]
    NoDuration(String),

    #[error("Invalid duration {duration} reported for {path}")]
    InvalidDuration { path: String, duration: f64 },
}

/// Failures of the external stream-copy cutter.
#[derive(Error, Debug)]
pub enum CutError {
    #[error("{tool} not found. Please install FFmpeg and add it to your PATH")]
    ToolMissing { tool: String },

    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Could not probe source: {0}")]
    Probe(#[from] ProbeError),

    #[error("FFmpeg failed for part {index} (start {start:.3}s, length {duration:.3}s): {source}")]
    Cut {
        index: usize,
        start: f64,
        duration: f64,
        #[source]
        source: CutError,
    },

    #[error("Failed to get duration of created part {index}, cannot continue accurately: {source}")]
    SegmentProbe {
        index: usize,
        #[source]
        source: ProbeError,
    },

    #[error("Video duration reported as zero or less: {0}")]
    InvalidDuration(f64),

    #[error("Calculated average bitrate is zero or negative: {0}")]
    InvalidBitrate(f64),

    #[error("Safety factor must be in (0, 1], got {0}")]
    InvalidSafetyFactor(f64),

    #[error("Part size must be positive")]
    InvalidPartSize,

    #[error("Refusing to overwrite existing file {0}")]
    PartExists(String),

    #[error("Failed to write part {path}: {source}")]
    PartIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Source {path} ended after {written} of {expected} bytes")]
    Truncated {
        path: String,
        expected: u64,
        written: u64,
    },

    #[error("Potential infinite loop detected after {0} parts, stopping")]
    Runaway(usize),

    #[error("No parts created for non-empty file {path} (size: {size})")]
    NoParts { path: String, size: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures talking to the messaging platform.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error ({code}): {description}")]
    Api { code: u16, description: String },

    /// Rendered with the `FLOOD_WAIT_` marker so the rate-limit handler
    /// recognizes it from the error text alone.
    #[error("FLOOD_WAIT_{seconds} ({description})")]
    FloodWait { seconds: u64, description: String },

    #[error("Telegram API returned no result for {0}")]
    MissingResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TgsplitError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Splitting failed: {0}")]
    Split(#[from] SplitError),

    #[error("Upload failed: {0}")]
    Send(#[from] SendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TgsplitError>;
