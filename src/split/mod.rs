pub mod estimate;
pub mod generic;
pub mod video;

pub use estimate::{estimate_segment_duration, SegmentEstimate};
pub use generic::split_generic;
pub use video::{next_segment, SegmentPlan, VideoSplitter};

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{
    DEFAULT_MAX_SEGMENTS, DEFAULT_MIN_SEGMENT_DURATION, DEFAULT_SAFETY_FACTOR,
    PUBLIC_API_MAX_FILE_SIZE,
};

/// Limits that drive both splitting strategies.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Largest single file the platform accepts, in bytes.
    pub ceiling: u64,

    /// Fixed part size for byte-level splitting.
    pub part_size: u64,

    /// Fraction of the ceiling targeted by video segments.
    pub safety_factor: f64,

    /// Shortest video segment worth cutting, in seconds.
    pub min_segment_duration: f64,

    /// Hard cap on video segments per run.
    pub max_segments: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ceiling: PUBLIC_API_MAX_FILE_SIZE,
            part_size: PUBLIC_API_MAX_FILE_SIZE,
            safety_factor: DEFAULT_SAFETY_FACTOR,
            min_segment_duration: DEFAULT_MIN_SEGMENT_DURATION,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

/// Which strategy produced a set of parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Video,
    Generic,
}

impl std::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitKind::Video => write!(f, "video"),
            SplitKind::Generic => write!(f, "generic"),
        }
    }
}

/// One physical output file produced by splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct PartFile {
    /// 1-based position in the upload order.
    pub index: usize,
    pub path: PathBuf,
    pub size: u64,
    /// Measured duration in seconds (video parts only).
    pub duration: Option<f64>,
}

/// Owns part files on disk and deletes them when dropped.
///
/// A set is released exactly once: either it is dropped (parts removed) or
/// `into_parts` hands the files over and nothing is removed.
#[derive(Debug, Default)]
pub struct PartSet {
    parts: Vec<PartFile>,
}

impl PartSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of already produced parts.
    pub fn from_parts(parts: Vec<PartFile>) -> Self {
        Self { parts }
    }

    pub fn push(&mut self, part: PartFile) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[PartFile] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Release the files without deleting them.
    pub fn into_parts(mut self) -> Vec<PartFile> {
        std::mem::take(&mut self.parts)
    }
}

impl Drop for PartSet {
    fn drop(&mut self) {
        if !self.parts.is_empty() {
            debug!("Cleaning up {} part files", self.parts.len());
            cleanup_parts(&self.parts);
        }
    }
}

/// Remove part files. Files that are already gone are not an error.
pub fn cleanup_parts(parts: &[PartFile]) {
    for part in parts {
        remove_part_file(&part.path);
    }
}

/// Remove one file, tolerating its absence.
pub fn remove_part_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove part {}: {}", path.display(), e),
    }
}

/// `<stem>_partNNN<.ext>` beside the source, so each segment stays playable.
pub fn video_part_path(source: &Path, index: usize) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    source.with_file_name(format!("{stem}_part{index:03}{ext}"))
}

/// `<file name>.partNNN` beside the source.
pub fn generic_part_path(source: &Path, index: usize) -> PathBuf {
    let name = source.file_name().unwrap_or_default().to_string_lossy();
    source.with_file_name(format!("{name}.part{index:03}"))
}
