use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::SplitError;
use crate::media::{Cutter, FfmpegCutter, FfprobeProber, ProcessRunner, Prober};

use super::estimate::estimate_segment_duration;
use super::{remove_part_file, video_part_path, PartFile, PartSet, SplitConfig};

/// The slice of the source requested for the next segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlan {
    pub start: f64,
    pub duration: f64,
}

/// Remainders below this would be cut as `-t 0.000`, an empty segment.
const CUT_PRECISION: f64 = 0.0005;

/// Plan the next segment, or `None` once the source is covered.
pub fn next_segment(
    start: f64,
    total_duration: f64,
    target_duration: f64,
    min_segment_duration: f64,
) -> Option<SegmentPlan> {
    if start >= total_duration {
        return None;
    }

    let remaining = total_duration - start;
    if remaining < CUT_PRECISION {
        // Accumulated rounding, the source is already covered
        return None;
    }

    let mut duration = target_duration.min(remaining);

    // Take a short tail whole rather than leaving a micro-segment behind it
    if remaining > 0.0 && remaining < min_segment_duration {
        duration = remaining;
    }

    if duration <= 0.0 {
        return None;
    }

    Some(SegmentPlan { start, duration })
}

/// Splits a video into independently playable stream-copy segments that
/// each aim to stay under the byte ceiling.
///
/// Every segment is measured after it is cut and the next one starts where
/// the measured duration ends, so bitrate drift does not accumulate.
pub struct VideoSplitter {
    prober: Box<dyn Prober>,
    cutter: Box<dyn Cutter>,
    config: SplitConfig,
}

impl VideoSplitter {
    pub fn new(prober: Box<dyn Prober>, cutter: Box<dyn Cutter>, config: SplitConfig) -> Self {
        Self {
            prober,
            cutter,
            config,
        }
    }

    /// A splitter driving `ffprobe` and `ffmpeg` through the given runner.
    pub fn with_runner(runner: Arc<dyn ProcessRunner>, config: SplitConfig) -> Self {
        Self::new(
            Box::new(FfprobeProber::new(runner.clone())),
            Box::new(FfmpegCutter::new(runner)),
            config,
        )
    }

    /// Split `source` into parts beside it.
    ///
    /// On any error every part created by this call is removed before the
    /// error is returned.
    pub fn split(&self, source: &Path) -> Result<Vec<PartFile>, SplitError> {
        let total_size = fs::metadata(source)?.len();
        let total_duration = self.prober.probe(source)?;
        let estimate = estimate_segment_duration(total_size, total_duration, &self.config)?;

        if estimate.clamped {
            warn!(
                "Estimated segment duration is very short. Minimum set to {:.2}s. \
                 Segments might exceed target size.",
                self.config.min_segment_duration
            );
        }

        info!(
            "Total duration: {:.3}s, total size: {} bytes",
            total_duration, total_size
        );
        info!(
            "Average bitrate: {:.2} bytes/sec, targeting {:.3}s per segment ({:.2} MB)",
            estimate.bytes_per_second,
            estimate.target_duration,
            self.config.ceiling as f64 * self.config.safety_factor / 1024.0 / 1024.0
        );

        let mut parts = PartSet::new();
        let mut start = 0.0;
        let mut index = 1;

        while let Some(plan) = next_segment(
            start,
            total_duration,
            estimate.target_duration,
            self.config.min_segment_duration,
        ) {
            if index > self.config.max_segments {
                return Err(SplitError::Runaway(self.config.max_segments));
            }

            let part_path = video_part_path(source, index);
            if part_path.exists() {
                return Err(SplitError::PartExists(part_path.display().to_string()));
            }

            debug!(
                "Part {}: start {:.3}s, target duration {:.3}s",
                index, plan.start, plan.duration
            );

            if let Err(e) = self
                .cutter
                .cut(source, plan.start, plan.duration, &part_path)
            {
                remove_part_file(&part_path);
                return Err(SplitError::Cut {
                    index,
                    start: plan.start,
                    duration: plan.duration,
                    source: e,
                });
            }

            let size = match fs::metadata(&part_path) {
                Ok(metadata) => metadata.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(
                        "Cutter ran for part {} but {} was not created. Assuming end of video.",
                        index,
                        part_path.display()
                    );
                    break;
                }
                Err(e) => {
                    remove_part_file(&part_path);
                    return Err(SplitError::Io(e));
                }
            };

            if size == 0 {
                warn!(
                    "Created part {} ({}) is zero bytes. Removing and stopping.",
                    index,
                    part_path.display()
                );
                remove_part_file(&part_path);
                break;
            }

            let measured = match self.prober.probe(&part_path) {
                Ok(d) => d,
                Err(e) => {
                    remove_part_file(&part_path);
                    return Err(SplitError::SegmentProbe { index, source: e });
                }
            };

            if !(measured > 0.0) {
                warn!(
                    "Created part {} ({}) reported duration {:.3}s. Stopping.",
                    index,
                    part_path.display(),
                    measured
                );
                parts.push(PartFile {
                    index,
                    path: part_path,
                    size,
                    duration: Some(measured),
                });
                break;
            }

            info!(
                "Part {} created: {} ({:.2} MB, {:.3}s)",
                index,
                part_path.display(),
                size as f64 / 1024.0 / 1024.0,
                measured
            );

            if size > self.config.ceiling {
                warn!(
                    "Part {} size ({} bytes) exceeds the {} byte ceiling. \
                     Source bitrate likely fluctuates significantly.",
                    index, size, self.config.ceiling
                );
            }

            parts.push(PartFile {
                index,
                path: part_path,
                size,
                duration: Some(measured),
            });

            start += measured;
            index += 1;
        }

        info!("Finished splitting video into {} parts", parts.len());
        Ok(parts.into_parts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CutError, ProbeError};
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Source duration comes first, then one entry per produced segment.
    struct FakeProber {
        source_duration: f64,
        segments: Mutex<VecDeque<Result<f64, ProbeError>>>,
    }

    impl FakeProber {
        fn new(source_duration: f64, segments: Vec<Result<f64, ProbeError>>) -> Self {
            Self {
                source_duration,
                segments: Mutex::new(segments.into()),
            }
        }
    }

    impl Prober for FakeProber {
        fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
            if path.to_string_lossy().contains("_part") {
                self.segments
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(ProbeError::NoDuration(path.display().to_string())))
            } else {
                Ok(self.source_duration)
            }
        }
    }

    /// Writes `bytes` into each destination and records the requested plans.
    #[derive(Clone)]
    struct FakeCutter {
        bytes: usize,
        fail_on: Option<usize>,
        plans: Arc<Mutex<Vec<SegmentPlan>>>,
    }

    impl FakeCutter {
        fn new(bytes: usize) -> Self {
            Self {
                bytes,
                fail_on: None,
                plans: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Cutter for FakeCutter {
        fn cut(
            &self,
            _source: &Path,
            start: f64,
            duration: f64,
            dest: &Path,
        ) -> Result<(), CutError> {
            let mut plans = self.plans.lock().unwrap();
            plans.push(SegmentPlan { start, duration });
            if self.fail_on == Some(plans.len()) {
                std::fs::write(dest, b"partial").unwrap();
                return Err(CutError::Failed {
                    code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            std::fs::write(dest, vec![0u8; self.bytes]).unwrap();
            Ok(())
        }
    }

    fn source(dir: &Path, size: usize) -> PathBuf {
        let path = dir.join("movie.mp4");
        std::fs::write(&path, vec![1u8; size]).unwrap();
        path
    }

    fn config(ceiling: u64) -> SplitConfig {
        SplitConfig {
            ceiling,
            part_size: ceiling,
            safety_factor: 1.0,
            min_segment_duration: 1.0,
            max_segments: 1000,
        }
    }

    fn part_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.contains("_part"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_next_segment_basic() {
        assert_eq!(
            next_segment(0.0, 100.0, 30.0, 1.0),
            Some(SegmentPlan {
                start: 0.0,
                duration: 30.0
            })
        );
        assert_eq!(
            next_segment(90.0, 100.0, 30.0, 1.0),
            Some(SegmentPlan {
                start: 90.0,
                duration: 10.0
            })
        );
        assert_eq!(next_segment(100.0, 100.0, 30.0, 1.0), None);
        assert_eq!(next_segment(130.0, 100.0, 30.0, 1.0), None);
    }

    #[test]
    fn test_next_segment_absorbs_short_tail() {
        let plan = next_segment(99.6, 100.0, 30.0, 1.0).unwrap();
        assert!((plan.duration - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_next_segment_ignores_rounding_remainder() {
        let start: f64 = (0..10).map(|_| 0.1).sum();
        assert!(start < 1.0);
        assert_eq!(next_segment(start, 1.0, 0.1, 0.05), None);
        assert_eq!(next_segment(1.0 - 0.0004, 1.0, 0.1, 0.05), None);
        assert!(next_segment(1.0 - 0.001, 1.0, 0.1, 0.05).is_some());
    }

    #[test]
    fn test_rounding_remainder_does_not_add_a_segment() {
        let dir = tempfile::tempdir().unwrap();
        // 1000 bytes over 1s with a 100 byte ceiling targets 0.1s segments
        let src = source(dir.path(), 1000);

        let mut segments: Vec<Result<f64, ProbeError>> = (0..10).map(|_| Ok(0.1)).collect();
        segments.push(Err(ProbeError::InvalidDuration {
            path: "movie_part011.mp4".to_string(),
            duration: 0.0,
        }));
        let cutter = FakeCutter::new(90);
        let plans = cutter.plans.clone();

        let mut cfg = config(100);
        cfg.min_segment_duration = 0.05;
        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(1.0, segments)),
            Box::new(cutter),
            cfg,
        );

        let parts = splitter.split(&src).unwrap();

        assert_eq!(parts.len(), 10);
        assert_eq!(plans.lock().unwrap().len(), 10);
        assert_eq!(part_files(dir.path()).len(), 10);
    }

    #[test]
    fn test_drift_correction_uses_measured_durations() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let cutter = FakeCutter::new(100);
        let plans = cutter.plans.clone();
        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(100.0, vec![Ok(29.0), Ok(31.0), Ok(40.0)])),
            Box::new(cutter),
            config(300),
        );

        let parts = splitter.split(&src).unwrap();

        assert_eq!(parts.len(), 3);
        let starts: Vec<f64> = plans.lock().unwrap().iter().map(|p| p.start).collect();
        assert_eq!(starts, vec![0.0, 29.0, 60.0]);
        let total: f64 = parts.iter().filter_map(|p| p.duration).sum();
        assert_eq!(total, 100.0);
        assert_eq!(parts[0].index, 1);
        assert!(parts[2].path.ends_with("movie_part003.mp4"));
    }

    #[test]
    fn test_cut_failure_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let mut cutter = FakeCutter::new(100);
        cutter.fail_on = Some(3);
        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(100.0, vec![Ok(30.0), Ok(30.0)])),
            Box::new(cutter),
            config(300),
        );

        let result = splitter.split(&src);

        assert!(matches!(result, Err(SplitError::Cut { index: 3, .. })));
        assert!(part_files(dir.path()).is_empty());
        assert!(src.exists());
    }

    #[test]
    fn test_segment_probe_failure_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(
                100.0,
                vec![Ok(30.0), Err(ProbeError::NoDuration("part".to_string()))],
            )),
            Box::new(FakeCutter::new(100)),
            config(300),
        );

        let result = splitter.split(&src);

        assert!(matches!(result, Err(SplitError::SegmentProbe { index: 2, .. })));
        assert!(part_files(dir.path()).is_empty());
    }

    #[test]
    fn test_zero_byte_segment_ends_split() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(100.0, vec![])),
            Box::new(FakeCutter::new(0)),
            config(300),
        );

        let parts = splitter.split(&src).unwrap();

        assert!(parts.is_empty());
        assert!(part_files(dir.path()).is_empty());
    }

    #[test]
    fn test_degenerate_duration_keeps_part_and_stops() {
        struct ZeroProber;
        impl Prober for ZeroProber {
            fn probe(&self, path: &Path) -> Result<f64, ProbeError> {
                if path.to_string_lossy().contains("_part") {
                    Ok(0.0)
                } else {
                    Ok(100.0)
                }
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let splitter =
            VideoSplitter::new(Box::new(ZeroProber), Box::new(FakeCutter::new(50)), config(300));

        let parts = splitter.split(&src).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].duration, Some(0.0));
        assert!(parts[0].path.exists());
    }

    #[test]
    fn test_runaway_guard() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let mut cfg = config(300);
        cfg.max_segments = 2;
        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(100.0, vec![Ok(0.5), Ok(0.5), Ok(0.5)])),
            Box::new(FakeCutter::new(10)),
            cfg,
        );

        let result = splitter.split(&src);

        assert!(matches!(result, Err(SplitError::Runaway(2))));
        assert!(part_files(dir.path()).is_empty());
    }

    #[test]
    fn test_refuses_to_overwrite_existing_part() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), 1000);
        let existing = dir.path().join("movie_part001.mp4");
        std::fs::write(&existing, b"keep me").unwrap();

        let splitter = VideoSplitter::new(
            Box::new(FakeProber::new(100.0, vec![])),
            Box::new(FakeCutter::new(10)),
            config(300),
        );

        assert!(matches!(splitter.split(&src), Err(SplitError::PartExists(_))));
        assert_eq!(std::fs::read(&existing).unwrap(), b"keep me");
    }
}
