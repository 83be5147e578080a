use crate::error::SplitError;

use super::SplitConfig;

/// Per-segment target derived from the source's average bitrate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentEstimate {
    /// Target segment duration in seconds, never below the configured minimum.
    pub target_duration: f64,

    /// Average bytes per second of the source.
    pub bytes_per_second: f64,

    /// The raw estimate fell below the minimum and was raised to it.
    /// Segments may then exceed the ceiling.
    pub clamped: bool,
}

/// Estimate how many seconds of the source fit in one part.
pub fn estimate_segment_duration(
    total_size: u64,
    total_duration: f64,
    config: &SplitConfig,
) -> Result<SegmentEstimate, SplitError> {
    if !(total_duration > 0.0) || !total_duration.is_finite() {
        return Err(SplitError::InvalidDuration(total_duration));
    }

    if !(config.safety_factor > 0.0 && config.safety_factor <= 1.0) {
        return Err(SplitError::InvalidSafetyFactor(config.safety_factor));
    }

    let bytes_per_second = total_size as f64 / total_duration;
    if bytes_per_second <= 0.0 {
        return Err(SplitError::InvalidBitrate(bytes_per_second));
    }

    let effective_size = config.ceiling as f64 * config.safety_factor;
    let raw = effective_size / bytes_per_second;

    let (target_duration, clamped) = if raw < config.min_segment_duration {
        (config.min_segment_duration, true)
    } else {
        (raw, false)
    };

    Ok(SegmentEstimate {
        target_duration,
        bytes_per_second,
        clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ceiling: u64, safety_factor: f64, min: f64) -> SplitConfig {
        SplitConfig {
            ceiling,
            part_size: ceiling,
            safety_factor,
            min_segment_duration: min,
            max_segments: 1000,
        }
    }

    #[test]
    fn test_estimate_from_bitrate() {
        // 1000 bytes over 100s = 10 B/s; 300 * 1.0 / 10 = 30s
        let estimate = estimate_segment_duration(1000, 100.0, &config(300, 1.0, 1.0)).unwrap();
        assert_eq!(estimate.bytes_per_second, 10.0);
        assert!((estimate.target_duration - 30.0).abs() < 1e-9);
        assert!(!estimate.clamped);
    }

    #[test]
    fn test_safety_factor_shrinks_target() {
        let estimate = estimate_segment_duration(1000, 100.0, &config(300, 0.5, 1.0)).unwrap();
        assert!((estimate.target_duration - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamps_to_minimum() {
        // 10 bytes per second budget vs 1 MB/s source
        let estimate =
            estimate_segment_duration(100_000_000, 100.0, &config(10, 1.0, 2.0)).unwrap();
        assert_eq!(estimate.target_duration, 2.0);
        assert!(estimate.clamped);
    }

    #[test]
    fn test_is_pure() {
        let cfg = config(1 << 30, 0.95, 1.0);
        let a = estimate_segment_duration(5 << 30, 7200.0, &cfg).unwrap();
        let b = estimate_segment_duration(5 << 30, 7200.0, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_target_never_below_minimum() {
        let cfg = config(1000, 0.95, 1.5);
        for size in [1u64, 10, 1_000, 1_000_000, 1_000_000_000] {
            for duration in [0.5, 1.0, 60.0, 3600.0] {
                let estimate = estimate_segment_duration(size, duration, &cfg).unwrap();
                assert!(estimate.target_duration >= cfg.min_segment_duration);
            }
        }
    }

    #[test]
    fn test_rejects_zero_duration() {
        let result = estimate_segment_duration(1000, 0.0, &config(300, 1.0, 1.0));
        assert!(matches!(result, Err(SplitError::InvalidDuration(_))));

        let result = estimate_segment_duration(1000, f64::NAN, &config(300, 1.0, 1.0));
        assert!(matches!(result, Err(SplitError::InvalidDuration(_))));
    }

    #[test]
    fn test_rejects_zero_bitrate() {
        let result = estimate_segment_duration(0, 100.0, &config(300, 1.0, 1.0));
        assert!(matches!(result, Err(SplitError::InvalidBitrate(_))));
    }

    #[test]
    fn test_rejects_bad_safety_factor() {
        let result = estimate_segment_duration(1000, 100.0, &config(300, 1.2, 1.0));
        assert!(matches!(result, Err(SplitError::InvalidSafetyFactor(_))));
    }
}
