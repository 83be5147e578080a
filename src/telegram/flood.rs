use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

/// Added on top of the server-requested wait.
pub const FLOOD_WAIT_BUFFER: Duration = Duration::from_secs(2);

/// Wait used when the requested duration cannot be read.
pub const FLOOD_WAIT_FALLBACK: Duration = Duration::from_secs(15);

/// A "too many requests, retry after N seconds" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodWait {
    Seconds(u64),
    /// Recognized prefix, unreadable wait time.
    Unknown,
}

impl FloodWait {
    /// Recognize `FLOOD_WAIT_<N>` or `FLOOD_PREMIUM_WAIT_<N>` in error text.
    pub fn parse(message: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"FLOOD_(?:PREMIUM_)?WAIT_\s*(\d*)").expect("Invalid regex")
        });

        let captures = pattern.captures(message)?;
        let digits = captures.get(1).map_or("", |m| m.as_str());

        match digits.parse::<u64>() {
            Ok(seconds) if seconds > 0 => Some(FloodWait::Seconds(seconds)),
            _ => {
                warn!(
                    "Could not parse flood wait time from error: {} (parsed: '{}')",
                    message, digits
                );
                Some(FloodWait::Unknown)
            }
        }
    }

    pub fn sleep_duration(&self) -> Duration {
        match self {
            FloodWait::Seconds(seconds) => Duration::from_secs(*seconds) + FLOOD_WAIT_BUFFER,
            FloodWait::Unknown => FLOOD_WAIT_FALLBACK,
        }
    }
}

/// Suspends the caller; injectable so waits can be observed in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// If `error` carries a rate-limit signal, wait it out and return `true`
/// so the caller retries. Returns `false` without waiting otherwise.
pub async fn handle_flood_wait(error: &str, sleeper: &dyn Sleeper) -> bool {
    let Some(wait) = FloodWait::parse(error) else {
        return false;
    };

    let duration = wait.sleep_duration();
    match wait {
        FloodWait::Seconds(_) => info!("Flood wait encountered: waiting for {:?}...", duration),
        FloodWait::Unknown => info!(
            "Flood wait detected (parsing failed), sleeping for {:?} fallback...",
            duration
        ),
    }
    sleeper.sleep(duration).await;
    true
}
