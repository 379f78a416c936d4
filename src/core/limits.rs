//! Concurrency and rate limits for sync passes.
//!
//! - `SingleFlight`: at most one pass runs at any instant
//! - `ExtractionPacer`: minimum gap between extraction tool invocations

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Guard allowing at most one holder at a time.
///
/// Acquisition never waits: a caller that loses the race gets `None` and is
/// expected to do nothing.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the single running holder
    pub fn try_acquire(&self) -> Option<SingleFlightPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SingleFlightPermit { flight: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a pass; releases the guard on drop
#[derive(Debug)]
pub struct SingleFlightPermit<'a> {
    flight: &'a SingleFlight,
}

impl Drop for SingleFlightPermit<'_> {
    fn drop(&mut self) {
        self.flight.running.store(false, Ordering::Release);
    }
}

/// Spaces out the starts of successive extraction invocations
#[derive(Debug, Clone)]
pub struct ExtractionPacer {
    delay: Duration,
    last_start: Option<Instant>,
}

impl ExtractionPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: None,
        }
    }

    /// Time left before the next invocation may start
    pub fn remaining(&self) -> Duration {
        match self.last_start {
            Some(last) => self.delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Wait out the remaining delay, then record a new start
    pub async fn pace(&mut self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Pacing extraction");
            tokio::time::sleep(wait).await;
        }
        self.last_start = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight_excludes_second_holder() {
        let flight = SingleFlight::new();

        let permit = flight.try_acquire();
        assert!(permit.is_some());
        assert!(flight.is_running());
        assert!(flight.try_acquire().is_none());

        drop(permit);
        assert!(!flight.is_running());
        assert!(flight.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_first_extraction_is_not_delayed() {
        let mut pacer = ExtractionPacer::new(Duration::from_secs(60));
        assert_eq!(pacer.remaining(), Duration::ZERO);

        let start = std::time::Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(pacer.remaining() > Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_consecutive_extractions_are_spaced() {
        let delay = Duration::from_millis(150);
        let mut pacer = ExtractionPacer::new(delay);

        pacer.pace().await;
        let first = std::time::Instant::now();
        pacer.pace().await;

        assert!(first.elapsed() >= delay - Duration::from_millis(5));
    }
}
