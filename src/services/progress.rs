//! Progress reporting primitives for archive runs.

use crate::ProgressNotifier;
use crate::models::ProgressSnapshot;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Bytes archived since the last snapshot that force a new one
pub const DEFAULT_BYTE_TRIGGER: u64 = 64 * 1024 * 1024;
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Counters sampled when a progress snapshot is considered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounters {
    pub completed_files: u64,
    pub launched_files: u64,
    pub processed_bytes: u64,
}

/// Time/byte-based throttler governing progress event emission.
#[derive(Debug)]
pub struct ProgressThrottler {
    interval: Duration,
    byte_trigger: u64,
    last_emit: Option<Instant>,
    last_emit_bytes: u64,
}

impl ProgressThrottler {
    /// Construct a throttler; a `byte_trigger` of `u64::MAX` disables byte-based emission.
    #[must_use]
    pub fn new(interval: Duration, byte_trigger: u64) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            byte_trigger,
            last_emit: None,
            last_emit_bytes: 0,
        }
    }

    /// Consider emitting a snapshot using the current counters.
    pub fn consider(
        &mut self,
        now: Instant,
        counters: ProgressCounters,
        timestamp_ms: u64,
    ) -> Option<ProgressSnapshot> {
        let Some(last_emit) = self.last_emit else {
            self.last_emit = Some(now);
            self.last_emit_bytes = counters.processed_bytes;
            return None;
        };

        let elapsed = now.saturating_duration_since(last_emit);
        let bytes_delta = counters.processed_bytes.saturating_sub(self.last_emit_bytes);

        if elapsed >= self.interval || bytes_delta >= self.byte_trigger {
            let throughput = compute_throughput(bytes_delta, elapsed);

            self.last_emit = Some(now);
            self.last_emit_bytes = counters.processed_bytes;

            return Some(snapshot(counters, timestamp_ms, throughput));
        }

        None
    }

    /// Emit a final snapshot regardless of thresholds.
    pub fn force_emit(
        &mut self,
        now: Instant,
        counters: ProgressCounters,
        timestamp_ms: u64,
    ) -> ProgressSnapshot {
        let throughput = self.last_emit.and_then(|last_emit| {
            let elapsed = now.saturating_duration_since(last_emit);
            let bytes_delta = counters.processed_bytes.saturating_sub(self.last_emit_bytes);
            compute_throughput(bytes_delta, elapsed)
        });

        self.last_emit = Some(now);
        self.last_emit_bytes = counters.processed_bytes;

        snapshot(counters, timestamp_ms, throughput)
    }
}

/// Shared progress state for one archive run.
///
/// Ingest tasks call [`ProgressReporter::observe`] as they complete; emitted
/// snapshots are forwarded to the notifier and kept for the final summary.
pub struct ProgressReporter {
    throttler: Mutex<ProgressThrottler>,
    events: Mutex<Vec<ProgressSnapshot>>,
    notifier: Option<ProgressNotifier>,
    start_instant: Instant,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(interval: Duration, byte_trigger: u64, notifier: Option<ProgressNotifier>) -> Self {
        Self {
            throttler: Mutex::new(ProgressThrottler::new(interval, byte_trigger)),
            events: Mutex::new(Vec::new()),
            notifier,
            start_instant: Instant::now(),
        }
    }

    fn elapsed_ms(&self, now: Instant) -> u64 {
        let millis = now
            .checked_duration_since(self.start_instant)
            .unwrap_or_default()
            .as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }

    /// Consider emitting a snapshot for the current counters.
    pub fn observe(&self, counters: ProgressCounters) {
        let now = Instant::now();
        let elapsed_ms = self.elapsed_ms(now);

        let mut throttler = self.throttler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = throttler.consider(now, counters, elapsed_ms) {
            drop(throttler);
            self.publish(snapshot);
        }
    }

    /// Emit a final snapshot unless it would repeat the last one.
    pub fn finish(&self, counters: ProgressCounters) {
        let now = Instant::now();
        let elapsed_ms = self.elapsed_ms(now);

        let snapshot = self
            .throttler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .force_emit(now, counters, elapsed_ms);

        let is_new = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .is_none_or(|last| {
                last.completed_files != snapshot.completed_files
                    || last.processed_bytes != snapshot.processed_bytes
            });

        if is_new {
            self.publish(snapshot);
        }
    }

    fn publish(&self, snapshot: ProgressSnapshot) {
        if let Some(notifier) = &self.notifier {
            notifier(&snapshot);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot);
    }

    #[must_use]
    pub fn into_events(self) -> Vec<ProgressSnapshot> {
        self.events
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot(
    counters: ProgressCounters,
    timestamp_ms: u64,
    throughput: Option<u64>,
) -> ProgressSnapshot {
    ProgressSnapshot {
        timestamp_ms,
        completed_files: counters.completed_files,
        launched_files: counters.launched_files,
        processed_bytes: counters.processed_bytes,
        recent_throughput_bytes_per_sec: throughput,
    }
}

fn compute_throughput(bytes_delta: u64, elapsed: Duration) -> Option<u64> {
    let nanos = elapsed.as_nanos();
    if nanos == 0 {
        return None;
    }

    let numerator = u128::from(bytes_delta) * 1_000_000_000u128;
    let rate = numerator / nanos;
    u64::try_from(rate.min(u128::from(u64::MAX))).ok()
}
