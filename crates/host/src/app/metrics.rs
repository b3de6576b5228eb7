use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::runtime::TickOutcome;

/// Per-interval loop figures, published once per metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    /// Frames per second in which the script actually ran.
    pub script_fps: f32,
    pub frame_time_ms: f32,
    pub skipped_frames: u32,
    pub faulted_frames: u32,
}

/// Shared read side of the loop metrics, cheap to clone across threads.
///
/// A panic while the lock is held never takes the metrics down: the last
/// written value is recovered and a single warning is logged.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

static POISON_REPORTED: AtomicBool = AtomicBool::new(false);

fn note_poisoned(access: &'static str) {
    if !POISON_REPORTED.swap(true, Ordering::Relaxed) {
        warn!(access, "loop metrics lock was poisoned; using last written value");
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        let guard = self.latest.read().unwrap_or_else(|poisoned| {
            note_poisoned("read");
            PoisonError::into_inner(poisoned)
        });
        *guard
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = self.latest.write().unwrap_or_else(|poisoned| {
            note_poisoned("write");
            PoisonError::into_inner(poisoned)
        });
        *guard = snapshot;
    }
}

#[derive(Debug, Default)]
struct IntervalCounts {
    frames: u32,
    ran: u32,
    skipped: u32,
    faulted: u32,
    frame_time_total: Duration,
}

impl IntervalCounts {
    fn summarize(&self, elapsed: Duration) -> LoopMetricsSnapshot {
        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match self.frames {
            0 => 0.0,
            frames => self.frame_time_total.as_secs_f32() * 1000.0 / frames as f32,
        };
        LoopMetricsSnapshot {
            fps: self.frames as f32 / seconds,
            script_fps: self.ran as f32 / seconds,
            frame_time_ms,
            skipped_frames: self.skipped,
            faulted_frames: self.faulted,
        }
    }
}

/// Counts frames by tick outcome and turns them into a snapshot whenever
/// the interval has elapsed.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    started: Instant,
    counts: IntervalCounts,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
            counts: IntervalCounts::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, outcome: TickOutcome) {
        let counts = &mut self.counts;
        counts.frames = counts.frames.saturating_add(1);
        counts.frame_time_total = counts.frame_time_total.saturating_add(frame_dt);
        let bucket = match outcome {
            TickOutcome::Ran => &mut counts.ran,
            TickOutcome::Skipped => &mut counts.skipped,
            TickOutcome::Halted | TickOutcome::Faulted => &mut counts.faulted,
            TickOutcome::Idle => return,
        };
        *bucket = bucket.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.interval {
            return None;
        }
        let counts = std::mem::take(&mut self.counts);
        self.started = now;
        Some(counts.summarize(elapsed))
    }
}
