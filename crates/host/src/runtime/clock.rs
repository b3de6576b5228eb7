use std::time::{Duration, Instant};

pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(50);

/// Produces the `dt` handed to `update`: wall time since the previous tick,
/// capped so a stall never turns into one giant simulation step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    max_frame_delta: Duration,
    last_tick: Option<Instant>,
}

impl FrameClock {
    pub fn new(max_frame_delta: Duration) -> Self {
        Self {
            max_frame_delta: normalize_non_zero_duration(max_frame_delta, DEFAULT_MAX_FRAME_DELTA),
            last_tick: None,
        }
    }

    pub fn max_frame_delta(&self) -> Duration {
        self.max_frame_delta
    }

    /// Forgets the previous tick; the next `advance` yields zero.
    pub fn reset(&mut self) {
        self.last_tick = None;
    }

    pub fn advance(&mut self, now: Instant) -> Duration {
        let raw = match self.last_tick {
            Some(previous) => now.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);
        clamp_frame_delta(raw, self.max_frame_delta)
    }

    pub fn advance_seconds(&mut self, now: Instant) -> f64 {
        self.advance(now).as_secs_f64()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_DELTA)
    }
}

pub(crate) fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

pub(crate) fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_after_reset_is_zero() {
        let mut clock = FrameClock::default();
        let start = Instant::now();
        assert_eq!(clock.advance(start), Duration::ZERO);
        assert_eq!(
            clock.advance(start + Duration::from_millis(16)),
            Duration::from_millis(16)
        );

        clock.reset();
        assert_eq!(clock.advance(start + Duration::from_secs(3)), Duration::ZERO);
    }

    #[test]
    fn stall_is_capped_at_max_frame_delta() {
        let mut clock = FrameClock::default();
        let start = Instant::now();
        clock.advance(start);
        let dt = clock.advance_seconds(start + Duration::from_secs(10));
        assert!((dt - 0.05).abs() < 1e-12, "{dt}");
    }

    #[test]
    fn stall_cap_follows_configuration() {
        let mut clock = FrameClock::new(Duration::from_millis(100));
        let start = Instant::now();
        clock.advance(start);
        assert_eq!(
            clock.advance(start + Duration::from_millis(400)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn backwards_time_yields_zero() {
        let mut clock = FrameClock::default();
        let start = Instant::now() + Duration::from_secs(1);
        clock.advance(start);
        assert_eq!(clock.advance(start - Duration::from_millis(5)), Duration::ZERO);
    }

    #[test]
    fn zero_cap_falls_back_to_default() {
        let clock = FrameClock::new(Duration::ZERO);
        assert_eq!(clock.max_frame_delta(), DEFAULT_MAX_FRAME_DELTA);
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_secs(2), max_frame_delta),
            max_frame_delta
        );
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(16), max_frame_delta),
            Duration::from_millis(16)
        );
    }
}
