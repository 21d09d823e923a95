//! Playback pacing.
//!
//! The playback loop re-arms at display-refresh rate but only advances a
//! frame once the fixed frame interval has elapsed. The re-arm cadence and
//! the work cadence are deliberately decoupled, trading a little idle
//! polling for drift resistance against variable refresh rates. Stopping is
//! cooperative: one flag, consulted exactly once at the top of every tick.

use std::time::{Duration, Instant};

use crate::foundation::core::Fps;

/// How often the engine's playback loop wakes to check the cadence gate
/// (roughly a 60 Hz display refresh).
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Elapsed-time gate for frame advancement.
///
/// The first tick after a reset always passes; after that a tick passes
/// only when at least one frame interval has elapsed since the last passing
/// tick.
#[derive(Clone, Copy, Debug)]
pub struct FrameCadence {
    interval: Duration,
    last: Option<Instant>,
}

impl FrameCadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Gate at the video frame rate (1000/24 ms at the default 24 fps).
    pub fn for_fps(fps: Fps) -> Self {
        Self::new(fps.frame_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Consult the gate. Passing updates the reference instant.
    pub fn should_advance(&mut self, now: Instant) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                true
            }
            Some(last) if now.duration_since(last) >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    /// Forget the reference instant so the next tick passes immediately
    /// (used when playback starts).
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cadence_24fps() -> FrameCadence {
        FrameCadence::for_fps(Fps { num: 24, den: 1 })
    }

    #[test]
    fn first_tick_always_advances() {
        let mut c = cadence_24fps();
        assert!(c.should_advance(Instant::now()));
    }

    #[test]
    fn sub_interval_ticks_do_not_advance() {
        let mut c = cadence_24fps();
        let t0 = Instant::now();
        assert!(c.should_advance(t0));
        assert!(!c.should_advance(t0 + Duration::from_millis(10)));
        assert!(!c.should_advance(t0 + Duration::from_millis(40)));
    }

    #[test]
    fn post_interval_tick_advances_and_rebases() {
        let mut c = cadence_24fps();
        let t0 = Instant::now();
        assert!(c.should_advance(t0));
        let t1 = t0 + c.interval();
        assert!(c.should_advance(t1));
        // The gate rebased to t1, so t0-relative elapsed time is irrelevant.
        assert!(!c.should_advance(t1 + Duration::from_millis(1)));
        assert!(c.should_advance(t1 + c.interval()));
    }

    #[test]
    fn reset_makes_the_next_tick_pass() {
        let mut c = cadence_24fps();
        let t0 = Instant::now();
        assert!(c.should_advance(t0));
        assert!(!c.should_advance(t0 + Duration::from_millis(1)));
        c.reset();
        assert!(c.should_advance(t0 + Duration::from_millis(2)));
    }
}
