use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds.
    pub dt: f32,

    /// Time elapsed since the clock started.
    pub elapsed: Duration,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

impl FrameTime {
    /// Elapsed time in milliseconds, as consumed by time-driven animation.
    #[inline]
    pub fn elapsed_ms(&self) -> f32 {
        self.elapsed.as_secs_f32() * 1000.0
    }
}

/// Frame clock producing `FrameTime` snapshots.
///
/// Delta time is reported as measured, with no clamping: animation is a
/// function of `elapsed`, so a stalled frame simply jumps ahead.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
}

impl FrameClock {
    /// Creates a clock whose elapsed time starts now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates a clock with an explicit start instant.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frame_index: 0,
        }
    }

    /// Number of ticks taken so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    ///
    /// Instants earlier than the previous tick saturate to a zero delta.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now.saturating_duration_since(self.last);
        let elapsed = now.saturating_duration_since(self.start);

        self.last = now.max(self.last);

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            elapsed,
            now,
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
