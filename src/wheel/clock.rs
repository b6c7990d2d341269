use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

/// Roughly 60 frames per second.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Source of animation frames. `now` is measured from the clock's own origin.
pub trait FrameClock {
    fn now(&self) -> Duration;

    /// Waits for the next frame and returns its timestamp.
    fn next_frame(&mut self) -> impl Future<Output = Duration> + Send;
}

/// Frames paced by a tokio interval.
pub struct IntervalClock {
    origin: Instant,
    ticker: Interval,
}

impl IntervalClock {
    pub fn new(frame: Duration) -> Self {
        let mut ticker = interval(frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            origin: Instant::now(),
            ticker,
        }
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::new(FRAME_INTERVAL)
    }
}

impl FrameClock for IntervalClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn next_frame(&mut self) -> Duration {
        self.ticker.tick().await;
        self.origin.elapsed()
    }
}

/// A clock that advances by a fixed step per frame and never sleeps.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    now: Duration,
    step: Duration,
    frames: u64,
}

impl VirtualClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Duration::ZERO,
            step,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameClock for VirtualClock {
    fn now(&self) -> Duration {
        self.now
    }

    async fn next_frame(&mut self) -> Duration {
        self.now += self.step;
        self.frames += 1;
        self.now
    }
}
