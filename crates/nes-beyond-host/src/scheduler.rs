use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Nominal emulated frames per second at 1x.
pub const BASE_FRAME_RATE: f64 = 60.0;

/// Emulation speed multiplier. Always positive and finite.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Speed(f64);

impl Speed {
    pub const NORMAL: Speed = Speed(1.0);

    /// Multipliers offered by the speed selector.
    pub const PRESETS: [Speed; 4] = [Speed(0.5), Speed(1.0), Speed(2.0), Speed(3.0)];

    pub fn new(factor: f64) -> Option<Self> {
        if factor.is_finite() && factor > 0.0 {
            Some(Self(factor))
        } else {
            None
        }
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    /// Wall-clock time between frames at this speed.
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs_f64(1.0 / BASE_FRAME_RATE / self.0)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl TryFrom<f64> for Speed {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Speed::new(value).ok_or_else(|| format!("speed must be positive, got {value}"))
    }
}

impl From<Speed> for f64 {
    fn from(speed: Speed) -> f64 {
        speed.0
    }
}

/// Outcome of one scheduling tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Not started, or stopped.
    Idle,
    /// A frame is due; run exactly one.
    Advance,
    /// Nothing due yet; the next frame is this far away.
    Wait(Duration),
}

/// Decides, on each host tick, whether a frame is due.
///
/// The tick period is whatever the host delivers; the scheduler measures
/// it. Leftover time is carried into the next interval so pacing does not
/// drift over long runs.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    last_time: Option<Instant>,
    frames: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin pacing from `now`, discarding any previous run.
    pub fn start(&mut self, now: Instant) {
        self.last_time = Some(now);
        self.frames = 0;
    }

    /// Stop pacing. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.last_time = None;
    }

    pub fn is_running(&self) -> bool {
        self.last_time.is_some()
    }

    /// Frames advanced since the last `start`.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tick(&mut self, now: Instant, speed: Speed) -> Tick {
        let Some(last) = self.last_time else {
            return Tick::Idle;
        };

        let interval = speed.frame_interval();
        let elapsed = now.saturating_duration_since(last);
        if elapsed < interval {
            return Tick::Wait(interval - elapsed);
        }

        let leftover = duration_rem(elapsed, interval);
        self.last_time = Some(now - leftover);
        self.frames += 1;
        Tick::Advance
    }
}

fn duration_rem(value: Duration, modulus: Duration) -> Duration {
    let modulus = modulus.as_nanos();
    if modulus == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((value.as_nanos() % modulus) as u64)
}
