//! The shared 7 second loop: phase windows, easing and the loop clock.

use serde::{Deserialize, Serialize};

/// Length of one loop in seconds.
pub const LOOP_DURATION: f32 = 7.0;
pub const ARRIVAL_START: f32 = 2.0;
pub const OPENING_START: f32 = 3.0;
pub const HOLD_START: f32 = 4.0;
pub const RETURN_START: f32 = 5.0;

/// Cubic ease `t²(3 − 2t)`. Input is clamped to `[0, 1]`.
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Normalised loop position, `min(elapsed / duration, 1)`.
pub fn phase_of(elapsed: f32) -> f32 {
    (elapsed / LOOP_DURATION).clamp(0.0, 1.0)
}

/// Half-open sub-interval of the loop with its own motion and sound rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseWindow {
    Approach,
    Arrival,
    Opening,
    Hold,
    Return,
}

impl PhaseWindow {
    pub const ALL: [PhaseWindow; 5] = [
        PhaseWindow::Approach,
        PhaseWindow::Arrival,
        PhaseWindow::Opening,
        PhaseWindow::Hold,
        PhaseWindow::Return,
    ];

    /// Window containing `elapsed`, or `None` outside `[0, LOOP_DURATION)`.
    pub fn at(elapsed: f32) -> Option<Self> {
        if !(0.0..LOOP_DURATION).contains(&elapsed) {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|window| elapsed < window.end())
    }

    pub fn start(self) -> f32 {
        match self {
            Self::Approach => 0.0,
            Self::Arrival => ARRIVAL_START,
            Self::Opening => OPENING_START,
            Self::Hold => HOLD_START,
            Self::Return => RETURN_START,
        }
    }

    pub fn end(self) -> f32 {
        match self {
            Self::Approach => ARRIVAL_START,
            Self::Arrival => OPENING_START,
            Self::Opening => HOLD_START,
            Self::Hold => RETURN_START,
            Self::Return => LOOP_DURATION,
        }
    }

    pub fn span(self) -> f32 {
        self.end() - self.start()
    }

    /// Linear progress through this window, clamped to `[0, 1]`.
    pub fn progress(self, elapsed: f32) -> f32 {
        ((elapsed - self.start()) / self.span()).clamp(0.0, 1.0)
    }

    pub fn eased_progress(self, elapsed: f32) -> f32 {
        smoothstep(self.progress(elapsed))
    }

    /// Windows during which the actor translates and the footstep loop runs.
    pub fn is_walking(self) -> bool {
        matches!(self, Self::Approach | Self::Return)
    }
}

/// Result of sampling the [`LoopClock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockReading {
    Running { elapsed: f32, phase: f32 },
    /// The loop just completed and was re-based at the sampled instant.
    Wrapped,
}

/// Wall-clock to loop-time conversion with a single movable baseline.
///
/// Readings within one loop never go backwards: a wall clock that steps back
/// yields the previous elapsed value again.
#[derive(Debug, Default, Clone)]
pub struct LoopClock {
    loop_start: Option<f64>,
    last_elapsed: f32,
}

impl LoopClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loop_start(&self) -> Option<f64> {
        self.loop_start
    }

    /// Elapsed value returned by the most recent [`LoopClock::read`].
    pub fn last_elapsed(&self) -> f32 {
        self.last_elapsed
    }

    pub fn rebase(&mut self, now: f64) {
        self.loop_start = Some(now);
        self.last_elapsed = 0.0;
    }

    pub fn read(&mut self, now: f64) -> ClockReading {
        let start = *self.loop_start.get_or_insert(now);
        let raw = now - start;
        let elapsed = (raw.max(0.0) as f32).max(self.last_elapsed);

        // The f32 cast can round a value just under the duration up to it.
        if raw >= f64::from(LOOP_DURATION) || elapsed >= LOOP_DURATION {
            self.rebase(now);
            return ClockReading::Wrapped;
        }

        self.last_elapsed = elapsed;
        ClockReading::Running {
            elapsed,
            phase: phase_of(elapsed),
        }
    }
}
