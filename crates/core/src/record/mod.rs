use std::{fs::File, io::BufWriter, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    director::{AnimationDirector, Stage, TickOutcome},
    timeline::PhaseWindow,
    Result,
};

/// What happened on one frame, as seen from outside the director.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub time: f64,
    pub kind: SampleKind,
    pub elapsed: Option<f32>,
    pub phase: Option<f32>,
    pub window: Option<PhaseWindow>,
    pub stage: Stage,
    pub dog_position: [f32; 3],
    pub body_pitch: f32,
    pub door_yaw: f32,
    pub loop_cue: bool,
    pub door_cue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Advanced,
    Reset,
    Paused,
}

impl FrameSample {
    pub fn capture(time: f64, outcome: &TickOutcome, director: &AnimationDirector) -> Self {
        let (kind, elapsed, phase, window, door_cue) = match *outcome {
            TickOutcome::Advanced {
                elapsed,
                phase,
                window,
                door_cue,
            } => (
                SampleKind::Advanced,
                Some(elapsed),
                Some(phase),
                Some(window),
                door_cue,
            ),
            TickOutcome::Reset => (SampleKind::Reset, None, None, None, false),
            TickOutcome::Paused => (SampleKind::Paused, None, None, None, false),
        };
        Self {
            time,
            kind,
            elapsed,
            phase,
            window,
            stage: director.stage(),
            dog_position: director.dog().position().to_array(),
            body_pitch: director.dog().body_pitch(),
            door_yaw: director.door().yaw(),
            loop_cue: director.audio().is_loop_cue_playing(),
            door_cue,
        }
    }
}

/// Collects per-frame samples while recording is on.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    samples: Vec<FrameSample>,
    is_recording: bool,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.is_recording = true;
    }

    pub fn stop(&mut self) {
        self.is_recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Ignored while stopped.
    pub fn push(&mut self, sample: FrameSample) {
        if self.is_recording {
            self.samples.push(sample);
        }
    }

    pub fn samples(&self) -> &[FrameSample] {
        &self.samples
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.samples)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.samples)?;
        Ok(())
    }
}
