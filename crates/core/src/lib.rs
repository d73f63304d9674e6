//! Core library for the dog-and-door vignette.
//!
//! A small looping 3D scene: a dog walks up to a door, rears up while the
//! door swings open, and walks back, with procedural footsteps and a door
//! creak kept in step. Each module owns one subsystem (timeline, actors,
//! audio, director, camera, rendering seam) and the [`host`] module wires
//! them into a mountable scene.

pub mod actors;
pub mod analysis;
pub mod audio;
pub mod camera;
pub mod config;
pub mod director;
pub mod error;
pub mod host;
pub mod record;
pub mod render;
pub mod scene;
pub mod timeline;

pub use actors::{DogRig, DoorRig};
pub use analysis::{analyse_cue, CueAnalyser, CueProfile, OnsetTracker};
pub use audio::{
    AudioEngine, CueCounters, MixTap, OfflineContext, OutputContext, ProceduralAudio,
    SampledAudio, SoundCues,
};
#[cfg(feature = "rodio")]
pub use audio::RodioContext;
pub use camera::{OrbitControls, PerspectiveCamera};
pub use config::{AppConfig, AudioConfig, ResumePolicy};
pub use director::{AnimationDirector, Stage, TickOutcome};
pub use error::{DogDoorError, Result};
pub use host::{HostStatus, SceneHost};
pub use record::{FrameSample, TraceRecorder};
pub use render::{HeadlessRenderer, Renderer, Viewport};
pub use scene::{Environment, SceneFrame};
pub use timeline::{LoopClock, PhaseWindow, LOOP_DURATION};
