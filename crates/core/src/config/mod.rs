use std::{f32::consts::FRAC_PI_2, path::Path};

use serde::{Deserialize, Serialize};

use crate::{DogDoorError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeline: TimelineConfig,
    pub audio: AudioConfig,
    pub camera: CameraConfig,
    pub controls: OrbitControlsConfig,
    pub viewport: ViewportConfig,
}

impl AppConfig {
    /// Parses and validates. Missing sections fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.controls.validate()
    }
}

/// What happens to the loop baseline when playback is switched back on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Keep the original loop start; time spent paused still counts.
    #[default]
    KeepBaseline,
    /// Start a fresh loop at the instant playback resumes.
    Restart,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub resume: ResumePolicy,
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Re-trigger period of the footstep loop.
    pub loop_interval_ms: u32,
    pub master_gain: f32,
    pub noise_seed: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            loop_interval_ms: 400,
            master_gain: 1.0,
            noise_seed: 0x5eed,
        }
    }
}

impl AudioConfig {
    pub fn loop_interval_seconds(&self) -> f64 {
        f64::from(self.loop_interval_ms.max(1)) / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [8.0, 6.0, 8.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

/// Configuration surface of the orbit camera controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitControlsConfig {
    pub damping_enabled: bool,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians measured from straight up.
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub pan_enabled: bool,
    pub pan_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// Length of the animated return to the default pose.
    pub reset_duration_ms: u32,
}

impl OrbitControlsConfig {
    /// Rejects ranges the controller cannot clamp into.
    pub fn validate(&self) -> Result<()> {
        if !ordered(self.min_distance, self.max_distance) {
            return Err(DogDoorError::InvalidInput(
                "controls.min_distance must not exceed controls.max_distance",
            ));
        }
        if !ordered(self.min_polar_angle, self.max_polar_angle) {
            return Err(DogDoorError::InvalidInput(
                "controls.min_polar_angle must not exceed controls.max_polar_angle",
            ));
        }
        Ok(())
    }
}

/// False for an inverted range or a NaN bound.
fn ordered(min: f32, max: f32) -> bool {
    min <= max
}

impl Default for OrbitControlsConfig {
    fn default() -> Self {
        Self {
            damping_enabled: true,
            damping_factor: 0.05,
            min_distance: 3.0,
            max_distance: 25.0,
            min_polar_angle: 0.1,
            // Keep the eye above the ground plane.
            max_polar_angle: FRAC_PI_2 - 0.05,
            pan_enabled: true,
            pan_speed: 1.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            reset_duration_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    /// 0xRRGGBB; the canvas itself is transparent.
    pub clear_color: u32,
    pub shadows: bool,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            clear_color: 0x000000,
            shadows: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "timeline": { "resume": "restart" }, "audio": { "loop_interval_ms": 250 } }"#,
        )
        .unwrap();

        assert_eq!(config.timeline.resume, ResumePolicy::Restart);
        assert_eq!(config.audio.loop_interval_ms, 250);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.controls, OrbitControlsConfig::default());
    }

    #[test]
    fn pretty_json_round_trips() {
        let config = AppConfig::default();
        let text = config.to_json_pretty().unwrap();
        assert!(text.contains("\"keep_baseline\""));
        assert_eq!(AppConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("configuration:"));
    }

    #[test]
    fn rejects_inverted_control_ranges() {
        let err = AppConfig::from_json_str(
            r#"{ "controls": { "min_distance": 30, "max_distance": 5 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DogDoorError::InvalidInput(_)));

        let err = AppConfig::from_json_str(
            r#"{ "controls": { "min_polar_angle": 1.5, "max_polar_angle": 0.2 } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("polar"));

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn interval_never_reaches_zero() {
        let audio = AudioConfig {
            loop_interval_ms: 0,
            ..AudioConfig::default()
        };
        assert!(audio.loop_interval_seconds() > 0.0);
    }
}
