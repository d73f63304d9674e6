//! Perspective camera and the orbit controller that steers it.

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec3};

use crate::config::{CameraConfig, OrbitControlsConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default(), 1.0)
    }
}

impl PerspectiveCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            fov_degrees: config.fov_degrees,
            aspect,
            near: config.near,
            far: config.far,
            position: Vec3::from(config.position),
            target: Vec3::from(config.target),
        }
    }

    /// Matches the projection to a new container size. Zero sizes are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Eye position relative to the target: radius, azimuth about +Y and polar
/// angle measured from +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    theta: f32,
    phi: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return Self {
                radius: 0.0,
                theta: 0.0,
                phi: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Pose {
    target: Vec3,
    spherical: Spherical,
}

#[derive(Debug, Clone, Copy)]
struct ResetAnimation {
    started: f64,
    from: Pose,
}

/// Ease-out cubic used by the double-click reset.
fn ease_out(t: f32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(3)
}

/// Signed azimuth change from `from` to `to`, in (-PI, PI].
fn shortest_turn(from: f32, to: f32) -> f32 {
    let turn = (to - from).rem_euclid(TAU);
    if turn > PI {
        turn - TAU
    } else {
        turn
    }
}

/// `f32::clamp` without the panic on an inverted range.
fn clamp_between(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Orbit controller with damping, clamped distance and polar range, panning
/// and an animated return to the default pose.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    config: OrbitControlsConfig,
    current: Pose,
    default_pose: Pose,
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vec3,
    zoom_scale: f32,
    reset: Option<ResetAnimation>,
    disposed: bool,
}

impl OrbitControls {
    /// Attaches to `camera`; its current placement becomes the default pose.
    pub fn new(config: OrbitControlsConfig, camera: &PerspectiveCamera) -> Self {
        let pose = Pose {
            target: camera.target,
            spherical: Spherical::from_offset(camera.position - camera.target),
        };
        Self {
            config,
            current: pose,
            default_pose: pose,
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vec3::ZERO,
            zoom_scale: 1.0,
            reset: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> &OrbitControlsConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_resetting(&self) -> bool {
        self.reset.is_some()
    }

    /// Drag input in radians.
    pub fn rotate(&mut self, azimuth: f32, polar: f32) {
        if self.disposed {
            return;
        }
        self.reset = None;
        self.delta_theta -= azimuth * self.config.rotate_speed;
        self.delta_phi -= polar * self.config.rotate_speed;
    }

    /// Screen-space pan in view units, scaled by distance to the target.
    pub fn pan(&mut self, right: f32, up: f32, camera: &PerspectiveCamera) {
        if self.disposed || !self.config.pan_enabled {
            return;
        }
        self.reset = None;
        let forward = (camera.target - camera.position).normalize_or_zero();
        let right_axis = forward.cross(Vec3::Y).normalize_or_zero();
        let up_axis = right_axis.cross(forward).normalize_or_zero();
        let scale = self.current.spherical.radius * 0.1 * self.config.pan_speed;
        self.pan_offset += (right_axis * right + up_axis * up) * scale;
    }

    /// Wheel input; positive steps move away from the target.
    pub fn zoom(&mut self, steps: f32) {
        if self.disposed {
            return;
        }
        self.reset = None;
        self.zoom_scale *= 0.95_f32.powf(-steps * self.config.zoom_speed);
    }

    /// Double-click / double-tap gesture.
    pub fn request_reset(&mut self, now: f64) {
        if self.disposed {
            return;
        }
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.pan_offset = Vec3::ZERO;
        self.zoom_scale = 1.0;
        self.reset = Some(ResetAnimation {
            started: now,
            from: self.current,
        });
    }

    /// Per-frame update. Writes the camera and returns whether it moved.
    pub fn update(&mut self, now: f64, camera: &mut PerspectiveCamera) -> bool {
        if self.disposed {
            return false;
        }
        let before = self.current;

        if let Some(reset) = self.reset {
            let duration = f64::from(self.config.reset_duration_ms.max(1)) / 1000.0;
            let t = ease_out(((now - reset.started) / duration) as f32);
            let (from, to) = (reset.from, self.default_pose);
            self.current = if t >= 1.0 {
                self.reset = None;
                to
            } else {
                Pose {
                    target: from.target.lerp(to.target, t),
                    spherical: Spherical {
                        radius: from.spherical.radius
                            + (to.spherical.radius - from.spherical.radius) * t,
                        theta: from.spherical.theta
                            + shortest_turn(from.spherical.theta, to.spherical.theta) * t,
                        phi: from.spherical.phi + (to.spherical.phi - from.spherical.phi) * t,
                    },
                }
            };
        } else {
            let step = if self.config.damping_enabled {
                self.config.damping_factor.clamp(0.0, 1.0)
            } else {
                1.0
            };
            let spherical = &mut self.current.spherical;
            spherical.theta += self.delta_theta * step;
            spherical.phi = clamp_between(
                spherical.phi + self.delta_phi * step,
                self.config.min_polar_angle,
                self.config.max_polar_angle,
            );
            spherical.radius = clamp_between(
                spherical.radius * self.zoom_scale,
                self.config.min_distance,
                self.config.max_distance,
            );
            self.current.target += self.pan_offset * step;

            self.zoom_scale = 1.0;
            if self.config.damping_enabled {
                self.delta_theta *= 1.0 - step;
                self.delta_phi *= 1.0 - step;
                self.pan_offset *= 1.0 - step;
            } else {
                self.delta_theta = 0.0;
                self.delta_phi = 0.0;
                self.pan_offset = Vec3::ZERO;
            }
        }

        camera.target = self.current.target;
        camera.position = self.current.target + self.current.spherical.to_offset();

        before.target != self.current.target || before.spherical != self.current.spherical
    }

    /// Detaches from input. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.reset = None;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.pan_offset = Vec3::ZERO;
        tracing::debug!("orbit controls disposed");
    }
}
