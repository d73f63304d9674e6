use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{Mat4, Vec3};

use crate::{
    scene::{DrawItem, Material, MeshDesc, Part, Primitive, Subtree, Transform},
    timeline::PhaseWindow,
};

/// Height every part is laid out against.
pub const REST_HEIGHT: f32 = 1.2;
/// Root position at the start of each loop.
pub const WALK_START: Vec3 = Vec3::new(-3.0, 0.1, -2.0);
/// Root position in front of the door.
pub const WALK_END: Vec3 = Vec3::new(2.0, 0.1, 0.0);

const WALK_SPEED: f64 = 3.0;
const LEG_LIFT: f32 = 0.15;
const LEG_REST_Y: f32 = REST_HEIGHT / 2.0 - 0.2;
const LEG_X: f32 = 0.3;
const LEG_Z: f32 = 0.4;

/// Body pitch while reared up at the door.
pub const STAND_PITCH: f32 = -PI / 3.0;
const HEAD_PITCH: f32 = -PI / 6.0;
const FRONT_LEG_RAISE: f32 = 0.4;
const FRONT_LEG_REACH: f32 = 0.3;

const HEAD_BOB_FREQ: f64 = 5.0;
const HEAD_BOB: f32 = 0.05;
const IDLE_BOB_FREQ: f32 = 2.0;
const IDLE_BOB: f32 = 0.02;
const BREATH_FREQ: f64 = 2.5;
const BREATH: f32 = 0.02;
const WAG_FREQ: f64 = 12.0;
const TAIL_WAG: f32 = 0.6;
const EAR_WAG: f32 = 0.15;

const TAIL_REST_PITCH: f32 = PI / 4.0;
const EAR_REST_PITCH: f32 = -PI * 0.1;

const FUR: Material = Material::standard(0x8b4513, 0.7, 0.2);
const DARK: Material = Material::standard(0x000000, 0.5, 0.0);

fn cuboid(width: f32, height: f32, depth: f32) -> Primitive {
    Primitive::Cuboid {
        width,
        height,
        depth,
    }
}

/// `sin` of a continuously running clock, wrapped in f64 before narrowing so
/// large wall-clock values keep their precision.
fn wave(now: f64, frequency: f64, offset: f32) -> f32 {
    (((now * frequency) % f64::from(TAU)) as f32 + offset).sin()
}

/// The walking dog. Every part is a named field; the hierarchy is
/// root → {torso, head → {eyes, snout → nose, ears}, tail, legs}.
#[derive(Debug, Clone)]
pub struct DogRig {
    pub root: Part,
    pub torso: Part,
    pub head: Part,
    pub left_eye: Part,
    pub right_eye: Part,
    pub snout: Part,
    pub nose: Part,
    pub left_ear: Part,
    pub right_ear: Part,
    pub tail: Part,
    pub front_left: Part,
    pub front_right: Part,
    pub back_left: Part,
    pub back_right: Part,
}

impl Default for DogRig {
    fn default() -> Self {
        Self::spawn()
    }
}

impl DogRig {
    /// Builds the rig in its rest pose at [`WALK_START`].
    pub fn spawn() -> Self {
        let leg = |name, x: f32, z: f32| {
            Part::mesh(
                name,
                Transform::at(x, LEG_REST_Y, z),
                MeshDesc::new(cuboid(0.2, 0.4, 0.2), FUR),
            )
        };
        let eye = |name, x: f32| {
            Part::mesh(
                name,
                Transform::at(x, 0.1, 0.15),
                MeshDesc::new(Primitive::Sphere { radius: 0.05 }, DARK),
            )
        };
        let ear = |name, x: f32| {
            Part::mesh(
                name,
                Transform::at(x, 0.3, 0.0).rotated(EAR_REST_PITCH, 0.0, 0.0),
                MeshDesc::new(
                    Primitive::Cone {
                        radius: 0.1,
                        height: 0.2,
                        segments: 4,
                    },
                    FUR,
                ),
            )
        };

        Self {
            root: Part::group("dog", Transform::at(WALK_START.x, WALK_START.y, WALK_START.z)),
            torso: Part::mesh(
                "torso",
                Transform::at(0.0, REST_HEIGHT / 2.0, 0.0),
                MeshDesc::new(cuboid(0.8, 0.6, 1.2), FUR),
            ),
            head: Part::mesh(
                "head",
                Transform::at(0.0, REST_HEIGHT / 2.0 + 0.3, 0.6),
                MeshDesc::new(cuboid(0.4, 0.4, 0.4), FUR),
            ),
            left_eye: eye("left_eye", -0.1),
            right_eye: eye("right_eye", 0.1),
            snout: Part::mesh(
                "snout",
                Transform::at(0.0, -0.05, 0.2),
                MeshDesc::new(cuboid(0.2, 0.15, 0.3), FUR),
            ),
            nose: Part::mesh(
                "nose",
                Transform::at(0.0, 0.0, 0.15),
                MeshDesc::new(Primitive::Sphere { radius: 0.05 }, DARK),
            ),
            left_ear: ear("left_ear", -0.15),
            right_ear: ear("right_ear", 0.15),
            tail: Part::mesh(
                "tail",
                Transform::at(0.0, REST_HEIGHT / 2.0 + 0.15, -0.65)
                    .rotated(TAIL_REST_PITCH, 0.0, 0.0),
                MeshDesc::new(cuboid(0.08, 0.08, 0.4), FUR),
            ),
            front_left: leg("front_left", -LEG_X, LEG_Z),
            front_right: leg("front_right", LEG_X, LEG_Z),
            back_left: leg("back_left", -LEG_X, -LEG_Z),
            back_right: leg("back_right", LEG_X, -LEG_Z),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.root.transform.position
    }

    /// Body pitch about X; negative while reared up.
    pub fn body_pitch(&self) -> f32 {
        self.root.transform.rotation.x
    }

    /// Legs in gait order: each one trails the previous by a quarter cycle.
    pub fn legs(&self) -> [&Part; 4] {
        [
            &self.front_left,
            &self.front_right,
            &self.back_left,
            &self.back_right,
        ]
    }

    fn legs_mut(&mut self) -> [&mut Part; 4] {
        [
            &mut self.front_left,
            &mut self.front_right,
            &mut self.back_left,
            &mut self.back_right,
        ]
    }

    /// Poses the rig for loop time `elapsed`. `now` drives the continuous
    /// oscillators (gait, wag, breathing) so they never restart at window
    /// boundaries. Does nothing once the loop is complete.
    pub fn update_pose(&mut self, now: f64, elapsed: f32, phase: f32) {
        if phase >= 1.0 {
            return;
        }
        let Some(window) = PhaseWindow::at(elapsed) else {
            return;
        };
        let eased = window.eased_progress(elapsed);

        match window {
            PhaseWindow::Approach => {
                self.root.transform.position = WALK_START.lerp(WALK_END, eased);
                self.set_stance(0.0);
                self.relax();
                self.walk(now, 0.0);
            }
            PhaseWindow::Arrival => {
                self.root.transform.position = WALK_END;
                self.set_stance(eased);
                self.relax();
                self.head.transform.rotation.x += wave(now, HEAD_BOB_FREQ, 0.0) * HEAD_BOB;
                self.plant_back_legs();
            }
            PhaseWindow::Opening | PhaseWindow::Hold => {
                self.root.transform.position = WALK_END;
                self.root.transform.position.y =
                    WALK_END.y + (elapsed * IDLE_BOB_FREQ).sin() * IDLE_BOB;
                self.set_stance(1.0);
                self.plant_back_legs();
                self.fidget(now);
            }
            PhaseWindow::Return => {
                self.root.transform.position = WALK_END.lerp(WALK_START, eased);
                self.set_stance(1.0 - eased);
                self.relax();
                self.walk(now, 1.0 - eased);
            }
        }
    }

    /// Rearing blend: 0 is on all fours, 1 is standing at the door.
    fn set_stance(&mut self, amount: f32) {
        self.root.transform.rotation.x = STAND_PITCH * amount;
        self.head.transform.rotation.x = HEAD_PITCH * amount;
        for leg in [&mut self.front_left, &mut self.front_right] {
            leg.transform.position.y = LEG_REST_Y + FRONT_LEG_RAISE * amount;
            leg.transform.position.z = LEG_Z + FRONT_LEG_REACH * amount;
        }
    }

    /// Leg bob on top of the current stance. `raised` lifts the front pair.
    fn walk(&mut self, now: f64, raised: f32) {
        for (index, leg) in self.legs_mut().into_iter().enumerate() {
            let offset = index as f32 * FRAC_PI_2;
            let base = if index < 2 {
                LEG_REST_Y + FRONT_LEG_RAISE * raised
            } else {
                LEG_REST_Y
            };
            leg.transform.position.y = base + wave(now, WALK_SPEED, offset) * LEG_LIFT;
        }
    }

    fn plant_back_legs(&mut self) {
        for leg in [&mut self.back_left, &mut self.back_right] {
            leg.transform.position.y = LEG_REST_Y;
        }
    }

    /// Excited idle: breathing, tail and ear wag.
    fn fidget(&mut self, now: f64) {
        let breath = 1.0 + wave(now, BREATH_FREQ, 0.0) * BREATH;
        self.torso.transform.scale = Vec3::splat(breath);
        self.tail.transform.rotation.y = wave(now, WAG_FREQ, 0.0) * TAIL_WAG;
        let ear = wave(now, WAG_FREQ, FRAC_PI_2) * EAR_WAG;
        self.left_ear.transform.rotation.z = ear;
        self.right_ear.transform.rotation.z = -ear;
    }

    fn relax(&mut self) {
        self.torso.transform.scale = Vec3::ONE;
        self.tail.transform.rotation.y = 0.0;
        self.left_ear.transform.rotation.z = 0.0;
        self.right_ear.transform.rotation.z = 0.0;
    }
}

impl Subtree for DogRig {
    fn parts_mut(&mut self) -> Vec<&mut Part> {
        vec![
            &mut self.root,
            &mut self.torso,
            &mut self.head,
            &mut self.left_eye,
            &mut self.right_eye,
            &mut self.snout,
            &mut self.nose,
            &mut self.left_ear,
            &mut self.right_ear,
            &mut self.tail,
            &mut self.front_left,
            &mut self.front_right,
            &mut self.back_left,
            &mut self.back_right,
        ]
    }

    fn collect(&self, out: &mut Vec<DrawItem>) {
        let root = self.root.emit(Mat4::IDENTITY, out);
        self.torso.emit(root, out);
        let head = self.head.emit(root, out);
        self.left_eye.emit(head, out);
        self.right_eye.emit(head, out);
        let snout = self.snout.emit(head, out);
        self.nose.emit(snout, out);
        self.left_ear.emit(head, out);
        self.right_ear.emit(head, out);
        self.tail.emit(root, out);
        for leg in self.legs() {
            leg.emit(root, out);
        }
    }
}
