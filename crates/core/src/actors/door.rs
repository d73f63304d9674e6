use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use crate::{
    scene::{DrawItem, Material, MeshDesc, Part, Primitive, Subtree, Transform},
    timeline::{smoothstep, PhaseWindow, OPENING_START, RETURN_START},
};

/// Where the door stands in the room.
pub const DOOR_POSITION: Vec3 = Vec3::new(3.0, 0.0, 0.0);
/// Fully open yaw.
pub const OPEN_YAW: f32 = FRAC_PI_2;

const PANEL_WIDTH: f32 = 1.8;
const PANEL_HEIGHT: f32 = 3.0;
const FRAME_HEIGHT: f32 = 3.2;

const FRAME_WOOD: Material = Material::standard(0x4b2f1c, 0.9, 0.1);
const PANEL_WOOD: Material = Material::standard(0x8b4513, 0.8, 0.1);
const BRASS: Material = Material::standard(0xb5a642, 0.3, 0.9);

fn cuboid(width: f32, height: f32, depth: f32) -> Primitive {
    Primitive::Cuboid {
        width,
        height,
        depth,
    }
}

/// The hinged door. The frame never moves; only `pivot` (panel, knob and
/// hinges) turns, and only about the vertical axis.
#[derive(Debug, Clone)]
pub struct DoorRig {
    pub root: Part,
    pub frame: Part,
    pub left_jamb: Part,
    pub right_jamb: Part,
    pub lintel: Part,
    pub pivot: Part,
    pub panel: Part,
    pub knob: Part,
    pub upper_hinge: Part,
    pub lower_hinge: Part,
}

impl Default for DoorRig {
    fn default() -> Self {
        Self::spawn()
    }
}

impl DoorRig {
    /// Builds a closed door at [`DOOR_POSITION`].
    pub fn spawn() -> Self {
        let jamb = |name, x: f32| {
            Part::mesh(
                name,
                Transform::at(x, FRAME_HEIGHT / 2.0, 0.0),
                MeshDesc::new(cuboid(0.2, FRAME_HEIGHT, 0.2), FRAME_WOOD).receiving_shadows(),
            )
        };
        let hinge = |name, y: f32| {
            Part::mesh(
                name,
                Transform::at(0.0, y, 0.0),
                MeshDesc::new(cuboid(0.05, 0.2, 0.12), BRASS),
            )
        };

        Self {
            root: Part::group(
                "door",
                Transform::at(DOOR_POSITION.x, DOOR_POSITION.y, DOOR_POSITION.z),
            ),
            frame: Part::group("frame", Transform::default()),
            left_jamb: jamb("left_jamb", -(PANEL_WIDTH / 2.0 + 0.1)),
            right_jamb: jamb("right_jamb", PANEL_WIDTH / 2.0 + 0.1),
            lintel: Part::mesh(
                "lintel",
                Transform::at(0.0, FRAME_HEIGHT - 0.1, 0.0),
                MeshDesc::new(cuboid(PANEL_WIDTH + 0.4, 0.2, 0.2), FRAME_WOOD),
            ),
            // Hinge line on the right edge of the opening.
            pivot: Part::group("pivot", Transform::at(PANEL_WIDTH / 2.0, 0.0, 0.0)),
            panel: Part::mesh(
                "panel",
                Transform::at(-PANEL_WIDTH / 2.0, PANEL_HEIGHT / 2.0, 0.0),
                MeshDesc::new(cuboid(PANEL_WIDTH, PANEL_HEIGHT, 0.1), PANEL_WOOD),
            ),
            knob: Part::mesh(
                "knob",
                Transform::at(-PANEL_WIDTH + 0.2, 1.4, 0.08),
                MeshDesc::new(Primitive::Sphere { radius: 0.06 }, BRASS),
            ),
            upper_hinge: hinge("upper_hinge", PANEL_HEIGHT * 0.8),
            lower_hinge: hinge("lower_hinge", PANEL_HEIGHT * 0.2),
        }
    }

    /// Current swing angle in radians; 0 is closed.
    pub fn yaw(&self) -> f32 {
        self.pivot.transform.rotation.y
    }

    /// Snaps the door shut. Used when the loop restarts.
    pub fn close(&mut self) {
        self.pivot.transform.rotation.y = 0.0;
    }

    /// Sets the swing for loop time `elapsed`. A pure function of `elapsed`,
    /// so repeated calls with the same value leave the same yaw. Outside the
    /// opening, hold and return windows the yaw is left untouched.
    pub fn update_rotation(&mut self, elapsed: f32) {
        let yaw = match PhaseWindow::at(elapsed) {
            Some(PhaseWindow::Opening) => smoothstep(elapsed - OPENING_START) * OPEN_YAW,
            Some(PhaseWindow::Hold) => OPEN_YAW,
            Some(PhaseWindow::Return) => {
                (1.0 - smoothstep((elapsed - RETURN_START) / 2.0)) * OPEN_YAW
            }
            _ => return,
        };
        self.pivot.transform.rotation.y = yaw;
    }
}

impl Subtree for DoorRig {
    fn parts_mut(&mut self) -> Vec<&mut Part> {
        vec![
            &mut self.root,
            &mut self.frame,
            &mut self.left_jamb,
            &mut self.right_jamb,
            &mut self.lintel,
            &mut self.pivot,
            &mut self.panel,
            &mut self.knob,
            &mut self.upper_hinge,
            &mut self.lower_hinge,
        ]
    }

    fn collect(&self, out: &mut Vec<DrawItem>) {
        let root = self.root.emit(Mat4::IDENTITY, out);
        let frame = self.frame.emit(root, out);
        self.left_jamb.emit(frame, out);
        self.right_jamb.emit(frame, out);
        self.lintel.emit(frame, out);
        let pivot = self.pivot.emit(frame, out);
        self.panel.emit(pivot, out);
        self.knob.emit(pivot, out);
        self.upper_hinge.emit(pivot, out);
        self.lower_hinge.emit(pivot, out);
    }
}
