use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::{render::MeshHandle, DogDoorError, Renderer, Result};

/// Local transform of a part relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            ..Self::default()
        }
    }

    pub fn rotated(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Vec3::new(x, y, z);
        self
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Cuboid { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32 },
    Cone { radius: f32, height: f32, segments: u32 },
    Plane { width: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// 0xRRGGBB
    pub color: u32,
    pub roughness: f32,
    pub metalness: f32,
}

impl Material {
    pub const fn standard(color: u32, roughness: f32, metalness: f32) -> Self {
        Self {
            color,
            roughness,
            metalness,
        }
    }
}

/// Everything a renderer needs to allocate one mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshDesc {
    pub primitive: Primitive,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl MeshDesc {
    pub fn new(primitive: Primitive, material: Material) -> Self {
        Self {
            primitive,
            material,
            cast_shadow: true,
            receive_shadow: false,
        }
    }

    pub fn receiving_shadows(mut self) -> Self {
        self.receive_shadow = true;
        self
    }
}

/// A named node of an actor or prop: a transform plus an optional mesh.
///
/// The GPU handle is filled in by [`upload`] and taken back by [`release`], so
/// releasing twice never reaches the renderer a second time.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: &'static str,
    pub transform: Transform,
    mesh: Option<MeshDesc>,
    handle: Option<MeshHandle>,
}

impl Part {
    pub fn group(name: &'static str, transform: Transform) -> Self {
        Self {
            name,
            transform,
            mesh: None,
            handle: None,
        }
    }

    pub fn mesh(name: &'static str, transform: Transform, mesh: MeshDesc) -> Self {
        Self {
            name,
            transform,
            mesh: Some(mesh),
            handle: None,
        }
    }

    pub fn mesh_desc(&self) -> Option<&MeshDesc> {
        self.mesh.as_ref()
    }

    pub fn handle(&self) -> Option<MeshHandle> {
        self.handle
    }

    pub fn matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    /// World matrix of this part under `parent`, pushing a draw item when the
    /// part owns a live mesh.
    pub fn emit(&self, parent: Mat4, out: &mut Vec<DrawItem>) -> Mat4 {
        let world = parent * self.matrix();
        if let (Some(handle), Some(mesh)) = (self.handle, self.mesh) {
            out.push(DrawItem {
                mesh: handle,
                world,
                cast_shadow: mesh.cast_shadow,
                receive_shadow: mesh.receive_shadow,
            });
        }
        world
    }

    fn upload<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        if let Some(mesh) = &self.mesh {
            self.handle = Some(renderer.upload_mesh(mesh)?);
        }
        Ok(())
    }

    fn release<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> Result<()> {
        match self.handle.take() {
            Some(handle) => renderer.release_mesh(handle).map_err(|err| {
                DogDoorError::Cleanup(format!("part `{}`: {err}", self.name))
            }),
            None => Ok(()),
        }
    }
}

/// A self-contained hierarchy of named parts owned by one scene entity.
pub trait Subtree {
    /// Every part, in no particular order.
    fn parts_mut(&mut self) -> Vec<&mut Part>;

    /// Appends a draw item for every uploaded mesh, composing transforms down
    /// the hierarchy.
    fn collect(&self, out: &mut Vec<DrawItem>);
}

/// Allocates GPU meshes for every part of `subtree`.
pub fn upload<S, R>(subtree: &mut S, renderer: &mut R) -> Result<()>
where
    S: Subtree + ?Sized,
    R: Renderer + ?Sized,
{
    for part in subtree.parts_mut() {
        part.upload(renderer)?;
    }
    Ok(())
}

/// Releases every GPU mesh of `subtree`, attempting all parts even when some
/// fail. Returns the failures.
pub fn release<S, R>(subtree: &mut S, renderer: &mut R) -> Vec<DogDoorError>
where
    S: Subtree + ?Sized,
    R: Renderer + ?Sized,
{
    subtree
        .parts_mut()
        .into_iter()
        .filter_map(|part| part.release(renderer).err())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    pub near: f32,
    pub far: f32,
    /// Half-size of the orthographic shadow frustum.
    pub extent: f32,
    pub map_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Light {
    Ambient {
        color: u32,
        intensity: f32,
    },
    Directional {
        color: u32,
        intensity: f32,
        position: [f32; 3],
        shadow: Option<ShadowSettings>,
    },
}

/// Static room geometry and lighting.
#[derive(Debug, Clone)]
pub struct Environment {
    pub ground: Part,
    pub back_wall: Part,
    pub lights: Vec<Light>,
}

impl Environment {
    pub fn standard(shadows: bool) -> Self {
        let ground = Part::mesh(
            "ground",
            Transform::default().rotated(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
            MeshDesc {
                cast_shadow: false,
                ..MeshDesc::new(
                    Primitive::Plane {
                        width: 20.0,
                        height: 20.0,
                    },
                    Material::standard(0x3f3f3f, 0.8, 0.2),
                )
                .receiving_shadows()
            },
        );
        let back_wall = Part::mesh(
            "back_wall",
            Transform::at(0.0, 5.0, -10.0),
            MeshDesc {
                cast_shadow: false,
                ..MeshDesc::new(
                    Primitive::Plane {
                        width: 20.0,
                        height: 10.0,
                    },
                    Material::standard(0x6b7280, 0.9, 0.1),
                )
                .receiving_shadows()
            },
        );

        let key_shadow = shadows.then_some(ShadowSettings {
            near: 0.1,
            far: 30.0,
            extent: 10.0,
            map_size: 2048,
        });

        Self {
            ground,
            back_wall,
            lights: vec![
                Light::Ambient {
                    color: 0xffffff,
                    intensity: 0.4,
                },
                Light::Directional {
                    color: 0xffffff,
                    intensity: 0.8,
                    position: [5.0, 8.0, 5.0],
                    shadow: key_shadow,
                },
                Light::Directional {
                    color: 0x9ca3af,
                    intensity: 0.4,
                    position: [-5.0, 3.0, -5.0],
                    shadow: None,
                },
            ],
        }
    }
}

impl Subtree for Environment {
    fn parts_mut(&mut self) -> Vec<&mut Part> {
        vec![&mut self.ground, &mut self.back_wall]
    }

    fn collect(&self, out: &mut Vec<DrawItem>) {
        self.ground.emit(Mat4::IDENTITY, out);
        self.back_wall.emit(Mat4::IDENTITY, out);
    }
}

/// One mesh instance to draw this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshHandle,
    pub world: Mat4,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

/// Flattened scene handed to the renderer once per frame.
#[derive(Debug, Clone, Default)]
pub struct SceneFrame {
    pub items: Vec<DrawItem>,
    pub lights: Vec<Light>,
    pub clear_color: u32,
}

impl SceneFrame {
    pub fn world_position_of(&self, mesh: MeshHandle) -> Option<Vec3> {
        self.items
            .iter()
            .find(|item| item.mesh == mesh)
            .map(|item| item.world.w_axis.truncate())
    }
}
