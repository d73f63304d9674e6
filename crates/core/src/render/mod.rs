use std::collections::HashMap;

use glam::Vec3;

use crate::{
    camera::PerspectiveCamera,
    scene::{MeshDesc, SceneFrame},
    DogDoorError, Result,
};

/// Opaque GPU mesh handle issued by a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Size of the container element the renderer draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Rendering backend capability. Only the scene host talks to it.
pub trait Renderer {
    fn mount(&mut self, container: &Viewport) -> Result<()>;
    fn unmount(&mut self) -> Result<()>;
    fn resize(&mut self, width: u32, height: u32);
    fn upload_mesh(&mut self, mesh: &MeshDesc) -> Result<MeshHandle>;
    fn release_mesh(&mut self, handle: MeshHandle) -> Result<()>;
    fn render(&mut self, frame: &SceneFrame, camera: &PerspectiveCamera) -> Result<()>;
}

/// Summary of the last frame a [`HeadlessRenderer`] drew.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub items: usize,
    pub lights: usize,
    pub shadow_casters: usize,
    pub eye: Vec3,
}

/// Renderer that keeps track of resources and draw calls without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    viewport: Option<Viewport>,
    meshes: HashMap<MeshHandle, MeshDesc>,
    next_handle: u32,
    frames_drawn: u64,
    last_frame: Option<FrameStats>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.viewport.is_some()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }
}

impl Renderer for HeadlessRenderer {
    fn mount(&mut self, container: &Viewport) -> Result<()> {
        if container.width == 0 || container.height == 0 {
            return Err(DogDoorError::Setup(format!(
                "container has no area ({}x{})",
                container.width, container.height
            )));
        }
        self.viewport = Some(*container);
        Ok(())
    }

    fn unmount(&mut self) -> Result<()> {
        if self.viewport.take().is_none() {
            return Err(DogDoorError::Cleanup("renderer was not mounted".into()));
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(viewport) = &mut self.viewport {
            *viewport = Viewport::new(width, height);
        }
    }

    fn upload_mesh(&mut self, mesh: &MeshDesc) -> Result<MeshHandle> {
        if !self.is_mounted() {
            return Err(DogDoorError::Render("renderer is not mounted".into()));
        }
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        self.meshes.insert(handle, *mesh);
        Ok(handle)
    }

    fn release_mesh(&mut self, handle: MeshHandle) -> Result<()> {
        self.meshes
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| DogDoorError::Cleanup(format!("mesh {} is not live", handle.0)))
    }

    fn render(&mut self, frame: &SceneFrame, camera: &PerspectiveCamera) -> Result<()> {
        if !self.is_mounted() {
            return Err(DogDoorError::Render("renderer is not mounted".into()));
        }
        if let Some(item) = frame
            .items
            .iter()
            .find(|item| !self.meshes.contains_key(&item.mesh))
        {
            return Err(DogDoorError::Render(format!(
                "draw item references released mesh {}",
                item.mesh.0
            )));
        }

        self.frames_drawn += 1;
        self.last_frame = Some(FrameStats {
            items: frame.items.len(),
            lights: frame.lights.len(),
            shadow_casters: frame.items.iter().filter(|item| item.cast_shadow).count(),
            eye: camera.position,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, Primitive};

    fn sphere() -> MeshDesc {
        MeshDesc::new(
            Primitive::Sphere { radius: 1.0 },
            Material::standard(0xff0000, 0.5, 0.0),
        )
    }

    #[test]
    fn rejects_empty_container() {
        let mut renderer = HeadlessRenderer::new();
        let err = renderer.mount(&Viewport::new(0, 480)).unwrap_err();
        assert!(matches!(err, DogDoorError::Setup(_)));
        assert!(!renderer.is_mounted());
    }

    #[test]
    fn second_release_is_reported() {
        let mut renderer = HeadlessRenderer::new();
        renderer.mount(&Viewport::new(640, 480)).unwrap();
        let handle = renderer.upload_mesh(&sphere()).unwrap();

        renderer.release_mesh(handle).unwrap();
        assert!(matches!(
            renderer.release_mesh(handle),
            Err(DogDoorError::Cleanup(_))
        ));
        assert_eq!(renderer.live_meshes(), 0);
    }

    #[test]
    fn counts_frames_and_tracks_resize() {
        let mut renderer = HeadlessRenderer::new();
        renderer.mount(&Viewport::new(640, 480)).unwrap();
        renderer.resize(800, 600);
        assert_eq!(renderer.viewport(), Some(Viewport::new(800, 600)));

        let camera = PerspectiveCamera::default();
        renderer.render(&SceneFrame::default(), &camera).unwrap();
        renderer.render(&SceneFrame::default(), &camera).unwrap();
        assert_eq!(renderer.frames_drawn(), 2);
        assert_eq!(renderer.last_frame().unwrap().items, 0);
    }
}
