//! Scene host: owns the renderer, camera, controller, room and director for
//! one mount, and tears all of it down exactly once.

use crate::{
    actors::{DogRig, DoorRig},
    audio::SoundCues,
    camera::{OrbitControls, PerspectiveCamera},
    config::AppConfig,
    director::{AnimationDirector, TickOutcome},
    render::Viewport,
    scene::{self, Environment, SceneFrame, Subtree},
    DogDoorError, Renderer, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Running,
    Unmounted,
}

/// A mounted vignette bound to one renderer.
pub struct SceneHost<R: Renderer> {
    renderer: R,
    viewport: Viewport,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    environment: Environment,
    director: AnimationDirector,
    clear_color: u32,
    status: HostStatus,
}

impl<R: Renderer> SceneHost<R> {
    /// Builds every scene entity and uploads its meshes. Any failure is
    /// reported as [`DogDoorError::Setup`] after releasing whatever was
    /// already allocated.
    pub fn mount(
        config: &AppConfig,
        mut renderer: R,
        viewport: Viewport,
        mut audio: Box<dyn SoundCues>,
    ) -> Result<Self> {
        if let Err(err) = config.validate().and_then(|()| renderer.mount(&viewport)) {
            shut_down_audio(audio.as_mut());
            return Err(err.into_setup());
        }

        let camera = PerspectiveCamera::from_config(&config.camera, viewport.aspect());
        let controls = OrbitControls::new(config.controls.clone(), &camera);
        let mut environment = Environment::standard(config.viewport.shadows);
        let mut dog = DogRig::spawn();
        let mut door = DoorRig::spawn();

        let uploaded = scene::upload(&mut environment, &mut renderer)
            .and_then(|()| scene::upload(&mut dog, &mut renderer))
            .and_then(|()| scene::upload(&mut door, &mut renderer));
        if let Err(err) = uploaded {
            let subtrees: [&mut dyn Subtree; 3] = [&mut environment, &mut dog, &mut door];
            for subtree in subtrees {
                for warning in scene::release(subtree, &mut renderer) {
                    tracing::warn!(%warning, "release after failed mount");
                }
            }
            if let Err(warning) = renderer.unmount() {
                tracing::warn!(%warning, "unmount after failed mount");
            }
            shut_down_audio(audio.as_mut());
            return Err(err.into_setup());
        }

        tracing::info!(
            width = viewport.width,
            height = viewport.height,
            "scene mounted"
        );

        Ok(Self {
            renderer,
            viewport,
            camera,
            controls,
            environment,
            director: AnimationDirector::new(dog, door, audio, config.timeline.resume),
            clear_color: config.viewport.clear_color,
            status: HostStatus::Running,
        })
    }

    /// One display frame: sound timers, then the director, then the camera,
    /// then the draw call. Nothing that goes wrong in here stops the loop.
    pub fn frame(&mut self, now: f64) -> Result<TickOutcome> {
        if self.status == HostStatus::Unmounted {
            return Err(DogDoorError::Render("scene host is unmounted".into()));
        }

        if let Err(err) = self.director.audio_mut().pump(now) {
            tracing::warn!(%err, "audio skipped this frame");
        }
        let outcome = self.director.tick(now);
        self.controls.update(now, &mut self.camera);

        let frame = self.draw_list();
        if let Err(err) = self.renderer.render(&frame, &self.camera) {
            tracing::warn!(%err, "frame dropped");
        }
        Ok(outcome)
    }

    /// Flattens the room and both actors into world-space draw items.
    pub fn draw_list(&self) -> SceneFrame {
        let mut items = Vec::new();
        self.environment.collect(&mut items);
        self.director.dog().collect(&mut items);
        self.director.door().collect(&mut items);
        SceneFrame {
            items,
            lights: self.environment.lights.clone(),
            clear_color: self.clear_color,
        }
    }

    pub fn set_playing(&mut self, now: f64, playing: bool) {
        self.director.set_playing(now, playing);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport = Viewport::new(width, height);
        self.camera.set_viewport(width, height);
        self.renderer.resize(width, height);
    }

    pub fn orbit(&mut self, azimuth: f32, polar: f32) {
        self.controls.rotate(azimuth, polar);
    }

    pub fn pan(&mut self, right: f32, up: f32) {
        self.controls.pan(right, up, &self.camera);
    }

    pub fn zoom(&mut self, steps: f32) {
        self.controls.zoom(steps);
    }

    /// Double-click / double-tap: ease the camera back to where it started.
    pub fn double_click(&mut self, now: f64) {
        self.controls.request_reset(now);
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn director(&self) -> &AnimationDirector {
        &self.director
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn status(&self) -> HostStatus {
        self.status
    }

    /// Stops sound, releases every mesh, detaches the controller and the
    /// renderer. Every step is attempted; failures come back as
    /// [`DogDoorError::Cleanup`] warnings. A second call does nothing.
    pub fn unmount(&mut self) -> Vec<DogDoorError> {
        if self.status == HostStatus::Unmounted {
            return Vec::new();
        }
        self.status = HostStatus::Unmounted;

        let mut warnings = self.director.audio_mut().shutdown();
        warnings.extend(scene::release(&mut self.environment, &mut self.renderer));
        let (dog, door) = self.director.cast_mut();
        warnings.extend(scene::release(dog, &mut self.renderer));
        warnings.extend(scene::release(door, &mut self.renderer));
        self.controls.dispose();
        if let Err(err) = self.renderer.unmount() {
            warnings.push(match err {
                DogDoorError::Cleanup(_) => err,
                other => DogDoorError::Cleanup(other.to_string()),
            });
        }

        for warning in &warnings {
            tracing::warn!(%warning, "cleanup");
        }
        tracing::info!(warnings = warnings.len(), "scene unmounted");
        warnings
    }
}

/// Closes the audio of a mount that never completed. Returns how many
/// cleanup warnings were logged.
fn shut_down_audio(audio: &mut dyn SoundCues) -> usize {
    let warnings = audio.shutdown();
    for warning in &warnings {
        tracing::warn!(%warning, "audio shutdown after failed mount");
    }
    warnings.len()
}

impl<R: Renderer> Drop for SceneHost<R> {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<R: Renderer> std::fmt::Debug for SceneHost<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneHost")
            .field("viewport", &self.viewport)
            .field("status", &self.status)
            .field("director", &self.director)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        audio::{CueCounters, MixTap, OfflineContext, ProceduralAudio},
        config::{AudioConfig, OrbitControlsConfig},
        render::{HeadlessRenderer, MeshHandle},
        scene::MeshDesc,
    };

    const MESHES: usize = 22;

    fn audio() -> (Box<dyn SoundCues>, MixTap) {
        let context = OfflineContext::new(8_000, 1.0);
        let tap = context.tap();
        let engine = ProceduralAudio::procedural(context, &AudioConfig::default());
        (Box::new(engine), tap)
    }

    fn mounted() -> (SceneHost<HeadlessRenderer>, MixTap) {
        let (audio, tap) = audio();
        let host = SceneHost::mount(
            &AppConfig::default(),
            HeadlessRenderer::new(),
            Viewport::new(800, 600),
            audio,
        )
        .unwrap();
        (host, tap)
    }

    /// Headless renderer that can be told to fail at chosen steps.
    #[derive(Debug, Default)]
    struct FlakyRenderer {
        inner: HeadlessRenderer,
        uploads_before_failure: Option<usize>,
        fail_release: bool,
        fail_render: bool,
        releases: usize,
    }

    impl Renderer for FlakyRenderer {
        fn mount(&mut self, container: &Viewport) -> Result<()> {
            self.inner.mount(container)
        }

        fn unmount(&mut self) -> Result<()> {
            self.inner.unmount()
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.inner.resize(width, height);
        }

        fn upload_mesh(&mut self, mesh: &MeshDesc) -> Result<MeshHandle> {
            if let Some(remaining) = &mut self.uploads_before_failure {
                if *remaining == 0 {
                    return Err(DogDoorError::Render("out of GPU memory".into()));
                }
                *remaining -= 1;
            }
            self.inner.upload_mesh(mesh)
        }

        fn release_mesh(&mut self, handle: MeshHandle) -> Result<()> {
            self.releases += 1;
            if self.fail_release && self.releases == 1 {
                return Err(DogDoorError::Cleanup("node already stopped".into()));
            }
            self.inner.release_mesh(handle)
        }

        fn render(&mut self, frame: &SceneFrame, camera: &PerspectiveCamera) -> Result<()> {
            if self.fail_render {
                return Err(DogDoorError::Render("context lost".into()));
            }
            self.inner.render(frame, camera)
        }
    }

    #[test]
    fn mount_uploads_everything_and_frames_draw() {
        let (mut host, _tap) = mounted();
        assert_eq!(host.renderer().live_meshes(), MESHES);

        host.frame(0.0).unwrap();
        host.frame(0.016).unwrap();
        let stats = host.renderer().last_frame().unwrap();
        assert_eq!(stats.items, MESHES);
        assert_eq!(stats.lights, 3);
        assert_eq!(host.renderer().frames_drawn(), 2);
        assert!(host.director().audio().is_loop_cue_playing());
    }

    #[test]
    fn failed_mount_is_a_setup_error_and_leaks_nothing() {
        let (audio, tap) = audio();
        let renderer = FlakyRenderer {
            uploads_before_failure: Some(10),
            ..FlakyRenderer::default()
        };
        let err = SceneHost::mount(&AppConfig::default(), renderer, Viewport::new(640, 480), audio)
            .unwrap_err();
        assert!(matches!(err, DogDoorError::Setup(ref m) if m.contains("out of GPU memory")));
        assert_eq!(
            tap.state().unwrap(),
            crate::audio::ContextState::Closed
        );
    }

    /// Cues that do nothing but fail to close.
    struct StuckOutput {
        shutdowns: Rc<Cell<u32>>,
    }

    impl SoundCues for StuckOutput {
        fn start_loop_cue(&mut self, _now: f64) -> Result<()> {
            Ok(())
        }
        fn stop_loop_cue(&mut self) {}
        fn play_one_shot_cue(&mut self, _now: f64) -> Result<()> {
            Ok(())
        }
        fn stop_all(&mut self) {}
        fn pump(&mut self, _now: f64) -> Result<()> {
            Ok(())
        }
        fn is_loop_cue_playing(&self) -> bool {
            false
        }
        fn live_voices(&self) -> usize {
            0
        }
        fn counters(&self) -> CueCounters {
            CueCounters::default()
        }
        fn shutdown(&mut self) -> Vec<DogDoorError> {
            self.shutdowns.set(self.shutdowns.get() + 1);
            vec![DogDoorError::Cleanup("device unplugged".into())]
        }
    }

    #[test]
    fn failed_mount_still_reports_audio_cleanup() {
        let shutdowns = Rc::new(Cell::new(0));
        let mut stuck = StuckOutput {
            shutdowns: shutdowns.clone(),
        };
        assert_eq!(shut_down_audio(&mut stuck), 1);

        let renderer = FlakyRenderer {
            uploads_before_failure: Some(3),
            ..FlakyRenderer::default()
        };
        let err = SceneHost::mount(
            &AppConfig::default(),
            renderer,
            Viewport::new(640, 480),
            Box::new(stuck),
        )
        .unwrap_err();
        assert!(matches!(err, DogDoorError::Setup(_)));
        assert_eq!(shutdowns.get(), 2);
    }

    #[test]
    fn inverted_control_ranges_fail_setup() {
        let (audio, tap) = audio();
        let config = AppConfig {
            controls: OrbitControlsConfig {
                min_distance: 30.0,
                max_distance: 5.0,
                ..OrbitControlsConfig::default()
            },
            ..AppConfig::default()
        };
        let err = SceneHost::mount(&config, HeadlessRenderer::new(), Viewport::new(640, 480), audio)
            .unwrap_err();
        assert!(matches!(err, DogDoorError::Setup(ref m) if m.contains("min_distance")));
        assert_eq!(tap.state().unwrap(), crate::audio::ContextState::Closed);
    }

    #[test]
    fn empty_container_fails_setup() {
        let (audio, _tap) = audio();
        let err = SceneHost::mount(
            &AppConfig::default(),
            HeadlessRenderer::new(),
            Viewport::new(0, 0),
            audio,
        )
        .unwrap_err();
        assert!(matches!(err, DogDoorError::Setup(_)));
    }

    #[test]
    fn render_failures_do_not_stop_the_loop() {
        let (audio, _tap) = audio();
        let renderer = FlakyRenderer {
            fail_render: true,
            ..FlakyRenderer::default()
        };
        let mut host =
            SceneHost::mount(&AppConfig::default(), renderer, Viewport::new(640, 480), audio)
                .unwrap();
        host.frame(0.0).unwrap();
        host.frame(1.0).unwrap();
        assert!((host.director().dog().position().x - -0.5).abs() < 1e-4);
        assert_eq!(host.renderer().inner.frames_drawn(), 0);
    }

    #[test]
    fn unmount_releases_everything_once() {
        let (mut host, tap) = mounted();
        host.frame(0.0).unwrap();
        assert!(host.unmount().is_empty());
        assert_eq!(host.renderer().live_meshes(), 0);
        assert!(!host.renderer().is_mounted());
        assert!(host.controls().is_disposed());
        assert_eq!(tap.state().unwrap(), crate::audio::ContextState::Closed);

        assert!(host.unmount().is_empty());
        assert!(host.frame(1.0).is_err());
    }

    #[test]
    fn cleanup_continues_past_a_failed_release() {
        let (audio, _tap) = audio();
        let renderer = FlakyRenderer {
            fail_release: true,
            ..FlakyRenderer::default()
        };
        let mut host =
            SceneHost::mount(&AppConfig::default(), renderer, Viewport::new(640, 480), audio)
                .unwrap();
        let warnings = host.unmount();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], DogDoorError::Cleanup(_)));
        assert_eq!(host.renderer().releases, MESHES);
        assert_eq!(host.renderer().inner.live_meshes(), 1);
        assert!(!host.renderer().inner.is_mounted());
    }

    #[test]
    fn resize_updates_camera_and_renderer() {
        let (mut host, _tap) = mounted();
        host.resize(1000, 500);
        host.resize(0, 500);
        assert_eq!(host.viewport(), Viewport::new(1000, 500));
        assert!((host.camera().aspect - 2.0).abs() < 1e-6);
        assert_eq!(host.renderer().viewport(), Some(Viewport::new(1000, 500)));
    }

    #[test]
    fn double_click_returns_the_camera_home() {
        let (mut host, _tap) = mounted();
        let home = host.camera().position;
        host.orbit(0.8, 0.2);
        for step in 0..120 {
            host.frame(f64::from(step) * 0.016).unwrap();
        }
        assert!((host.camera().position - home).length() > 0.5);

        host.double_click(2.0);
        host.frame(2.5).unwrap();
        assert!(host.controls().is_resetting());
        host.frame(3.1).unwrap();
        assert!((host.camera().position - home).length() < 1e-3);
    }
}
