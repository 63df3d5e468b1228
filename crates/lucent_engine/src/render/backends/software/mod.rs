//! Software (CPU) render backend
//!
//! Device owner for rendering without a GPU: headless test runs, CI
//! captures, and a reference for what a backend must do. Ships two
//! default implementations, the forward rasterizer and the color tracer,
//! and follows the implementation lifecycle contract exactly:
//! `prepare` before the first `scene_load`, `scene_unload` before
//! `destroy` or a load of a different scene.

pub mod device;
pub mod rasterizer;
pub mod tracer;

pub use device::SoftwareDevice;
pub use rasterizer::ForwardRasterizer;
pub use tracer::ColorTracer;

use std::sync::Arc;

use crate::config::RendererSettings;
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::api::{RenderBackend, RenderBackendImplementation};
use crate::render::view::{DrawInfo, RenderInfo, ScreenshotInfo, UiConf, ViewDef};
use crate::render::BackendResult;
use crate::scene::{RefLight, SceneData, SceneRef};

/// World position to framebuffer pixel, `None` when clipped
pub(crate) fn project_to_pixel(
    view_proj: &Mat4,
    world: Vec3,
    target: (u32, u32),
) -> Option<(i32, i32)> {
    let clip = view_proj * Vec4::new(world.x, world.y, world.z, 1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    if !(-1.0..=1.0).contains(&ndc.x) || !(-1.0..=1.0).contains(&ndc.y) {
        return None;
    }
    if !(0.0..=1.0).contains(&ndc.z) {
        return None;
    }
    let x = ((ndc.x * 0.5 + 0.5) * target.0.saturating_sub(1) as f32).round() as i32;
    let y = ((0.5 - ndc.y * 0.5) * target.1.saturating_sub(1) as f32).round() as i32;
    Some((x, y))
}

/// Flat scene-wide tint from the view's lights
///
/// Unlit scenes render at full brightness instead of black.
pub(crate) fn light_tint(lights: &[Arc<RefLight>]) -> Vec3 {
    if lights.is_empty() {
        return Vec3::new(1.0, 1.0, 1.0);
    }
    let mut tint = Vec3::from_element(0.15); // ambient floor
    for light in lights {
        tint += light.light.color * light.light.intensity;
    }
    Vec3::new(tint.x.min(1.0), tint.y.min(1.0), tint.z.min(1.0))
}

/// Clamp a linear color into RGBA8
pub(crate) fn color_to_rgba(color: Vec4) -> [u8; 4] {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [
        to_byte(color.x),
        to_byte(color.y),
        to_byte(color.z),
        to_byte(color.w),
    ]
}

/// CPU backend: owns the [`SoftwareDevice`] and the implementation registry
pub struct SoftwareBackend {
    device: Arc<SoftwareDevice>,
    implementations: Vec<Box<dyn RenderBackendImplementation>>,
    current: usize,
    prepared: bool,
    scene_loaded: bool,
    headless: bool,
    default_implementation: Option<String>,
}

impl SoftwareBackend {
    /// Create the backend; the render target size comes from `settings`
    pub fn new(settings: &RendererSettings) -> Self {
        Self {
            device: Arc::new(SoftwareDevice::new(
                settings.render_size[0],
                settings.render_size[1],
            )),
            implementations: Vec::new(),
            current: 0,
            prepared: false,
            scene_loaded: false,
            headless: settings.headless,
            default_implementation: settings.implementation.clone(),
        }
    }

    /// The device this backend renders with
    pub fn device(&self) -> Arc<SoftwareDevice> {
        self.device.clone()
    }

    fn render_info(&self) -> RenderInfo {
        RenderInfo {
            headless: self.headless,
            frame_count: self.device.frames_presented(),
            target_size: self.device.size(),
        }
    }

    fn prepare_current(&mut self) -> BackendResult<()> {
        let info = self.render_info();
        self.implementations[self.current].prepare(&info)?;
        self.prepared = true;
        Ok(())
    }
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn init(&mut self) -> BackendResult<()> {
        if self.implementations.is_empty() {
            self.implementations = vec![
                Box::new(ForwardRasterizer::new(self.device.clone())),
                Box::new(ColorTracer::new(self.device.clone())),
            ];
        }
        if let Some(wanted) = &self.default_implementation {
            if let Some(index) = self
                .implementations
                .iter()
                .position(|i| i.name() == wanted.as_str())
            {
                self.current = index;
            }
        }
        log::info!(
            "Software backend up, implementation '{}'",
            self.implementations[self.current].name()
        );
        self.prepare_current()
    }

    fn shutdown(&mut self) {
        log::info!("Shutting down software backend");
        self.device.wait_idle();
        if self.prepared && !self.implementations.is_empty() {
            self.implementations[self.current].destroy();
        }
        self.implementations.clear();
        self.prepared = false;
        self.scene_loaded = false;
    }

    fn add_implementation(&mut self, implementation: Box<dyn RenderBackendImplementation>) {
        log::debug!("Registered implementation '{}'", implementation.name());
        self.implementations.push(implementation);
    }

    fn reload_implementation(&mut self, scene: &SceneData) {
        if self.implementations.is_empty() {
            return;
        }
        self.device.wait_idle();
        self.scene_unload(scene);
        self.implementations[self.current].destroy();
        self.prepared = false;
        log::info!(
            "Reloading backend implementation: {}",
            self.implementations[self.current].name()
        );
        if let Err(e) = self.prepare_current() {
            log::error!("Reload failed to prepare: {e}");
            return;
        }
        self.scene_load(scene);
    }

    fn change_implementation(&mut self, index: usize, scene: &SceneData) {
        if index >= self.implementations.len() {
            log::warn!("Implementation index {index} out of range, keeping current");
            return;
        }
        self.device.wait_idle();
        self.scene_unload(scene);
        self.implementations[self.current].destroy();
        self.prepared = false;
        self.current = index;
        log::info!(
            "Changing backend implementation to: {}",
            self.implementations[self.current].name()
        );
        if let Err(e) = self.prepare_current() {
            log::error!("Implementation change failed to prepare: {e}");
            return;
        }
        self.scene_load(scene);
    }

    fn current_implementation_index(&self) -> Option<usize> {
        if self.implementations.is_empty() {
            None
        } else {
            Some(self.current)
        }
    }

    fn implementation_names(&self) -> Vec<String> {
        self.implementations
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    fn recreate_render_surface(&mut self, width: u32, height: u32) {
        self.device.resize(width, height);
        if !self.implementations.is_empty() {
            self.implementations[self.current].window_size_changed(width, height);
        }
    }

    fn entity_added(&mut self, entity: &SceneRef) {
        if !self.implementations.is_empty() {
            self.implementations[self.current].entity_added(entity);
        }
    }

    fn entity_removed(&mut self, entity: &SceneRef) {
        if !self.implementations.is_empty() {
            self.implementations[self.current].entity_removed(entity);
        }
    }

    fn draw_on_mesh(&mut self, draw_info: &DrawInfo) -> bool {
        if self.implementations.is_empty() {
            return false;
        }
        self.implementations[self.current].draw_on_mesh(draw_info)
    }

    fn screenshot(&mut self, file_name: &str) {
        if !self.implementations.is_empty() {
            self.implementations[self.current].screenshot(file_name);
        }
    }

    fn scene_load(&mut self, scene: &SceneData) {
        if self.implementations.is_empty() {
            return;
        }
        if !self.prepared {
            log::error!("scene_load before prepare");
            return;
        }
        self.implementations[self.current].scene_load(scene);
        self.scene_loaded = true;
    }

    fn scene_unload(&mut self, scene: &SceneData) {
        if self.implementations.is_empty() || !self.scene_loaded {
            return;
        }
        self.scene_loaded = false;
        self.device.wait_idle();
        self.implementations[self.current].scene_unload(scene);
    }

    fn begin_frame(&mut self) {
        // Synchronous device: recording state is implicit
    }

    fn draw_view(&mut self, view: &mut ViewDef) {
        if !self.implementations.is_empty() {
            self.implementations[self.current].draw_view(view);
        }
    }

    fn draw_ui(&mut self, ui: &mut UiConf) {
        if !self.implementations.is_empty() {
            self.implementations[self.current].draw_ui(ui);
        }
    }

    fn capture_swapchain(&mut self, screenshot: &mut ScreenshotInfo) {
        self.device.capture(screenshot);
    }

    fn end_frame(&mut self) {
        self.device.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut self.0.lock().unwrap())
        }
    }

    struct RecordingImpl {
        name: &'static str,
        log: CallLog,
    }

    impl RecordingImpl {
        fn boxed(name: &'static str, log: &CallLog) -> Box<dyn RenderBackendImplementation> {
            Box::new(Self {
                name,
                log: log.clone(),
            })
        }
    }

    impl RenderBackendImplementation for RecordingImpl {
        fn name(&self) -> &str {
            self.name
        }

        fn prepare(&mut self, _info: &RenderInfo) -> BackendResult<()> {
            self.log.push(format!("{}.prepare", self.name));
            Ok(())
        }

        fn destroy(&mut self) {
            self.log.push(format!("{}.destroy", self.name));
        }

        fn scene_load(&mut self, _scene: &SceneData) {
            self.log.push(format!("{}.scene_load", self.name));
        }

        fn scene_unload(&mut self, _scene: &SceneData) {
            self.log.push(format!("{}.scene_unload", self.name));
        }

        fn draw_view(&mut self, _view: &mut ViewDef) {
            self.log.push(format!("{}.draw_view", self.name));
        }

        fn draw_ui(&mut self, _ui: &mut UiConf) {
            self.log.push(format!("{}.draw_ui", self.name));
        }
    }

    fn recording_backend(log: &CallLog) -> SoftwareBackend {
        let mut backend = SoftwareBackend::new(&RendererSettings::default());
        backend.add_implementation(RecordingImpl::boxed("alpha", log));
        backend.add_implementation(RecordingImpl::boxed("beta", log));
        backend.init().unwrap();
        backend
    }

    #[test]
    fn test_change_implementation_sequencing() {
        let log = CallLog::default();
        let mut backend = recording_backend(&log);
        let scene = SceneData::default();
        backend.scene_load(&scene);
        log.take();

        backend.change_implementation(1, &scene);

        // The new implementation never observes a scene load without a
        // preceding prepare
        assert_eq!(
            log.take(),
            vec![
                "alpha.scene_unload",
                "alpha.destroy",
                "beta.prepare",
                "beta.scene_load"
            ]
        );
        assert_eq!(backend.current_implementation_index(), Some(1));
    }

    #[test]
    fn test_reload_reenters_same_implementation() {
        let log = CallLog::default();
        let mut backend = recording_backend(&log);
        let scene = SceneData::default();
        backend.scene_load(&scene);
        log.take();

        backend.reload_implementation(&scene);

        assert_eq!(
            log.take(),
            vec![
                "alpha.scene_unload",
                "alpha.destroy",
                "alpha.prepare",
                "alpha.scene_load"
            ]
        );
        assert_eq!(backend.current_implementation_index(), Some(0));
    }

    #[test]
    fn test_change_out_of_range_keeps_current() {
        let log = CallLog::default();
        let mut backend = recording_backend(&log);
        let scene = SceneData::default();
        backend.scene_load(&scene);
        log.take();

        backend.change_implementation(7, &scene);

        assert!(log.take().is_empty());
        assert_eq!(backend.current_implementation_index(), Some(0));
    }

    #[test]
    fn test_unloaded_scene_is_not_unloaded_again() {
        let log = CallLog::default();
        let mut backend = recording_backend(&log);
        let scene = SceneData::default();
        log.take();

        // No scene was loaded; switching must not emit a spurious unload
        backend.change_implementation(1, &scene);

        assert_eq!(
            log.take(),
            vec!["alpha.destroy", "beta.prepare", "beta.scene_load"]
        );
    }

    #[test]
    fn test_default_implementation_selection() {
        let mut settings = RendererSettings::default();
        settings.implementation = Some(String::from("tracer"));
        let mut backend = SoftwareBackend::new(&settings);
        backend.init().unwrap();

        let index = backend.current_implementation_index().unwrap();
        assert_eq!(backend.implementation_names()[index], "tracer");
    }

    #[test]
    fn test_full_frame_through_render_system() {
        use crate::foundation::math::{Transform, Vec3};
        use crate::render::cmd::RenderCmdSystem;
        use crate::render::system::{BackendRegistry, RenderSystem};
        use crate::scene::{Mesh, Model, Vertex};

        let dir = std::env::temp_dir().join("lucent_viewer_frame_test");
        std::fs::create_dir_all(&dir).unwrap();
        let _ = std::fs::remove_file(dir.join("frame.png"));

        let mut settings = RendererSettings::default();
        settings.render_size = [64, 64];
        settings.headless = true;
        settings.screenshot_dir = dir.display().to_string();

        let mut registry = BackendRegistry::new();
        registry.register(Box::new(SoftwareBackend::new(&settings)));
        let cmds = Arc::new(RenderCmdSystem::new());
        let mut system = RenderSystem::new(registry, cmds.clone(), settings);
        system.init().unwrap();

        let scene = system.main_scene().unwrap().clone();
        let vertices = vec![Vertex {
            position: Vec3::zeros(),
            normal: Vec3::new(0.0, 1.0, 0.0),
        }];
        let mesh = Arc::new(Mesh::new("tri", vertices, vec![0], None));
        scene.add_model_ref(
            Arc::new(Model::new("tri", vec![mesh])),
            Transform::identity(),
        );
        system.scene_load(&scene.scene_data());

        cmds.add_begin_frame_cmd();
        scene.draw(&cmds, (64, 64), true);
        cmds.add_screenshot_cmd("frame");
        cmds.add_end_frame_cmd();
        system.process_commands();

        assert_eq!(cmds.frames(), 1);
        assert_eq!(cmds.pending_frames(), 0);
        assert!(dir.join("frame.png").is_file());
        system.shutdown();
    }

    #[test]
    fn test_capture_after_frame_has_pixels() {
        let mut settings = RendererSettings::default();
        settings.render_size = [32, 32];
        settings.headless = true;
        let mut backend = SoftwareBackend::new(&settings);
        backend.init().unwrap();

        backend.begin_frame();
        backend.end_frame();

        let mut info = ScreenshotInfo::named("frame");
        backend.capture_swapchain(&mut info);
        assert_eq!((info.width, info.height), (32, 32));
        assert_eq!(info.data.len(), 32 * 32 * 4);
        assert_eq!(backend.device().frames_presented(), 1);
    }
}
