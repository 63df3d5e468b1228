//! Top-level render orchestration
//!
//! [`RenderSystem`] owns the registered backends, the scene list and the
//! frame statistics, and is the single consumer of the command queue:
//! [`RenderSystem::process_commands`] is the render thread's entry point.
//! Scene and implementation lifecycle operations are synchronous and must
//! run serialized with command processing (share the system behind one
//! lock, as `viewer_app` does).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::RendererSettings;
use crate::foundation::time::FrameClock;
use crate::scene::{RenderScene, SceneData};

use super::api::{RenderBackend, RenderBackendImplementation};
use super::cmd::{RenderCmd, RenderCmdSystem};
use super::export;
use super::view::{DrawInfo, ScreenshotInfo};
use super::{BackendResult, RenderError};

/// Frame statistics and GUI visibility flags, read by the GUI layer
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    /// Frames processed since init
    pub frame_index: u32,
    /// Smoothed frames per second, 0 until the sample window fills
    pub framerate_smooth: f32,
    /// Smoothed frametime in milliseconds, 0 until the sample window fills
    pub frametime_smooth: f32,
    /// Raw frametime of the last frame in milliseconds
    pub frametime: f32,
    /// Draw the GUI layer
    pub show_gui: bool,
    /// Draw light overlay markers
    pub mark_lights: bool,
}

/// Explicit registry of backend candidates
///
/// Populated before [`RenderSystem::init`] and consumed by it; replaces a
/// process-wide static list with an owned object whose lifecycle is
/// register → init → shutdown.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn RenderBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend candidate
    pub fn register(&mut self, backend: Box<dyn RenderBackend>) {
        log::debug!("Registered render backend: {}", backend.name());
        self.backends.push(backend);
    }

    /// Whether no backend has been registered
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Names of the registered backends, in registration order
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    fn take(&mut self) -> Vec<Box<dyn RenderBackend>> {
        std::mem::take(&mut self.backends)
    }
}

/// Orchestrator for scenes, backends and the render thread
pub struct RenderSystem {
    init: bool,
    settings: RendererSettings,
    config: RenderConfig,
    cmds: Arc<RenderCmdSystem>,
    scenes: Vec<Arc<RenderScene>>,
    main_scene: Option<Arc<RenderScene>>,
    registry: BackendRegistry,
    backends: Vec<Box<dyn RenderBackend>>,
    current_backend: Option<usize>,
    clock: FrameClock,
}

impl RenderSystem {
    /// Create an uninitialized system
    ///
    /// `registry` holds the backend candidates; `cmds` is the queue this
    /// system will consume.
    pub fn new(
        registry: BackendRegistry,
        cmds: Arc<RenderCmdSystem>,
        settings: RendererSettings,
    ) -> Self {
        Self {
            init: false,
            settings,
            config: RenderConfig::default(),
            cmds,
            scenes: Vec::new(),
            main_scene: None,
            registry,
            backends: Vec::new(),
            current_backend: None,
            clock: FrameClock::new(),
        }
    }

    /// Whether [`init`](Self::init) has completed
    pub fn is_init(&self) -> bool {
        self.init
    }

    /// Whether any backend is available
    pub fn has_backend(&self) -> bool {
        !self.backends.is_empty() || !self.registry.is_empty()
    }

    /// Frame statistics and GUI flags
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Mutable access for GUI toggles
    pub fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    /// The command queue this system consumes
    pub fn cmds(&self) -> &Arc<RenderCmdSystem> {
        &self.cmds
    }

    /// Select and initialize a backend, and set up the main scene
    ///
    /// Backend selection: `settings.backend` by name, else the first
    /// registered. A configured `settings.implementation` is switched to
    /// once the backend is up.
    pub fn init(&mut self) -> BackendResult<()> {
        self.config.show_gui = true;
        self.config.mark_lights = true;
        self.config.frame_index = 0;
        self.clock.set_max_fps(self.settings.max_fps);

        let main_scene = self.alloc_render_scene("main");
        main_scene.ready_to_render(true);
        self.main_scene = Some(main_scene);

        self.backends = self.registry.take();
        if self.backends.is_empty() {
            log::error!("No render backend registered");
            return Err(RenderError::NoBackend);
        }

        let mut selected = 0;
        if let Some(wanted) = self.settings.backend.clone() {
            match self.backends.iter().position(|b| b.name() == wanted) {
                Some(index) => selected = index,
                None => log::warn!("Render backend '{wanted}' not registered, using first"),
            }
        }
        self.current_backend = Some(selected);
        self.backends[selected].init()?;
        log::info!("Render backend '{}' initialized", self.backends[selected].name());
        self.init = true;

        if let Some(implementation) = self.settings.implementation.clone() {
            self.change_backend_implementation(&implementation);
        }
        Ok(())
    }

    /// Unload all scenes and tear the backend down
    pub fn shutdown(&mut self) {
        if !self.init {
            return;
        }
        let scenes = std::mem::take(&mut self.scenes);
        for scene in &scenes {
            self.scene_unload(&scene.scene_data());
        }
        self.main_scene = None;
        if let Some(index) = self.current_backend {
            self.backends[index].shutdown();
        }
        self.backends.clear();
        self.current_backend = None;
        self.init = false;
    }

    fn require_init(&self, op: &str) -> bool {
        if !self.init {
            log::error!("RenderSystem::{op} called before init");
        }
        self.init
    }

    /// Forward a surface size change to the active backend
    pub fn render_surface_resize(&mut self, width: u32, height: u32) {
        if !self.require_init("render_surface_resize") {
            return;
        }
        if let Some(index) = self.current_backend {
            self.backends[index].recreate_render_surface(width, height);
        }
    }

    /// Forward a paint stroke to the active backend
    pub fn draw_on_mesh(&mut self, draw_info: &DrawInfo) -> bool {
        if !self.require_init("draw_on_mesh") {
            return false;
        }
        match self.current_backend {
            Some(index) => self.backends[index].draw_on_mesh(draw_info),
            None => false,
        }
    }

    /// Drain and dispatch queued commands
    ///
    /// Render-thread entry point; called once per loop iteration. Stops
    /// as soon as the queue reports empty — it never blocks waiting for
    /// producers. Failed payload processing is logged and the frame
    /// continues; nothing wedges the queue.
    pub fn process_commands(&mut self) {
        if !self.require_init("process_commands") {
            return;
        }
        while self.cmds.next_cmd() {
            let mut cmd = self.cmds.pop_next_cmd();
            self.dispatch_cmd(&mut cmd);
            self.cmds.delete_cmd(cmd);
        }
    }

    fn dispatch_cmd(&mut self, cmd: &mut RenderCmd) {
        if matches!(cmd, RenderCmd::BeginFrame) {
            self.update_statistics();
        }
        let Some(index) = self.current_backend else {
            return;
        };
        let frame_index = self.config.frame_index;
        let backend = self.backends[index].as_mut();

        match cmd {
            RenderCmd::BeginFrame => backend.begin_frame(),
            RenderCmd::EndFrame => backend.end_frame(),
            RenderCmd::DrawView(view) => {
                view.frame_index = frame_index;
                backend.draw_view(view);
            }
            RenderCmd::DrawUi(ui) => backend.draw_ui(ui),
            RenderCmd::EntityAdded(entity) => backend.entity_added(entity),
            RenderCmd::EntityRemoved(entity) => backend.entity_removed(entity),
            RenderCmd::Screenshot(info) => {
                backend.capture_swapchain(info);
                match export::save_png(info, &self.settings.screenshot_dir) {
                    Ok(path) => log::info!("Screenshot saved: {}", path.display()),
                    Err(e) => log::error!("Screenshot export failed: {e}"),
                }
            }
            RenderCmd::ImplScreenshot => {
                let stamp = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos().to_string())
                    .unwrap_or_default();
                backend.screenshot(&stamp);
            }
            RenderCmd::ImplDrawOnMesh(draw_info) => {
                backend.draw_on_mesh(draw_info);
            }
            // Asset bookkeeping is producer-side; nothing to dispatch
            RenderCmd::AssetAdded(_) | RenderCmd::AssetRemoved(_) | RenderCmd::Empty => {}
        }
    }

    fn update_statistics(&mut self) {
        self.config.frame_index = self.config.frame_index.wrapping_add(1);
        let sample = self.clock.tick();
        self.config.frametime = sample.frametime;
        self.config.frametime_smooth = sample.frametime_smooth;
        self.config.framerate_smooth = sample.framerate_smooth;
    }

    // --- scene lifecycle ---

    /// The scene handed to the backend on the next scene load
    pub fn main_scene(&self) -> Option<&Arc<RenderScene>> {
        self.main_scene.as_ref()
    }

    /// Create and track a new scene
    pub fn alloc_render_scene(&mut self, name: impl Into<String>) -> Arc<RenderScene> {
        let scene = Arc::new(RenderScene::new(name));
        self.scenes.push(scene.clone());
        scene
    }

    /// Designate the scene for subsequent scene loads
    pub fn set_main_render_scene(&mut self, scene: Arc<RenderScene>) {
        self.main_scene = Some(scene);
    }

    /// Stop tracking a scene; no-op if it is not tracked
    ///
    /// Final destruction happens when in-flight snapshots release their
    /// references.
    pub fn remove_render_scene(&mut self, scene: &Arc<RenderScene>) {
        let before = self.scenes.len();
        self.scenes.retain(|s| !Arc::ptr_eq(s, scene));
        if self.scenes.len() == before {
            log::debug!("remove_render_scene: scene '{}' not tracked", scene.name());
        }
    }

    /// Unload the main scene from the backend and drop it
    pub fn free_main_render_scene(&mut self) {
        let Some(scene) = self.main_scene.take() else {
            return;
        };
        if self.current_backend.is_some() {
            self.scene_unload(&scene.scene_data());
        }
        self.remove_render_scene(&scene);
    }

    /// Load scene content into the active implementation
    pub fn scene_load(&mut self, scene: &SceneData) {
        if let Some(index) = self.current_backend {
            self.backends[index].scene_load(scene);
        }
    }

    /// Unload scene content from the active implementation
    pub fn scene_unload(&mut self, scene: &SceneData) {
        if let Some(index) = self.current_backend {
            self.backends[index].scene_unload(scene);
        }
    }

    /// Unload and immediately reload the main scene
    pub fn reload_current_scene(&mut self) {
        if !self.require_init("reload_current_scene") {
            return;
        }
        let Some(scene) = self.main_scene.clone() else {
            return;
        };
        let data = scene.scene_data();
        scene.ready_to_render(false);
        self.scene_unload(&data);
        self.scene_load(&data);
        scene.ready_to_render(true);
    }

    /// Fill `screenshot` from the backend's swapchain
    pub fn capture_swapchain(&mut self, screenshot: &mut ScreenshotInfo) {
        if !self.require_init("capture_swapchain") {
            return;
        }
        if let Some(index) = self.current_backend {
            self.backends[index].capture_swapchain(screenshot);
        }
    }

    // --- implementation lifecycle ---

    /// Register an implementation with the active backend
    pub fn add_implementation(&mut self, implementation: Box<dyn RenderBackendImplementation>) {
        if !self.require_init("add_implementation") {
            return;
        }
        if let Some(index) = self.current_backend {
            self.backends[index].add_implementation(implementation);
        }
    }

    /// Hot-reload the current implementation: unload, destroy, prepare, load
    pub fn reload_backend_implementation(&mut self) {
        if !self.require_init("reload_backend_implementation") {
            return;
        }
        let scene = self.main_scene_data();
        if let Some(index) = self.current_backend {
            self.backends[index].reload_implementation(&scene);
        }
    }

    /// Switch to the implementation at `index`
    pub fn change_backend_implementation_index(&mut self, index: usize) {
        if !self.require_init("change_backend_implementation_index") {
            return;
        }
        let scene = self.main_scene_data();
        if let Some(backend) = self.current_backend {
            let count = self.backends[backend].implementation_names().len();
            if index >= count {
                log::warn!("Backend implementation index {index} out of range ({count})");
                return;
            }
            self.backends[backend].change_implementation(index, &scene);
        }
    }

    /// Switch to the implementation named `name`
    ///
    /// Unknown names log a warning and leave the previous implementation
    /// active, so the renderer never ends up without one.
    pub fn change_backend_implementation(&mut self, name: &str) -> bool {
        if !self.require_init("change_backend_implementation") {
            return false;
        }
        match self.find_backend_implementation(name) {
            Some(index) => {
                self.change_backend_implementation_index(index);
                true
            }
            None => {
                log::warn!("Backend implementation '{name}' not found, keeping current");
                false
            }
        }
    }

    /// Index of the implementation named `name`, if registered
    pub fn find_backend_implementation(&self, name: &str) -> Option<usize> {
        let index = self.current_backend?;
        self.backends[index]
            .implementation_names()
            .iter()
            .position(|n| n == name)
    }

    /// Names of the implementations the active backend offers
    pub fn available_backend_implementations(&self) -> Vec<String> {
        match self.current_backend {
            Some(index) => self.backends[index].implementation_names(),
            None => Vec::new(),
        }
    }

    /// Name of the currently selected implementation
    pub fn current_backend_implementation(&self) -> Option<String> {
        let backend = self.current_backend?;
        let index = self.backends[backend].current_implementation_index()?;
        self.backends[backend].implementation_names().get(index).cloned()
    }

    fn main_scene_data(&self) -> SceneData {
        self.main_scene
            .as_ref()
            .map(|s| s.scene_data())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::view::{RenderInfo, UiConf, ViewDef};
    use crate::scene::SceneRef;
    use std::sync::Mutex;

    /// Shared call recorder for instrumented backends
    #[derive(Clone, Default)]
    struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut self.0.lock().unwrap())
        }
    }

    /// Backend that records every dispatched call
    struct RecordingBackend {
        log: CallLog,
        implementations: Vec<String>,
        current: usize,
    }

    impl RecordingBackend {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                implementations: vec!["raster".to_string(), "tracer".to_string()],
                current: 0,
            }
        }
    }

    impl RenderBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn init(&mut self) -> BackendResult<()> {
            self.log.push("init");
            Ok(())
        }

        fn shutdown(&mut self) {
            self.log.push("shutdown");
        }

        fn add_implementation(&mut self, implementation: Box<dyn RenderBackendImplementation>) {
            self.implementations.push(implementation.name().to_string());
        }

        fn reload_implementation(&mut self, _scene: &SceneData) {
            self.log.push("reload_implementation");
        }

        fn change_implementation(&mut self, index: usize, _scene: &SceneData) {
            self.current = index;
            self.log.push(format!("change_implementation:{index}"));
        }

        fn current_implementation_index(&self) -> Option<usize> {
            Some(self.current)
        }

        fn implementation_names(&self) -> Vec<String> {
            self.implementations.clone()
        }

        fn entity_added(&mut self, entity: &SceneRef) {
            self.log.push(format!("entity_added:{}", entity.name()));
        }

        fn entity_removed(&mut self, entity: &SceneRef) {
            self.log.push(format!("entity_removed:{}", entity.name()));
        }

        fn scene_load(&mut self, _scene: &SceneData) {
            self.log.push("scene_load");
        }

        fn scene_unload(&mut self, _scene: &SceneData) {
            self.log.push("scene_unload");
        }

        fn begin_frame(&mut self) {
            self.log.push("begin_frame");
        }

        fn draw_view(&mut self, view: &mut ViewDef) {
            self.log.push(format!("draw_view:{}", view.frame_index));
        }

        fn draw_ui(&mut self, _ui: &mut UiConf) {
            self.log.push("draw_ui");
        }

        fn end_frame(&mut self) {
            self.log.push("end_frame");
        }

        fn draw_on_mesh(&mut self, _draw_info: &DrawInfo) -> bool {
            self.log.push("draw_on_mesh");
            true
        }

        fn screenshot(&mut self, file_name: &str) {
            self.log.push(format!("screenshot:{}", !file_name.is_empty()));
        }
    }

    /// Implementation stub for default-hook coverage
    struct NoopImpl;

    impl RenderBackendImplementation for NoopImpl {
        fn name(&self) -> &str {
            "noop"
        }

        fn prepare(&mut self, _info: &RenderInfo) -> BackendResult<()> {
            Ok(())
        }

        fn destroy(&mut self) {}

        fn scene_load(&mut self, _scene: &SceneData) {}

        fn scene_unload(&mut self, _scene: &SceneData) {}

        fn draw_view(&mut self, _view: &mut ViewDef) {}

        fn draw_ui(&mut self, _ui: &mut UiConf) {}
    }

    fn recording_system() -> (RenderSystem, CallLog) {
        let log = CallLog::default();
        let mut registry = BackendRegistry::new();
        registry.register(Box::new(RecordingBackend::new(log.clone())));
        let mut system = RenderSystem::new(
            registry,
            Arc::new(RenderCmdSystem::new()),
            RendererSettings::default(),
        );
        system.init().unwrap();
        log.take();
        (system, log)
    }

    #[test]
    fn test_init_requires_a_backend() {
        let mut system = RenderSystem::new(
            BackendRegistry::new(),
            Arc::new(RenderCmdSystem::new()),
            RendererSettings::default(),
        );

        assert!(matches!(system.init(), Err(RenderError::NoBackend)));
        assert!(!system.is_init());
    }

    #[test]
    fn test_lifecycle_ops_before_init_are_checked_noops() {
        let log = CallLog::default();
        let mut registry = BackendRegistry::new();
        registry.register(Box::new(RecordingBackend::new(log.clone())));
        let mut system = RenderSystem::new(
            registry,
            Arc::new(RenderCmdSystem::new()),
            RendererSettings::default(),
        );

        system.process_commands();
        system.reload_backend_implementation();
        assert!(!system.change_backend_implementation("tracer"));
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_frame_scenario_dispatch_order() {
        let (mut system, log) = recording_system();
        let cmds = system.cmds().clone();
        let frames_before = cmds.frames();

        let scene = system.main_scene().unwrap().clone();
        let model = {
            use crate::scene::{Mesh, Model, Vertex};
            use crate::foundation::math::Vec3;
            let vertices = vec![Vertex {
                position: Vec3::zeros(),
                normal: Vec3::new(0.0, 1.0, 0.0),
            }];
            Arc::new(Model::new(
                "ship",
                vec![Arc::new(Mesh::new("hull", vertices, vec![0], None))],
            ))
        };

        cmds.add_begin_frame_cmd();
        let instance = scene.add_model_ref(model, crate::foundation::math::Transform::identity());
        scene.draw(&cmds, (64, 64), true);
        cmds.add_end_frame_cmd();

        system.process_commands();

        let calls = log.take();
        assert_eq!(
            calls,
            vec![
                "begin_frame",
                "entity_added:ship",
                "draw_view:1",
                "end_frame"
            ]
        );
        assert_eq!(cmds.frames(), frames_before + 1);
        drop(instance);
    }

    #[test]
    fn test_ui_and_impl_command_dispatch() {
        let (mut system, log) = recording_system();
        let cmds = system.cmds().clone();
        let scene = system.main_scene().unwrap().clone();

        cmds.add_draw_ui_cmd(Box::new(UiConf {
            scene,
            config: *system.config(),
            draw_info: None,
        }));
        cmds.add_draw_on_mesh_cmd(&DrawInfo::default());
        cmds.add_impl_screenshot_cmd();
        system.process_commands();

        assert_eq!(
            log.take(),
            vec!["draw_ui", "draw_on_mesh", "screenshot:true"]
        );
    }

    #[test]
    fn test_unknown_implementation_keeps_current() {
        let (mut system, log) = recording_system();
        let before = system.current_backend_implementation();

        assert!(!system.change_backend_implementation("does-not-exist"));
        assert!(log.take().is_empty());
        assert_eq!(system.current_backend_implementation(), before);
    }

    #[test]
    fn test_change_implementation_by_name_resolves_index() {
        let (mut system, log) = recording_system();

        assert!(system.change_backend_implementation("tracer"));
        assert_eq!(log.take(), vec!["change_implementation:1"]);
        assert_eq!(
            system.current_backend_implementation().as_deref(),
            Some("tracer")
        );
    }

    #[test]
    fn test_add_implementation_extends_registry() {
        let (mut system, _log) = recording_system();

        system.add_implementation(Box::new(NoopImpl));
        assert!(system
            .available_backend_implementations()
            .contains(&"noop".to_string()));
        assert_eq!(system.find_backend_implementation("noop"), Some(2));
    }

    #[test]
    fn test_remove_render_scene_untracked_is_noop() {
        let (mut system, _log) = recording_system();
        let foreign = Arc::new(RenderScene::new("foreign"));

        system.remove_render_scene(&foreign);
        assert!(system.main_scene().is_some());
    }

    #[test]
    fn test_free_main_scene_unloads_first() {
        let (mut system, log) = recording_system();

        system.free_main_render_scene();
        assert_eq!(log.take(), vec!["scene_unload"]);
        assert!(system.main_scene().is_none());
    }

    #[test]
    fn test_reload_current_scene_unload_then_load() {
        let (mut system, log) = recording_system();

        system.reload_current_scene();
        assert_eq!(log.take(), vec!["scene_unload", "scene_load"]);
        assert!(system.main_scene().unwrap().is_ready());
    }

    #[test]
    fn test_shutdown_unloads_scenes() {
        let (mut system, log) = recording_system();

        system.shutdown();
        let calls = log.take();
        assert_eq!(calls, vec!["scene_unload", "shutdown"]);
        assert!(!system.is_init());
    }
}
