//! Backend abstraction traits
//!
//! [`RenderBackend`] owns the device/surface and a registry of
//! [`RenderBackendImplementation`]s — the pluggable rendering techniques.
//! The render system drives backends exclusively through these traits;
//! single-level polymorphism, no deeper hierarchy.
//!
//! Lifecycle ordering contract enforced by the callers:
//! `prepare` always precedes the first `scene_load`; `scene_unload`
//! always precedes `destroy` or a `scene_load` of a different scene;
//! `draw_view`/`draw_ui` only run between a completed `scene_load` and
//! the next `scene_unload`.

use crate::scene::{SceneData, SceneRef};

use super::pipeline::PipelineDesc;
use super::view::{DrawInfo, RenderInfo, ScreenshotInfo, UiConf, ViewDef};
use super::BackendResult;

slotmap::new_key_type! {
    /// Opaque handle to a native pipeline object
    ///
    /// Generational: a destroyed handle never aliases a later one, so a
    /// stale entry on a retirement list stays detectable.
    pub struct PipelineHandle;
}

/// Device-side factory for native pipeline objects
///
/// The seam between the API-agnostic [`Pipeline`](super::Pipeline)
/// double buffer and whatever the device compiles pipelines into.
pub trait PipelineFactory: Send + Sync {
    /// Compile `desc` into a native pipeline object
    fn create_pipeline(&self, desc: &PipelineDesc) -> BackendResult<PipelineHandle>;

    /// Destroy a pipeline object; the caller guarantees no in-flight work
    /// references it
    fn destroy_pipeline(&self, handle: PipelineHandle);
}

/// One rendering technique (rasterizer, path tracer, ...)
///
/// Strategy object owned by a [`RenderBackend`]. Required operations
/// cover resource preparation, scene load/unload and per-frame drawing;
/// the optional hooks default to no-ops.
pub trait RenderBackendImplementation: Send {
    /// Implementation name used for selection and logs
    fn name(&self) -> &str;

    /// The render surface changed size
    fn window_size_changed(&mut self, _width: u32, _height: u32) {}

    /// A scene instance appeared while the scene is loaded
    fn entity_added(&mut self, _entity: &SceneRef) {}

    /// A scene instance disappeared while the scene is loaded
    fn entity_removed(&mut self, _entity: &SceneRef) {}

    /// Apply a paint stroke; returns whether the stroke was handled
    fn draw_on_mesh(&mut self, _draw_info: &DrawInfo) -> bool {
        false
    }

    /// Implementation-side capture, e.g. of internal buffers
    fn screenshot(&mut self, _file_name: &str) {
        log::warn!("{}: screenshot not implemented", self.name());
    }

    /// Allocate GPU resources; always called before the first scene load
    fn prepare(&mut self, info: &RenderInfo) -> BackendResult<()>;

    /// Release everything `prepare` allocated
    fn destroy(&mut self);

    /// Upload scene resources; only called after a completed `prepare`
    fn scene_load(&mut self, scene: &SceneData);

    /// Drop scene resources; always called before `destroy` or a load of
    /// a different scene
    fn scene_unload(&mut self, scene: &SceneData);

    /// Render one view snapshot
    fn draw_view(&mut self, view: &mut ViewDef);

    /// Render the UI layer
    fn draw_ui(&mut self, ui: &mut UiConf);
}

/// Owner of the device/surface and the implementation registry
///
/// Dispatches per-frame work to the currently selected implementation.
/// The current implementation only changes between frames, never inside
/// `draw_view`.
pub trait RenderBackend: Send {
    /// Backend name used for selection and logs
    fn name(&self) -> &str;

    /// Bring up the device and prepare the default implementation
    fn init(&mut self) -> BackendResult<()>;

    /// Tear down all implementations and the device
    fn shutdown(&mut self);

    /// Register an additional implementation
    fn add_implementation(&mut self, implementation: Box<dyn RenderBackendImplementation>);

    /// Re-enter the current implementation: unload, destroy, prepare, load
    ///
    /// Hot-reload entry point after external resource changes.
    fn reload_implementation(&mut self, scene: &SceneData);

    /// Switch techniques: unload and destroy the old implementation, then
    /// prepare and load the new one
    fn change_implementation(&mut self, index: usize, scene: &SceneData);

    /// Index of the current implementation, if any are registered
    fn current_implementation_index(&self) -> Option<usize>;

    /// Names of all registered implementations, in registration order
    fn implementation_names(&self) -> Vec<String>;

    /// Recreate the render surface after a size change
    fn recreate_render_surface(&mut self, _width: u32, _height: u32) {}

    /// Forward an added scene instance to the current implementation
    fn entity_added(&mut self, _entity: &SceneRef) {}

    /// Forward a removed scene instance to the current implementation
    fn entity_removed(&mut self, _entity: &SceneRef) {}

    /// Forward a paint stroke; returns whether it was handled
    fn draw_on_mesh(&mut self, _draw_info: &DrawInfo) -> bool {
        false
    }

    /// Forward an implementation-side capture request
    fn screenshot(&mut self, _file_name: &str) {}

    /// Load a scene into the current implementation
    fn scene_load(&mut self, scene: &SceneData);

    /// Unload a scene from the current implementation
    fn scene_unload(&mut self, scene: &SceneData);

    /// Start recording a frame
    fn begin_frame(&mut self);

    /// Render one view snapshot
    fn draw_view(&mut self, view: &mut ViewDef);

    /// Render the UI layer
    fn draw_ui(&mut self, ui: &mut UiConf);

    /// Fill `screenshot` with the current swapchain content
    fn capture_swapchain(&mut self, _screenshot: &mut ScreenshotInfo) {}

    /// Submit and present the frame
    fn end_frame(&mut self);
}
