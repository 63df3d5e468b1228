//! Forward rasterizer implementation
//!
//! The default technique: projects every visible surface vertex and
//! splats it into the framebuffer with a flat light tint. Deliberately
//! simple shading — the interesting part is the lifecycle: it owns a
//! [`Pipeline`] double buffer, so shader edits rebuild into the back
//! slot and promote at the next bind without stalling a frame.

use std::sync::Arc;

use crate::foundation::math::{Mat4, Point3, Vec4};
use crate::render::pipeline::{Pipeline, PipelineDesc};
use crate::render::view::{DrawInfo, RenderInfo, UiConf, ViewDef};
use crate::render::{BackendResult, RenderBackendImplementation};
use crate::scene::{SceneData, SceneRef};

use super::device::SoftwareDevice;
use super::{color_to_rgba, light_tint, project_to_pixel};

const SURFACE_SHADER: &str = "surface_flat_v1";
const CLEAR_COLOR: [u8; 4] = [26, 27, 36, 255];

/// Point-splatting forward rasterizer
pub struct ForwardRasterizer {
    device: Arc<SoftwareDevice>,
    pipeline: Option<Arc<Pipeline>>,
    scene_loaded: bool,
    last_view_proj: Option<Mat4>,
}

impl ForwardRasterizer {
    /// Create the rasterizer against a device
    pub fn new(device: Arc<SoftwareDevice>) -> Self {
        Self {
            device,
            pipeline: None,
            scene_loaded: false,
            last_view_proj: None,
        }
    }

    /// The surface pipeline, for hot-reload callers
    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.pipeline.as_ref()
    }
}

impl RenderBackendImplementation for ForwardRasterizer {
    fn name(&self) -> &str {
        "forward"
    }

    fn prepare(&mut self, info: &RenderInfo) -> BackendResult<()> {
        log::info!(
            "Preparing forward rasterizer, target {}x{}",
            info.target_size.0,
            info.target_size.1
        );
        let mut desc = PipelineDesc::new("forward.surface", SURFACE_SHADER);
        desc.point_size = 3;
        let pipeline = Arc::new(Pipeline::new(self.device.clone(), desc));
        pipeline.finish()?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy();
        }
        self.last_view_proj = None;
    }

    fn scene_load(&mut self, scene: &SceneData) {
        let surfaces: usize = scene.models.iter().map(|m| m.model.meshes.len()).sum();
        log::info!(
            "forward: scene loaded, {} models / {} surfaces",
            scene.models.len(),
            surfaces
        );
        self.scene_loaded = true;
    }

    fn scene_unload(&mut self, _scene: &SceneData) {
        log::info!("forward: scene unloaded");
        self.scene_loaded = false;
    }

    fn draw_view(&mut self, view: &mut ViewDef) {
        let Some(pipeline) = self.pipeline.clone() else {
            log::error!("forward: draw_view without prepare");
            return;
        };
        if !self.scene_loaded {
            log::debug!("forward: draw_view with no scene loaded");
            return;
        }
        let handle = match pipeline.bind_front() {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("forward: {e}");
                return;
            }
        };
        let state = match self.device.bind_pipeline(handle) {
            Ok(state) => state,
            Err(e) => {
                log::error!("forward: {e}");
                return;
            }
        };

        let view_proj = view.projection_matrix * view.view_matrix;
        self.last_view_proj = Some(view_proj);
        let tint = light_tint(&view.lights);
        let target = self.device.size();

        self.device.with_framebuffer(|fb| {
            fb.clear(CLEAR_COLOR);
            for surf in &view.surfaces {
                let base = surf
                    .mesh
                    .material
                    .as_ref()
                    .map_or(Vec4::new(0.8, 0.8, 0.8, 1.0), |m| m.base_color);
                let color = color_to_rgba(Vec4::new(
                    base.x * tint.x,
                    base.y * tint.y,
                    base.z * tint.z,
                    base.w,
                ));
                for vertex in &surf.mesh.vertices {
                    let world = surf
                        .model_matrix
                        .transform_point(&Point3::from(vertex.position));
                    if let Some((x, y)) = project_to_pixel(&view_proj, world.coords, target) {
                        fb.splat(x, y, state.point_size, color, state.blend);
                    }
                }
            }
        });

        // Frame work is complete past this fence; retired handles from a
        // promoted rebuild are now safe to destroy.
        self.device.wait_idle();
        pipeline.destroy_retired();
    }

    fn draw_ui(&mut self, ui: &mut UiConf) {
        if !ui.config.show_gui {
            return;
        }
        // Placeholder status strip; real widget drawing is the GUI
        // collaborator's job.
        let (width, _) = self.device.size();
        self.device.with_framebuffer(|fb| {
            for x in 0..width.min(64) {
                fb.splat(x as i32, 0, 1, [220, 220, 220, 255], crate::render::BlendMode::Opaque);
            }
        });
    }

    fn window_size_changed(&mut self, width: u32, height: u32) {
        log::debug!("forward: resize to {width}x{height}");
        self.device.resize(width, height);
    }

    fn entity_added(&mut self, entity: &SceneRef) {
        log::debug!("forward: entity added: {}", entity.name());
    }

    fn entity_removed(&mut self, entity: &SceneRef) {
        log::debug!("forward: entity removed: {}", entity.name());
    }

    fn draw_on_mesh(&mut self, draw_info: &DrawInfo) -> bool {
        let Some(view_proj) = self.last_view_proj else {
            return false;
        };
        let target = self.device.size();
        let Some((x, y)) = project_to_pixel(&view_proj, draw_info.position_ws, target) else {
            return false;
        };
        let size = ((draw_info.radius * 32.0).ceil() as u32).max(1);
        let color = color_to_rgba(draw_info.color0);
        let blend = if draw_info.soft_brush {
            crate::render::BlendMode::Alpha
        } else {
            crate::render::BlendMode::Opaque
        };
        self.device.with_framebuffer(|fb| fb.splat(x, y, size, color, blend));
        true
    }

    fn screenshot(&mut self, file_name: &str) {
        let mut info = crate::render::ScreenshotInfo::named(file_name);
        self.device.capture(&mut info);
        match crate::render::export::save_png(&info, ".") {
            Ok(path) => log::info!("forward: screenshot saved: {}", path.display()),
            Err(e) => log::error!("forward: screenshot failed: {e}"),
        }
    }
}
