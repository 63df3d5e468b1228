//! Progressive color tracer implementation
//!
//! Second shipped technique, mostly here to make implementation
//! switching meaningful: coarse per-surface splats, distance-attenuated,
//! alpha-accumulated over frames. Any scene change reported through the
//! view delta resets the accumulation.

use std::sync::Arc;

use crate::foundation::math::Vec4;
use crate::render::pipeline::{BlendMode, Pipeline, PipelineDesc};
use crate::render::view::{RenderInfo, UiConf, ViewDef};
use crate::render::{BackendResult, RenderBackendImplementation};
use crate::scene::SceneData;

use super::device::SoftwareDevice;
use super::{color_to_rgba, light_tint, project_to_pixel};

const TRACE_SHADER: &str = "trace_accumulate_v1";
const CLEAR_COLOR: [u8; 4] = [8, 8, 12, 255];

/// Accumulating splat tracer
pub struct ColorTracer {
    device: Arc<SoftwareDevice>,
    pipeline: Option<Arc<Pipeline>>,
    scene_loaded: bool,
    accumulated: u32,
}

impl ColorTracer {
    /// Create the tracer against a device
    pub fn new(device: Arc<SoftwareDevice>) -> Self {
        Self {
            device,
            pipeline: None,
            scene_loaded: false,
            accumulated: 0,
        }
    }

    /// Accumulated frame count since the last scene change
    pub fn accumulated(&self) -> u32 {
        self.accumulated
    }
}

impl RenderBackendImplementation for ColorTracer {
    fn name(&self) -> &str {
        "tracer"
    }

    fn prepare(&mut self, info: &RenderInfo) -> BackendResult<()> {
        log::info!(
            "Preparing color tracer, target {}x{}",
            info.target_size.0,
            info.target_size.1
        );
        let mut desc = PipelineDesc::new("tracer.accumulate", TRACE_SHADER);
        desc.point_size = 5;
        desc.blend = BlendMode::Alpha;
        let pipeline = Arc::new(Pipeline::new(self.device.clone(), desc));
        pipeline.finish()?;
        self.pipeline = Some(pipeline);
        self.accumulated = 0;
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.destroy();
        }
    }

    fn scene_load(&mut self, scene: &SceneData) {
        log::info!("tracer: scene loaded, {} models", scene.models.len());
        self.scene_loaded = true;
        self.accumulated = 0;
    }

    fn scene_unload(&mut self, _scene: &SceneData) {
        log::info!("tracer: scene unloaded");
        self.scene_loaded = false;
    }

    fn draw_view(&mut self, view: &mut ViewDef) {
        let Some(pipeline) = self.pipeline.clone() else {
            log::error!("tracer: draw_view without prepare");
            return;
        };
        if !self.scene_loaded {
            return;
        }
        if !view.updates.is_empty() {
            self.accumulated = 0;
        }
        let handle = match pipeline.bind_front() {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("tracer: {e}");
                return;
            }
        };
        let state = match self.device.bind_pipeline(handle) {
            Ok(state) => state,
            Err(e) => {
                log::error!("tracer: {e}");
                return;
            }
        };

        let view_proj = view.projection_matrix * view.view_matrix;
        let tint = light_tint(&view.lights);
        let target = self.device.size();
        // Early samples dominate, later ones refine
        let weight = 255 / (self.accumulated + 1).min(8);
        let restart = self.accumulated == 0;

        self.device.with_framebuffer(|fb| {
            if restart {
                fb.clear(CLEAR_COLOR);
            }
            for surf in &view.surfaces {
                let center = surf
                    .model_matrix
                    .transform_point(&surf.mesh.aabb().center().into());
                let distance = (center.coords - view.view_pos).norm();
                let attenuation = 1.0 / (1.0 + 0.05 * distance);
                let base = surf
                    .mesh
                    .material
                    .as_ref()
                    .map_or(Vec4::new(0.8, 0.8, 0.8, 1.0), |m| m.base_color);
                let mut color = color_to_rgba(Vec4::new(
                    base.x * tint.x * attenuation,
                    base.y * tint.y * attenuation,
                    base.z * tint.z * attenuation,
                    1.0,
                ));
                color[3] = weight as u8;
                if let Some((x, y)) = project_to_pixel(&view_proj, center.coords, target) {
                    fb.splat(x, y, state.point_size, color, state.blend);
                }
            }
        });
        self.accumulated = self.accumulated.saturating_add(1);

        self.device.wait_idle();
        pipeline.destroy_retired();
    }

    fn draw_ui(&mut self, _ui: &mut UiConf) {
        // The tracer view is left clean; UI overlays belong to the
        // rasterizer preview.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
    use crate::scene::{Frustum, SceneUpdates};

    fn test_view(updates: SceneUpdates) -> ViewDef {
        let projection_matrix = Mat4::perspective(1.0, 1.0, 0.1, 100.0);
        let view_matrix = Mat4::look_at(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );
        ViewDef {
            scene: SceneData::default(),
            frustum: Frustum::from_view_projection(&(projection_matrix * view_matrix)),
            updates,
            projection_matrix,
            view_matrix,
            inv_projection_matrix: Mat4::identity(),
            inv_view_matrix: Mat4::identity(),
            view_pos: Vec3::new(0.0, 0.0, -5.0),
            view_dir: Vec3::new(0.0, 0.0, 1.0),
            frame_index: 0,
            headless: true,
            target_size: (32, 32),
            surfaces: Vec::new(),
            models: Vec::new(),
            lights: Vec::new(),
        }
    }

    fn prepared_tracer() -> ColorTracer {
        let device = Arc::new(SoftwareDevice::new(32, 32));
        let mut tracer = ColorTracer::new(device);
        tracer
            .prepare(&RenderInfo {
                headless: true,
                frame_count: 0,
                target_size: (32, 32),
            })
            .unwrap();
        tracer.scene_load(&SceneData::default());
        tracer
    }

    #[test]
    fn test_accumulation_grows_per_frame() {
        let mut tracer = prepared_tracer();

        tracer.draw_view(&mut test_view(SceneUpdates::empty()));
        tracer.draw_view(&mut test_view(SceneUpdates::empty()));
        assert_eq!(tracer.accumulated(), 2);
    }

    #[test]
    fn test_scene_change_resets_accumulation() {
        let mut tracer = prepared_tracer();

        tracer.draw_view(&mut test_view(SceneUpdates::empty()));
        tracer.draw_view(&mut test_view(SceneUpdates::MODEL_INSTANCES));
        assert_eq!(tracer.accumulated(), 1);
    }
}
