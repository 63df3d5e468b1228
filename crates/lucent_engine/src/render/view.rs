//! Per-frame view and payload types carried by render commands

use std::sync::Arc;

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::scene::{Frustum, Mesh, RefLight, RefModel, RenderScene, SceneData, SceneUpdates};

use super::system::RenderConfig;

/// Static facts a backend implementation needs when preparing resources
#[derive(Debug, Clone, Copy)]
pub struct RenderInfo {
    /// No presentation surface is attached
    pub headless: bool,
    /// Frames processed so far
    pub frame_count: u32,
    /// Current render target size in pixels
    pub target_size: (u32, u32),
}

/// One visible mesh instance, flattened for drawing
#[derive(Debug, Clone)]
pub struct DrawSurf {
    /// Geometry to draw
    pub mesh: Arc<Mesh>,
    /// World matrix copied at snapshot time
    pub model_matrix: Mat4,
    /// Id of the owning model instance
    pub model_id: u64,
}

/// Immutable per-frame snapshot of one rendered view
///
/// Built fresh by [`RenderScene::draw`](crate::scene::RenderScene::draw)
/// each time a view is rendered, owned by the DRAW_VIEW command, and
/// dropped as soon as the consumer has processed it. Never retained past
/// the frame.
#[derive(Debug)]
pub struct ViewDef {
    /// Scene content snapshot for the backend
    pub scene: SceneData,
    /// View frustum used for culling this snapshot
    pub frustum: Frustum,
    /// What changed in the scene since the previous snapshot
    pub updates: SceneUpdates,
    /// Projection matrix
    pub projection_matrix: Mat4,
    /// View matrix
    pub view_matrix: Mat4,
    /// Inverse projection matrix
    pub inv_projection_matrix: Mat4,
    /// Inverse view matrix
    pub inv_view_matrix: Mat4,
    /// World-space eye position
    pub view_pos: Vec3,
    /// Normalized view direction
    pub view_dir: Vec3,
    /// Frame index, stamped by the consumer when the command is processed
    pub frame_index: u32,
    /// Rendering without a presentation surface
    pub headless: bool,
    /// Render target size in pixels
    pub target_size: (u32, u32),
    /// Visible surfaces after culling
    pub surfaces: Vec<DrawSurf>,
    /// Visible model instances after culling
    pub models: Vec<Arc<RefModel>>,
    /// Lights affecting this view
    pub lights: Vec<Arc<RefLight>>,
}

/// Frame context handed to the GUI drawing collaborator
#[derive(Debug)]
pub struct UiConf {
    /// Scene the frame was built from
    pub scene: Arc<RenderScene>,
    /// Frame statistics and GUI visibility flags at snapshot time
    pub config: RenderConfig,
    /// Active mesh-painting brush, if any
    pub draw_info: Option<DrawInfo>,
}

/// Swapchain capture buffer filled by the backend, consumed by an exporter
#[derive(Debug, Default, Clone)]
pub struct ScreenshotInfo {
    /// Target file name (extension decides nothing; PNG is written)
    pub name: String,
    /// Captured width in pixels
    pub width: u32,
    /// Captured height in pixels
    pub height: u32,
    /// Channels per pixel, 3 or 4
    pub channels: u32,
    /// Tightly packed pixel bytes
    pub data: Vec<u8>,
}

impl ScreenshotInfo {
    /// Capture request carrying only the destination name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// What a mesh-paint stroke writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTarget {
    /// Paint into per-vertex colors
    VertexColor,
    /// Implementation-defined paint target
    Custom,
}

/// Brush state for painting directly on a mesh
#[derive(Debug, Clone)]
pub struct DrawInfo {
    /// Paint destination
    pub target: DrawTarget,
    /// Cursor highlight color
    pub cursor_color: Vec3,
    /// Brush center in world space
    pub position_ws: Vec3,
    /// Surface normal at the brush center
    pub normal_ws: Vec3,
    /// Brush radius in world units
    pub radius: f32,
    /// Primary paint color
    pub color0: Vec4,
    /// Secondary paint color
    pub color1: Vec4,
    /// Write RGB channels
    pub draw_rgb: bool,
    /// Write the alpha channel
    pub draw_alpha: bool,
    /// Feather the brush edge
    pub soft_brush: bool,
    /// Paint every mesh of the model, not only the hit one
    pub draw_all: bool,
}

impl Default for DrawInfo {
    fn default() -> Self {
        Self {
            target: DrawTarget::VertexColor,
            cursor_color: Vec3::new(1.0, 1.0, 1.0),
            position_ws: Vec3::zeros(),
            normal_ws: Vec3::new(0.0, 1.0, 0.0),
            radius: 0.1,
            color0: Vec4::new(1.0, 1.0, 1.0, 1.0),
            color1: Vec4::new(0.0, 0.0, 0.0, 1.0),
            draw_rgb: true,
            draw_alpha: false,
            soft_brush: false,
            draw_all: false,
        }
    }
}
