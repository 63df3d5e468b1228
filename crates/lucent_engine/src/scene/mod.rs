//! Scene graph: assets, placed instances, and the render scene container

pub mod entities;
pub mod frustum;
pub mod render_scene;

pub use entities::{
    Aabb, Asset, Camera, Image, Light, LightKind, Material, Mesh, Model, RefCamera, RefLight,
    RefModel, SceneRef, SpinAnimation, Vertex,
};
pub use frustum::Frustum;
pub use render_scene::{RenderScene, SceneData, SceneUpdates};
