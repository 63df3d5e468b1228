//! Scene asset and instance types
//!
//! Assets (meshes, models, lights, cameras, materials, images) are the
//! immutable in-memory representations handed over by importers. Instances
//! (`Ref*` types) place an asset in the world. Instances are shared as
//! `Arc`s with the render thread; mutation goes through copy-on-write in
//! [`RenderScene`](super::RenderScene), so a snapshot captured for a frame
//! is never written through.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext, Point3, Transform, Vec3, Vec4};

/// Axis-aligned bounding box in model or world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Inverted box that grows to fit the first extended point
    pub fn empty() -> Self {
        Self {
            min: Vec3::from_element(f32::INFINITY),
            max: Vec3::from_element(f32::NEG_INFINITY),
        }
    }

    /// Grow to contain `point`
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Grow to contain `other`
    pub fn union(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Smallest box containing all points
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.extend(*p);
        }
        aabb
    }

    /// World-space box covering this box under `matrix`
    pub fn transform(&self, matrix: &Mat4) -> Aabb {
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.extend(matrix.transform_point(&corner).coords);
        }
        out
    }

    /// Box center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// One mesh vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space
    pub position: Vec3,
    /// Surface normal
    pub normal: Vec3,
}

/// Indexed triangle geometry with an optional material binding
#[derive(Debug)]
pub struct Mesh {
    /// Mesh name for logs and lookups
    pub name: String,
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle indices
    pub indices: Vec<u32>,
    /// Material applied to every triangle of this mesh
    pub material: Option<Arc<Material>>,
    aabb: Aabb,
}

impl Mesh {
    /// Build a mesh, computing its bounding box from the vertices
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        material: Option<Arc<Material>>,
    ) -> Self {
        let aabb = Aabb::from_points(vertices.iter().map(|v| &v.position));
        Self {
            name: name.into(),
            vertices,
            indices,
            material,
            aabb,
        }
    }

    /// Model-space bounding box
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }
}

/// A named group of meshes sharing one placement
#[derive(Debug)]
pub struct Model {
    /// Model name
    pub name: String,
    /// Meshes drawn with this model's transform
    pub meshes: Vec<Arc<Mesh>>,
    aabb: Aabb,
}

impl Model {
    /// Build a model, unioning the mesh bounds
    pub fn new(name: impl Into<String>, meshes: Vec<Arc<Mesh>>) -> Self {
        let mut aabb = Aabb::empty();
        for mesh in &meshes {
            aabb.union(mesh.aabb());
        }
        Self {
            name: name.into(),
            meshes,
            aabb,
        }
    }

    /// Model-space bounding box over all meshes
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }
}

/// Surface appearance parameters
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name
    pub name: String,
    /// RGBA base color
    pub base_color: Vec4,
    /// Skip lighting for this material
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            base_color: Vec4::new(0.8, 0.8, 0.8, 1.0),
            unlit: false,
        }
    }
}

/// Decoded image pixels
#[derive(Debug)]
pub struct Image {
    /// Image name
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 data
    pub pixels: Vec<u8>,
}

/// Light emission shape
#[derive(Debug, Clone)]
pub enum LightKind {
    /// Parallel rays along `direction`
    Directional {
        /// Normalized emission direction
        direction: Vec3,
    },
    /// Omnidirectional emitter with a falloff range
    Point {
        /// Influence radius
        range: f32,
    },
}

/// Light asset
#[derive(Debug, Clone)]
pub struct Light {
    /// Light name
    pub name: String,
    /// Linear RGB color
    pub color: Vec3,
    /// Emission strength
    pub intensity: f32,
    /// Emission shape
    pub kind: LightKind,
}

/// Camera asset holding projection parameters
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera name
    pub name: String,
    /// Vertical field of view in degrees
    pub fov_y_deg: f32,
    /// Near plane distance
    pub z_near: f32,
    /// Far plane distance
    pub z_far: f32,
}

impl Camera {
    /// Projection matrix for the given aspect ratio
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective(deg_to_rad(self.fov_y_deg), aspect, self.z_near, self.z_far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            fov_y_deg: 60.0,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }
}

static NEXT_REF_ID: AtomicU64 = AtomicU64::new(1);

fn next_ref_id() -> u64 {
    NEXT_REF_ID.fetch_add(1, Ordering::Relaxed)
}

/// Endless spin around an axis, the one animation track instances carry
#[derive(Debug, Clone, Copy)]
pub struct SpinAnimation {
    /// Rotation axis
    pub axis: Vec3,
    /// Angular speed in radians per second
    pub radians_per_sec: f32,
}

/// A model placed in the world
#[derive(Debug, Clone)]
pub struct RefModel {
    id: u64,
    /// The placed asset
    pub model: Arc<Model>,
    /// Placement in world space
    pub transform: Transform,
    /// Cached world matrix, kept in sync with `transform`
    pub model_matrix: Mat4,
    /// Animation track, if any
    pub animation: Option<SpinAnimation>,
}

impl RefModel {
    /// Place `model` at `transform`
    pub fn new(model: Arc<Model>, transform: Transform) -> Self {
        let model_matrix = transform.to_matrix();
        Self {
            id: next_ref_id(),
            model,
            transform,
            model_matrix,
            animation: None,
        }
    }

    /// Stable instance id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Recompute the cached world matrix after a transform change
    pub fn refresh_matrix(&mut self) {
        self.model_matrix = self.transform.to_matrix();
    }
}

/// A light placed in the world
#[derive(Debug, Clone)]
pub struct RefLight {
    id: u64,
    /// The placed asset
    pub light: Arc<Light>,
    /// Placement in world space
    pub transform: Transform,
    /// Cached world position
    pub position: Vec3,
}

impl RefLight {
    /// Place `light` at `transform`
    pub fn new(light: Arc<Light>, transform: Transform) -> Self {
        let position = transform.position;
        Self {
            id: next_ref_id(),
            light,
            transform,
            position,
        }
    }

    /// Stable instance id
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A camera placed in the world
#[derive(Debug, Clone)]
pub struct RefCamera {
    id: u64,
    /// The placed asset
    pub camera: Arc<Camera>,
    /// View matrix for this camera position
    pub view_matrix: Mat4,
    /// World-space eye position
    pub position: Vec3,
    /// Normalized view direction
    pub direction: Vec3,
}

impl RefCamera {
    /// Camera looking from `eye` towards `target` with +Y up
    pub fn looking_at(camera: Arc<Camera>, eye: Vec3, target: Vec3) -> Self {
        let view_matrix = Mat4::look_at(eye, target, Vec3::new(0.0, 1.0, 0.0));
        Self {
            id: next_ref_id(),
            camera,
            view_matrix,
            position: eye,
            direction: (target - eye).normalize(),
        }
    }

    /// Stable instance id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Re-aim the camera
    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.view_matrix = Mat4::look_at(eye, target, Vec3::new(0.0, 1.0, 0.0));
        self.position = eye;
        self.direction = (target - eye).normalize();
    }
}

/// Shared handle to any placed instance
///
/// This is the payload of ENTITY_ADDED/ENTITY_REMOVED commands; the queue
/// holds a counted reference until the command is processed and deleted.
#[derive(Debug, Clone)]
pub enum SceneRef {
    /// Model instance
    Model(Arc<RefModel>),
    /// Light instance
    Light(Arc<RefLight>),
    /// Camera instance
    Camera(Arc<RefCamera>),
}

impl SceneRef {
    /// Stable instance id
    pub fn id(&self) -> u64 {
        match self {
            Self::Model(m) => m.id(),
            Self::Light(l) => l.id(),
            Self::Camera(c) => c.id(),
        }
    }

    /// Name of the underlying asset
    pub fn name(&self) -> &str {
        match self {
            Self::Model(m) => &m.model.name,
            Self::Light(l) => &l.light.name,
            Self::Camera(c) => &c.camera.name,
        }
    }
}

/// Shared handle to an asset, the payload of ASSET_ADDED/ASSET_REMOVED
#[derive(Debug, Clone)]
pub enum Asset {
    /// Model asset
    Model(Arc<Model>),
    /// Light asset
    Light(Arc<Light>),
    /// Image asset
    Image(Arc<Image>),
    /// Material asset
    Material(Arc<Material>),
}

impl Asset {
    /// Asset name
    pub fn name(&self) -> &str {
        match self {
            Self::Model(m) => &m.name,
            Self::Light(l) => &l.name,
            Self::Image(i) => &i.name,
            Self::Material(m) => &m.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_quad() -> Vec<Vertex> {
        let normal = Vec3::new(0.0, 0.0, 1.0);
        [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ]
        .into_iter()
        .map(|position| Vertex { position, normal })
        .collect()
    }

    #[test]
    fn test_mesh_aabb_from_vertices() {
        let mesh = Mesh::new("quad", unit_quad(), vec![0, 1, 2, 0, 2, 3], None);

        assert_eq!(mesh.aabb().min, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(mesh.aabb().max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_aabb_transform_translates() {
        let aabb = Aabb {
            min: Vec3::new(-1.0, -1.0, -1.0),
            max: Vec3::new(1.0, 1.0, 1.0),
        };
        let moved = aabb.transform(&Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)));

        assert_relative_eq!(moved.min.x, 4.0);
        assert_relative_eq!(moved.max.x, 6.0);
        assert_relative_eq!(moved.center().x, 5.0);
    }

    #[test]
    fn test_ref_ids_are_unique() {
        let model = Arc::new(Model::new("m", vec![]));
        let a = RefModel::new(model.clone(), Transform::identity());
        let b = RefModel::new(model, Transform::identity());

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_refresh_matrix_tracks_transform() {
        let model = Arc::new(Model::new("m", vec![]));
        let mut instance = RefModel::new(model, Transform::identity());

        instance.transform.position = Vec3::new(0.0, 3.0, 0.0);
        instance.refresh_matrix();

        assert_relative_eq!(instance.model_matrix[(1, 3)], 3.0);
    }
}
