//! The live scene consumed by backend implementations
//!
//! [`RenderScene`] is shared between the application thread (mutations)
//! and the render thread (reads during draw). Structural changes are not
//! applied concurrently with drawing: mutations are *described* as
//! ENTITY_/ASSET_ commands flushed by [`RenderScene::draw`], and instance
//! data already captured in a snapshot is protected by copy-on-write.
//! The internal mutex only guards the container lists themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bitflags::bitflags;

use crate::foundation::math::{Quat, Transform, Unit, Vec3};
use crate::render::cmd::RenderCmdSystem;
use crate::render::view::{DrawSurf, ViewDef};

use super::entities::{
    Asset, Camera, Image, Light, Material, Model, RefCamera, RefLight, RefModel, SceneRef,
    SpinAnimation,
};
use super::frustum::Frustum;

bitflags! {
    /// Which parts of the scene changed since the last view snapshot
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SceneUpdates: u32 {
        /// Image pixel data changed
        const IMAGES = 1 << 0;
        /// Material parameters changed
        const MATERIALS = 1 << 1;
        /// Instance transforms changed or instances were added/removed
        const MODEL_INSTANCES = 1 << 2;
        /// Mesh geometry changed
        const MODEL_GEOMETRIES = 1 << 3;
        /// Lights changed
        const LIGHTS = 1 << 4;
        /// The active camera moved or was replaced
        const CAMERA = 1 << 5;
    }
}

/// Cheap snapshot of scene content handed to backends
///
/// Arc clones only; safe to carry across the command queue and to hold
/// for the duration of scene load/unload.
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    /// Model instances
    pub models: Vec<Arc<RefModel>>,
    /// Light instances
    pub lights: Vec<Arc<RefLight>>,
    /// Camera instances
    pub cameras: Vec<Arc<RefCamera>>,
    /// Registered materials
    pub materials: Vec<Arc<Material>>,
    /// Registered images
    pub images: Vec<Arc<Image>>,
}

struct SceneInner {
    // assets
    models: Vec<Arc<Model>>,
    lights: Vec<Arc<Light>>,
    images: Vec<Arc<Image>>,
    materials: Vec<Arc<Material>>,
    // instances
    ref_models: Vec<Arc<RefModel>>,
    ref_lights: Vec<Arc<RefLight>>,
    ref_cameras: Vec<Arc<RefCamera>>,
    default_camera: Arc<RefCamera>,
    current_camera: Option<Arc<RefCamera>>,
    update_requests: SceneUpdates,
    // pending notifications, flushed by draw()
    newly_added: Vec<SceneRef>,
    newly_removed: Vec<SceneRef>,
    added_assets: Vec<Asset>,
    removed_assets: Vec<Asset>,
    // animation
    animate: bool,
    animation_time_ms: f32,
}

/// Live scene graph: asset lists plus placed instances
pub struct RenderScene {
    name: String,
    ready: AtomicBool,
    inner: Mutex<SceneInner>,
}

impl std::fmt::Debug for RenderScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScene")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl RenderScene {
    /// Create an empty scene with a default editor camera
    pub fn new(name: impl Into<String>) -> Self {
        let default_camera = Arc::new(RefCamera::looking_at(
            Arc::new(Camera::default()),
            Vec3::new(0.0, 2.0, -8.0),
            Vec3::zeros(),
        ));
        Self {
            name: name.into(),
            ready: AtomicBool::new(false),
            inner: Mutex::new(SceneInner {
                models: Vec::new(),
                lights: Vec::new(),
                images: Vec::new(),
                materials: Vec::new(),
                ref_models: Vec::new(),
                ref_lights: Vec::new(),
                ref_cameras: Vec::new(),
                default_camera,
                current_camera: None,
                update_requests: SceneUpdates::empty(),
                newly_added: Vec::new(),
                newly_removed: Vec::new(),
                added_assets: Vec::new(),
                removed_assets: Vec::new(),
                animate: false,
                animation_time_ms: 0.0,
            }),
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gate drawing; a scene that is not ready produces no view snapshots
    pub fn ready_to_render(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Whether [`draw`](Self::draw) will produce snapshots
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Register a model asset
    pub fn add_model(&self, model: Arc<Model>) {
        let mut inner = self.inner.lock().unwrap();
        inner.added_assets.push(Asset::Model(model.clone()));
        inner.models.push(model);
    }

    /// Register a material asset
    pub fn add_material(&self, material: Arc<Material>) {
        let mut inner = self.inner.lock().unwrap();
        inner.added_assets.push(Asset::Material(material.clone()));
        inner.materials.push(material);
        inner.update_requests |= SceneUpdates::MATERIALS;
    }

    /// Register an image asset
    pub fn add_image(&self, image: Arc<Image>) {
        let mut inner = self.inner.lock().unwrap();
        inner.added_assets.push(Asset::Image(image.clone()));
        inner.images.push(image);
        inner.update_requests |= SceneUpdates::IMAGES;
    }

    /// Place a model in the world and queue its ENTITY_ADDED notification
    pub fn add_model_ref(&self, model: Arc<Model>, transform: Transform) -> Arc<RefModel> {
        let instance = Arc::new(RefModel::new(model, transform));
        let mut inner = self.inner.lock().unwrap();
        inner.ref_models.push(instance.clone());
        inner.newly_added.push(SceneRef::Model(instance.clone()));
        inner.update_requests |= SceneUpdates::MODEL_INSTANCES;
        instance
    }

    /// Place a light in the world and queue its ENTITY_ADDED notification
    pub fn add_light_ref(&self, light: Arc<Light>, transform: Transform) -> Arc<RefLight> {
        let instance = Arc::new(RefLight::new(light, transform));
        let mut inner = self.inner.lock().unwrap();
        inner.lights.push(instance.light.clone());
        inner.ref_lights.push(instance.clone());
        inner.newly_added.push(SceneRef::Light(instance.clone()));
        inner.update_requests |= SceneUpdates::LIGHTS;
        instance
    }

    /// Place a camera in the world
    pub fn add_camera_ref(&self, camera: Arc<RefCamera>) {
        let mut inner = self.inner.lock().unwrap();
        inner.ref_cameras.push(camera.clone());
        inner.newly_added.push(SceneRef::Camera(camera));
        inner.update_requests |= SceneUpdates::CAMERA;
    }

    /// Remove a model instance; silently ignores instances not in the scene
    pub fn remove_model(&self, instance: &Arc<RefModel>) {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.ref_models.len();
        inner.ref_models.retain(|m| m.id() != instance.id());
        if inner.ref_models.len() != before {
            inner.newly_removed.push(SceneRef::Model(instance.clone()));
            inner.update_requests |= SceneUpdates::MODEL_INSTANCES;
        }
    }

    /// Remove a light instance; silently ignores instances not in the scene
    pub fn remove_light(&self, instance: &Arc<RefLight>) {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.ref_lights.len();
        inner.ref_lights.retain(|l| l.id() != instance.id());
        if inner.ref_lights.len() != before {
            inner.lights.retain(|l| !Arc::ptr_eq(l, &instance.light));
            inner
                .removed_assets
                .push(Asset::Light(instance.light.clone()));
            inner.newly_removed.push(SceneRef::Light(instance.clone()));
            inner.update_requests |= SceneUpdates::LIGHTS;
        }
    }

    /// Accumulate update flags for the next view snapshot
    pub fn request_update(&self, updates: SceneUpdates) {
        self.inner.lock().unwrap().update_requests |= updates;
    }

    /// Attach or replace the animation track of a placed model
    ///
    /// Copy-on-write: snapshots already handed to the render thread keep
    /// the old instance data.
    pub fn set_animation(&self, instance: &Arc<RefModel>, animation: Option<SpinAnimation>) {
        let mut inner = self.inner.lock().unwrap();
        let id = instance.id();
        if let Some(slot) = inner.ref_models.iter_mut().find(|m| m.id() == id) {
            Arc::make_mut(slot).animation = animation;
        }
    }

    /// Select the camera used for the next snapshots
    pub fn set_current_camera(&self, camera: Arc<RefCamera>) {
        let mut inner = self.inner.lock().unwrap();
        inner.current_camera = Some(camera);
        inner.update_requests |= SceneUpdates::CAMERA;
    }

    /// The selected camera, falling back to the built-in default
    pub fn current_camera(&self) -> Arc<RefCamera> {
        let inner = self.inner.lock().unwrap();
        inner
            .current_camera
            .clone()
            .unwrap_or_else(|| inner.default_camera.clone())
    }

    /// Whether animation playback is on
    pub fn animation(&self) -> bool {
        self.inner.lock().unwrap().animate
    }

    /// Start or stop animation playback
    pub fn set_animation_playing(&self, play: bool) {
        self.inner.lock().unwrap().animate = play;
    }

    /// Rewind animation time to zero
    pub fn reset_animation(&self) {
        self.inner.lock().unwrap().animation_time_ms = 0.0;
    }

    /// Advance animation by `dt_ms` milliseconds
    ///
    /// Spins animated instances and raises the MODEL_INSTANCES flag so
    /// the next snapshot carries the change.
    pub fn update(&self, dt_ms: f32) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.animate {
            return;
        }
        inner.animation_time_ms += dt_ms;

        let mut any_animated = false;
        for slot in &mut inner.ref_models {
            let Some(spin) = slot.animation else {
                continue;
            };
            let angle = spin.radians_per_sec * dt_ms / 1000.0;
            let instance = Arc::make_mut(slot);
            instance.transform.rotation =
                Quat::from_axis_angle(&Unit::new_normalize(spin.axis), angle)
                    * instance.transform.rotation;
            instance.refresh_matrix();
            any_animated = true;
        }
        if any_animated {
            inner.update_requests |= SceneUpdates::MODEL_INSTANCES;
        }
    }

    /// Snapshot the scene content for backend load/unload
    pub fn scene_data(&self) -> SceneData {
        let inner = self.inner.lock().unwrap();
        SceneData {
            models: inner.ref_models.clone(),
            lights: inner.ref_lights.clone(),
            cameras: inner.ref_cameras.clone(),
            materials: inner.materials.clone(),
            images: inner.images.clone(),
        }
    }

    /// Build this frame's view snapshot and enqueue it
    ///
    /// Flushes pending entity/asset notifications *before* the DRAW_VIEW
    /// command so the backend observes additions ahead of the draw that
    /// uses them. No-op while the scene is not ready.
    pub fn draw(&self, cmds: &RenderCmdSystem, target_size: (u32, u32), headless: bool) {
        if !self.is_ready() {
            return;
        }

        let mut inner = self.inner.lock().unwrap();
        let camera = inner
            .current_camera
            .clone()
            .unwrap_or_else(|| inner.default_camera.clone());

        let aspect = target_size.0 as f32 / target_size.1.max(1) as f32;
        let projection_matrix = camera.camera.projection_matrix(aspect);
        let view_matrix = camera.view_matrix;
        let frustum = Frustum::from_view_projection(&(projection_matrix * view_matrix));

        let mut surfaces = Vec::new();
        let mut visible_models = Vec::new();
        for instance in &inner.ref_models {
            let world_aabb = instance.model.aabb().transform(&instance.model_matrix);
            if !frustum.contains_aabb(&world_aabb) {
                continue;
            }
            visible_models.push(instance.clone());
            for mesh in &instance.model.meshes {
                if instance.model.meshes.len() != 1 {
                    let mesh_aabb = mesh.aabb().transform(&instance.model_matrix);
                    if !frustum.contains_aabb(&mesh_aabb) {
                        continue;
                    }
                }
                surfaces.push(DrawSurf {
                    mesh: mesh.clone(),
                    model_matrix: instance.model_matrix,
                    model_id: instance.id(),
                });
            }
        }

        let view_def = Box::new(ViewDef {
            scene: SceneData {
                models: inner.ref_models.clone(),
                lights: inner.ref_lights.clone(),
                cameras: inner.ref_cameras.clone(),
                materials: inner.materials.clone(),
                images: inner.images.clone(),
            },
            frustum,
            updates: std::mem::take(&mut inner.update_requests),
            projection_matrix,
            view_matrix,
            inv_projection_matrix: projection_matrix
                .try_inverse()
                .unwrap_or_else(nalgebra::Matrix4::identity),
            inv_view_matrix: view_matrix
                .try_inverse()
                .unwrap_or_else(nalgebra::Matrix4::identity),
            view_pos: camera.position,
            view_dir: camera.direction,
            frame_index: 0,
            headless,
            target_size,
            surfaces,
            models: visible_models,
            lights: inner.ref_lights.clone(),
        });

        for entity in inner.newly_added.drain(..) {
            cmds.add_entity_added_cmd(entity);
        }
        for entity in inner.newly_removed.drain(..) {
            cmds.add_entity_removed_cmd(entity);
        }
        for asset in inner.added_assets.drain(..) {
            cmds.add_asset_added_cmd(asset);
        }
        for asset in inner.removed_assets.drain(..) {
            cmds.add_asset_removed_cmd(asset);
        }

        cmds.add_draw_view_cmd(view_def);
    }
}
