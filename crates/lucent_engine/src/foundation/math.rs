//! Math types and helpers for the renderer
//!
//! Thin aliases over nalgebra plus the few camera/transform helpers the
//! scene layer needs.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Position, rotation and scale of a scene instance
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,
    /// Rotation quaternion
    pub rotation: Quat,
    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Transform with only a position set
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Collapse into a model matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * constants::DEG_TO_RAD
}

/// Extension trait for `Mat4` camera matrices
pub trait Mat4Ext {
    /// Perspective projection with depth mapped to `[0, 1]`
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Look-at view matrix; view space looks down +Z, matching the
    /// `[0, 1]`-depth projection above
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = up.cross(&forward).normalize();
        let camera_up = forward.cross(&right);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            forward.x, forward.y, forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_transform_identity() {
        let transform = Transform::identity();

        assert_eq!(transform.position, Vec3::zeros());
        assert_relative_eq!(transform.rotation, Quat::identity(), epsilon = EPSILON);
        assert_eq!(transform.to_matrix(), Mat4::identity());
    }

    #[test]
    fn test_transform_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let point = transform.to_matrix().transform_point(&Point3::origin());

        assert_relative_eq!(point.x, 1.0, epsilon = EPSILON);
        assert_relative_eq!(point.y, 2.0, epsilon = EPSILON);
        assert_relative_eq!(point.z, 3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_centers_target() {
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let target_vs = view.transform_point(&Point3::origin());

        // Target lies straight ahead, 5 units down the +Z view axis
        assert_relative_eq!(target_vs.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(target_vs.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(target_vs.z, 5.0, epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = Mat4::perspective(deg_to_rad(60.0), 1.0, 0.1, 100.0);

        let near = proj * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, 100.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-4);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-4);
    }
}
