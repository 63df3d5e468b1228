//! Render backend implementations
//!
//! One backend ships today: the CPU software backend. Additional device
//! owners (a GPU-API backend, a remote renderer) slot in beside it by
//! implementing [`RenderBackend`](super::api::RenderBackend) and
//! registering with the [`BackendRegistry`](super::BackendRegistry).

pub mod software;

pub use software::SoftwareBackend;
