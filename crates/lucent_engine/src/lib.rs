//! # Lucent Engine
//!
//! A real-time rendering engine built around a command-queue driven,
//! hot-reloadable backend architecture.
//!
//! ## Features
//!
//! - **Command Queue**: scene mutation and frame production on any
//!   thread, GPU submission on one render thread, strict FIFO in between
//! - **Pluggable Backends**: rendering techniques behind a single trait,
//!   switchable at runtime without restarting the scene
//! - **Hitless Hot-Reload**: double-buffered pipeline objects; shader
//!   edits rebuild in the background and swap in at the next bind
//! - **Headless Rendering**: the software backend renders and captures
//!   without any GPU or window system
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//! use lucent_engine::prelude::*;
//!
//! let settings = RendererSettings::default();
//! let mut registry = BackendRegistry::new();
//! registry.register(Box::new(SoftwareBackend::new(&settings)));
//!
//! let cmds = Arc::new(RenderCmdSystem::new());
//! let mut system = RenderSystem::new(registry, cmds.clone(), settings);
//! system.init()?;
//!
//! // producer side, every frame:
//! cmds.add_begin_frame_cmd();
//! system.main_scene().unwrap().draw(&cmds, (1280, 720), false);
//! cmds.add_end_frame_cmd();
//!
//! // render thread:
//! system.process_commands();
//! # Ok::<(), lucent_engine::render::RenderError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::{Config, RendererSettings};
    pub use crate::foundation::math::{Mat4, Mat4Ext, Transform, Vec3, Vec4};
    pub use crate::render::backends::SoftwareBackend;
    pub use crate::render::{
        BackendRegistry, BackendResult, CmdKind, Pipeline, PipelineDesc, RenderBackend,
        RenderBackendImplementation, RenderCmd, RenderCmdSystem, RenderConfig, RenderError,
        RenderSystem,
    };
    pub use crate::scene::{
        Camera, Light, LightKind, Material, Mesh, Model, RefCamera, RefLight, RefModel,
        RenderScene, SceneData, SceneRef, SpinAnimation, Vertex,
    };
}
