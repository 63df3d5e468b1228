//! # Rendering System
//!
//! Core of the engine: a command-queue driven renderer with pluggable
//! backend implementations and hot-reloadable GPU pipelines.
//!
//! ## Architecture
//!
//! - **RenderCmdSystem**: thread-safe FIFO of render commands connecting
//!   producer threads (application, scripting, UI) to the render thread
//! - **RenderSystem**: top-level orchestrator owning scenes, frame
//!   statistics and the backend lifecycle
//! - **RenderBackend / RenderBackendImplementation**: the device owner and
//!   the pluggable rendering techniques it dispatches to
//! - **Pipeline**: front/back double-buffered pipeline state for hitless
//!   shader hot-reload
//!
//! Scene mutation is *described* as commands, never applied concurrently
//! with drawing; the single consumer serializes all structural changes
//! against frame boundaries.

pub mod api;
pub mod backends;
pub mod cmd;
pub mod export;
pub mod pipeline;
pub mod system;
pub mod view;

pub use api::{PipelineFactory, PipelineHandle, RenderBackend, RenderBackendImplementation};
pub use cmd::{CmdKind, RenderCmd, RenderCmdSystem};
pub use pipeline::{BlendMode, CullMode, Pipeline, PipelineDesc};
pub use system::{BackendRegistry, RenderConfig, RenderSystem};
pub use view::{DrawInfo, DrawSurf, DrawTarget, RenderInfo, ScreenshotInfo, UiConf, ViewDef};

use thiserror::Error;

/// Errors surfaced by backends and the render system
///
/// Draw-path failures are logged by the consumer and never cross the
/// command queue; only init/prepare/resource errors propagate as values.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer or backend initialization failed
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// GPU resource creation or management failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Backend-specific error in a generic wrapper
    #[error("Backend error: {0}")]
    BackendError(String),

    /// No render backend was registered before init
    #[error("No render backend registered")]
    NoBackend,

    /// A named backend implementation does not exist
    #[error("Backend implementation not found: {0}")]
    ImplementationNotFound(String),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;
