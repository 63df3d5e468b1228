//! Render command queue
//!
//! [`RenderCmdSystem`] is the single hand-off point between the threads
//! that mutate scene state and the render thread that owns the GPU.
//! Producers describe work as [`RenderCmd`] records; the render thread
//! drains them in strict FIFO order once per loop iteration.
//!
//! Enqueue order is the contract: an ENTITY_ADDED issued before a
//! DRAW_VIEW is processed before it, no matter which threads produced
//! them. There is deliberately no priority or coalescing logic.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::scene::{Asset, SceneRef};

use super::view::{DrawInfo, ScreenshotInfo, UiConf, ViewDef};

/// One unit of render-thread work
///
/// Pointer-like payloads (`ViewDef`, `UiConf`, `ScreenshotInfo`,
/// `DrawInfo`) are owned by the command and dropped when it is deleted;
/// shared payloads (`SceneRef`, `Asset`) hold a counted reference that is
/// released the same way.
#[derive(Debug)]
pub enum RenderCmd {
    /// Sentinel returned when popping an empty queue
    Empty,
    /// Start of a frame; triggers statistics and `begin_frame`
    BeginFrame,
    /// End of a frame; triggers `end_frame`
    EndFrame,
    /// Render one view snapshot
    DrawView(Box<ViewDef>),
    /// Draw the UI layer
    DrawUi(Box<UiConf>),
    /// A scene instance appeared
    EntityAdded(SceneRef),
    /// A scene instance was removed
    EntityRemoved(SceneRef),
    /// An asset was registered
    AssetAdded(Asset),
    /// An asset was dropped
    AssetRemoved(Asset),
    /// Capture the swapchain into the carried buffer and export it
    Screenshot(Box<ScreenshotInfo>),
    /// Ask the active implementation for its own capture
    ImplScreenshot,
    /// Forward a paint stroke to the active implementation
    ImplDrawOnMesh(Box<DrawInfo>),
}

/// Payload-free tag of a [`RenderCmd`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmdKind {
    /// See [`RenderCmd::Empty`]
    Empty,
    /// See [`RenderCmd::BeginFrame`]
    BeginFrame,
    /// See [`RenderCmd::EndFrame`]
    EndFrame,
    /// See [`RenderCmd::DrawView`]
    DrawView,
    /// See [`RenderCmd::DrawUi`]
    DrawUi,
    /// See [`RenderCmd::EntityAdded`]
    EntityAdded,
    /// See [`RenderCmd::EntityRemoved`]
    EntityRemoved,
    /// See [`RenderCmd::AssetAdded`]
    AssetAdded,
    /// See [`RenderCmd::AssetRemoved`]
    AssetRemoved,
    /// See [`RenderCmd::Screenshot`]
    Screenshot,
    /// See [`RenderCmd::ImplScreenshot`]
    ImplScreenshot,
    /// See [`RenderCmd::ImplDrawOnMesh`]
    ImplDrawOnMesh,
}

impl RenderCmd {
    /// The command's tag, for dispatch and identity checks
    pub fn kind(&self) -> CmdKind {
        match self {
            Self::Empty => CmdKind::Empty,
            Self::BeginFrame => CmdKind::BeginFrame,
            Self::EndFrame => CmdKind::EndFrame,
            Self::DrawView(_) => CmdKind::DrawView,
            Self::DrawUi(_) => CmdKind::DrawUi,
            Self::EntityAdded(_) => CmdKind::EntityAdded,
            Self::EntityRemoved(_) => CmdKind::EntityRemoved,
            Self::AssetAdded(_) => CmdKind::AssetAdded,
            Self::AssetRemoved(_) => CmdKind::AssetRemoved,
            Self::Screenshot(_) => CmdKind::Screenshot,
            Self::ImplScreenshot => CmdKind::ImplScreenshot,
            Self::ImplDrawOnMesh(_) => CmdKind::ImplDrawOnMesh,
        }
    }
}

#[derive(Default)]
struct QueueState {
    list: VecDeque<RenderCmd>,
    // BEGIN_FRAME commands popped so far; wraps at u32::MAX
    frames: u32,
    // END_FRAME commands enqueued and not yet deleted
    pending_frames: u32,
}

/// Thread-safe FIFO of render commands
///
/// Any thread may enqueue; exactly one consumer (the render thread) pops.
/// A single mutex serializes every operation, which is what guarantees
/// cross-producer FIFO order. The frame counters share that mutex.
#[derive(Default)]
pub struct RenderCmdSystem {
    state: Mutex<QueueState>,
}

impl RenderCmdSystem {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn add_cmd(&self, cmd: RenderCmd) {
        self.state.lock().unwrap().list.push_back(cmd);
    }

    /// Enqueue the start of a frame
    pub fn add_begin_frame_cmd(&self) {
        self.add_cmd(RenderCmd::BeginFrame);
    }

    /// Enqueue the end of a frame
    pub fn add_end_frame_cmd(&self) {
        let mut state = self.state.lock().unwrap();
        state.list.push_back(RenderCmd::EndFrame);
        state.pending_frames += 1;
    }

    /// Enqueue a view snapshot for drawing
    pub fn add_draw_view_cmd(&self, view_def: Box<ViewDef>) {
        self.add_cmd(RenderCmd::DrawView(view_def));
    }

    /// Enqueue a UI pass
    pub fn add_draw_ui_cmd(&self, ui_conf: Box<UiConf>) {
        self.add_cmd(RenderCmd::DrawUi(ui_conf));
    }

    /// Enqueue a swapchain capture to be written to `file_name`
    pub fn add_screenshot_cmd(&self, file_name: impl Into<String>) {
        self.add_cmd(RenderCmd::Screenshot(Box::new(ScreenshotInfo::named(
            file_name,
        ))));
    }

    /// Enqueue an implementation-side screenshot
    pub fn add_impl_screenshot_cmd(&self) {
        self.add_cmd(RenderCmd::ImplScreenshot);
    }

    /// Announce a new scene instance to the backend
    pub fn add_entity_added_cmd(&self, entity: SceneRef) {
        self.add_cmd(RenderCmd::EntityAdded(entity));
    }

    /// Announce a removed scene instance to the backend
    pub fn add_entity_removed_cmd(&self, entity: SceneRef) {
        self.add_cmd(RenderCmd::EntityRemoved(entity));
    }

    /// Announce a registered asset
    pub fn add_asset_added_cmd(&self, asset: Asset) {
        self.add_cmd(RenderCmd::AssetAdded(asset));
    }

    /// Announce a dropped asset
    pub fn add_asset_removed_cmd(&self, asset: Asset) {
        self.add_cmd(RenderCmd::AssetRemoved(asset));
    }

    /// Forward a paint stroke to the active implementation
    pub fn add_draw_on_mesh_cmd(&self, draw_info: &DrawInfo) {
        self.add_cmd(RenderCmd::ImplDrawOnMesh(Box::new(draw_info.clone())));
    }

    /// Whether at least one command is queued, without removing it
    ///
    /// Non-blocking poll; the render thread calls this every loop
    /// iteration instead of waiting on the queue.
    pub fn next_cmd(&self) -> bool {
        !self.state.lock().unwrap().list.is_empty()
    }

    /// Remove and return the oldest command
    ///
    /// Returns [`RenderCmd::Empty`] when the queue is empty; callers are
    /// expected to gate on [`next_cmd`](Self::next_cmd) first. Popping a
    /// BEGIN_FRAME advances [`frames`](Self::frames).
    pub fn pop_next_cmd(&self) -> RenderCmd {
        let mut state = self.state.lock().unwrap();
        match state.list.pop_front() {
            Some(cmd) => {
                if matches!(cmd, RenderCmd::BeginFrame) {
                    state.frames = state.frames.wrapping_add(1);
                }
                cmd
            }
            None => RenderCmd::Empty,
        }
    }

    /// Release a popped command and any resources its payload owns
    ///
    /// Must be called exactly once per popped command after the consumer
    /// is done with it.
    pub fn delete_cmd(&self, cmd: RenderCmd) {
        if matches!(cmd, RenderCmd::EndFrame) {
            let mut state = self.state.lock().unwrap();
            state.pending_frames = state.pending_frames.saturating_sub(1);
        }
        drop(cmd);
    }

    /// Count of BEGIN_FRAME commands popped so far
    ///
    /// Monotonic; wraps only at integer overflow.
    pub fn frames(&self) -> u32 {
        self.state.lock().unwrap().frames
    }

    /// Whole frames currently buffered ahead of the consumer
    ///
    /// Producers throttle on this to keep at most one frame in flight.
    pub fn pending_frames(&self) -> u32 {
        self.state.lock().unwrap().pending_frames
    }
}
