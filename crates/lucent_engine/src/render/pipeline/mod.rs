//! Pipeline state objects with hitless hot-reload
//!
//! A [`Pipeline`] keeps two native handles: "front", bound by recorded or
//! in-flight work, and "back", the slot a rebuild compiles into. A
//! rebuild never touches the front handle, so frames that already bound
//! it keep rendering with it; the swap happens at the next bind. Replaced
//! front handles move onto a retirement list instead of being destroyed —
//! the caller destroys them once a fence or idle point proves no GPU work
//! can still reference them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::api::{PipelineFactory, PipelineHandle};
use super::{BackendResult, RenderError};

/// Triangle face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CullMode {
    /// Draw both faces
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
}

/// Framebuffer blend behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlendMode {
    /// Overwrite the target
    #[default]
    Opaque,
    /// Alpha-blend over the target
    Alpha,
}

/// Everything a device needs to compile one pipeline object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDesc {
    /// Pipeline name for logs
    pub name: String,
    /// Shader program source; hot-reload swaps this and rebuilds
    pub shader_source: String,
    /// Face culling mode
    pub cull_mode: CullMode,
    /// Blend behavior
    pub blend: BlendMode,
    /// Splat size in pixels for point-based techniques
    pub point_size: u32,
}

impl PipelineDesc {
    /// Opaque back-face-culled pipeline around `shader_source`
    pub fn new(name: impl Into<String>, shader_source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader_source: shader_source.into(),
            cull_mode: CullMode::default(),
            blend: BlendMode::default(),
            point_size: 1,
        }
    }
}

/// Double-buffered pipeline state for one draw technique
///
/// The back-slot mutex is the rebuild guard: at most one rebuild is in
/// flight per instance, concurrent requests serialize on it. Rebuilds may
/// come from any thread (file watchers included); binding happens on the
/// render thread.
pub struct Pipeline {
    factory: Arc<dyn PipelineFactory>,
    desc: Mutex<PipelineDesc>,
    front: Mutex<Option<PipelineHandle>>,
    back: Mutex<Option<PipelineHandle>>,
    retired: Mutex<Vec<PipelineHandle>>,
}

impl Pipeline {
    /// Create an unbuilt pipeline; call [`finish`](Self::finish) before binding
    pub fn new(factory: Arc<dyn PipelineFactory>, desc: PipelineDesc) -> Self {
        Self {
            factory,
            desc: Mutex::new(desc),
            front: Mutex::new(None),
            back: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Build the initial front handle
    ///
    /// After a successful `finish` the front handle is never empty again
    /// until [`destroy`](Self::destroy).
    pub fn finish(&self) -> BackendResult<()> {
        let desc = self.desc.lock().unwrap().clone();
        let handle = self.factory.create_pipeline(&desc)?;
        *self.front.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Replace the build description; takes effect on the next rebuild
    pub fn set_desc(&self, desc: PipelineDesc) {
        *self.desc.lock().unwrap() = desc;
    }

    /// Current build description
    pub fn desc(&self) -> PipelineDesc {
        self.desc.lock().unwrap().clone()
    }

    /// Build a replacement pipeline into the back slot
    ///
    /// Blocks on the back-slot mutex while another rebuild is active. A
    /// back handle that was never promoted is stale — it was never bound,
    /// so it is destroyed synchronously and replaced. The front handle is
    /// not touched.
    pub fn rebuild_pipeline(&self) -> BackendResult<()> {
        let mut back = self.back.lock().unwrap();
        if let Some(stale) = back.take() {
            self.factory.destroy_pipeline(stale);
        }
        let desc = self.desc.lock().unwrap().clone();
        *back = Some(self.factory.create_pipeline(&desc)?);
        Ok(())
    }

    /// Handle to bind for the next draw, promoting a finished rebuild
    ///
    /// Try-locks the back slot; when a rebuilt handle is waiting there,
    /// the old front moves onto the retirement list and the new handle
    /// becomes front. If a rebuild still holds the lock, the current
    /// front stays bound — no stall.
    pub fn bind_front(&self) -> BackendResult<PipelineHandle> {
        if let Ok(mut back) = self.back.try_lock() {
            if let Some(new_front) = back.take() {
                let mut front = self.front.lock().unwrap();
                if let Some(old_front) = front.replace(new_front) {
                    self.retired.lock().unwrap().push(old_front);
                }
            }
        }
        let front = *self.front.lock().unwrap();
        front.ok_or_else(|| RenderError::RenderingFailed("pipeline bound before finish()".into()))
    }

    /// The front handle without promoting anything
    pub fn front_handle(&self) -> Option<PipelineHandle> {
        *self.front.lock().unwrap()
    }

    /// Handles waiting on the retirement list
    pub fn retired_count(&self) -> usize {
        self.retired.lock().unwrap().len()
    }

    /// Destroy all retired handles
    ///
    /// The caller must have proven that no in-flight work references
    /// them, e.g. by a device idle point or a frame fence.
    pub fn destroy_retired(&self) {
        for handle in self.retired.lock().unwrap().drain(..) {
            self.factory.destroy_pipeline(handle);
        }
    }

    /// Destroy front, back and all retired handles
    pub fn destroy(&self) {
        if let Some(front) = self.front.lock().unwrap().take() {
            self.factory.destroy_pipeline(front);
        }
        if let Some(back) = self.back.lock().unwrap().take() {
            self.factory.destroy_pipeline(back);
        }
        self.destroy_retired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    /// Factory recording creates and destroys against a live handle table
    struct CountingFactory {
        table: Mutex<SlotMap<PipelineHandle, PipelineDesc>>,
        destroyed: Mutex<Vec<PipelineHandle>>,
    }

    impl CountingFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                table: Mutex::new(SlotMap::with_key()),
                destroyed: Mutex::new(Vec::new()),
            })
        }

        fn live(&self) -> usize {
            self.table.lock().unwrap().len()
        }

        fn destroyed(&self) -> Vec<PipelineHandle> {
            self.destroyed.lock().unwrap().clone()
        }
    }

    impl PipelineFactory for CountingFactory {
        fn create_pipeline(&self, desc: &PipelineDesc) -> BackendResult<PipelineHandle> {
            Ok(self.table.lock().unwrap().insert(desc.clone()))
        }

        fn destroy_pipeline(&self, handle: PipelineHandle) {
            self.table.lock().unwrap().remove(handle);
            self.destroyed.lock().unwrap().push(handle);
        }
    }

    fn test_pipeline(factory: &Arc<CountingFactory>) -> Pipeline {
        Pipeline::new(factory.clone(), PipelineDesc::new("test", "flat"))
    }

    #[test]
    fn test_bind_before_finish_fails() {
        let factory = CountingFactory::new();
        let pipeline = test_pipeline(&factory);

        assert!(pipeline.bind_front().is_err());
    }

    #[test]
    fn test_rebuild_is_hitless() {
        let factory = CountingFactory::new();
        let pipeline = test_pipeline(&factory);
        pipeline.finish().unwrap();

        // Simulates in-flight work holding the bound handle
        let in_use = pipeline.bind_front().unwrap();

        pipeline.rebuild_pipeline().unwrap();

        // Rebuild must not invalidate or mutate the held front handle
        assert_eq!(pipeline.front_handle(), Some(in_use));
        assert!(!factory.destroyed().contains(&in_use));
        assert_eq!(pipeline.retired_count(), 0);

        // The next bind promotes the rebuilt handle and retires the old
        // front exactly once
        let promoted = pipeline.bind_front().unwrap();
        assert_ne!(promoted, in_use);
        assert_eq!(pipeline.retired_count(), 1);

        // Retired, not destroyed, until the caller proves the fence
        assert!(!factory.destroyed().contains(&in_use));
        pipeline.destroy_retired();
        assert_eq!(factory.destroyed(), vec![in_use]);
        assert_eq!(pipeline.retired_count(), 0);
    }

    #[test]
    fn test_unpromoted_back_is_replaced_synchronously() {
        let factory = CountingFactory::new();
        let pipeline = test_pipeline(&factory);
        pipeline.finish().unwrap();

        pipeline.rebuild_pipeline().unwrap();
        pipeline.rebuild_pipeline().unwrap();

        // First rebuilt handle was never bound, so it was destroyed in
        // place of going through retirement
        assert_eq!(factory.destroyed().len(), 1);
        assert_eq!(pipeline.retired_count(), 0);
        assert_eq!(factory.live(), 2); // front + fresh back
    }

    #[test]
    fn test_desc_swap_feeds_next_rebuild() {
        let factory = CountingFactory::new();
        let pipeline = test_pipeline(&factory);
        pipeline.finish().unwrap();

        pipeline.set_desc(PipelineDesc::new("test", "edited shader"));
        pipeline.rebuild_pipeline().unwrap();
        let promoted = pipeline.bind_front().unwrap();

        let table = factory.table.lock().unwrap();
        assert_eq!(table[promoted].shader_source, "edited shader");
    }

    #[test]
    fn test_destroy_releases_everything() {
        let factory = CountingFactory::new();
        let pipeline = test_pipeline(&factory);
        pipeline.finish().unwrap();
        pipeline.rebuild_pipeline().unwrap();
        pipeline.bind_front().unwrap();

        pipeline.destroy();
        assert_eq!(factory.live(), 0);
    }

    #[test]
    fn test_concurrent_rebuilds_serialize() {
        let factory = CountingFactory::new();
        let pipeline = Arc::new(test_pipeline(&factory));
        pipeline.finish().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                std::thread::spawn(move || pipeline.rebuild_pipeline().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Serialized rebuilds leave exactly one live back handle; the
        // other three were each destroyed as stale by a successor
        assert_eq!(factory.live(), 2); // front + last back
        assert_eq!(factory.destroyed().len(), 3);
    }
}
