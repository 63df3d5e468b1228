//! CPU render device
//!
//! Owns the framebuffer and the table of live pipeline objects. Pipeline
//! handles handed out here are the opaque currency of the
//! [`Pipeline`](crate::render::Pipeline) double buffer; the generational
//! slotmap keys make a destroyed handle detectable instead of silently
//! aliasing a new one.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use slotmap::SlotMap;

use crate::render::api::{PipelineFactory, PipelineHandle};
use crate::render::pipeline::{BlendMode, PipelineDesc};
use crate::render::view::ScreenshotInfo;
use crate::render::{BackendResult, RenderError};

/// RGBA8 render target
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0, 255]; (width * height) as usize],
        }
    }

    /// Fill every pixel with `color`
    pub fn clear(&mut self, color: [u8; 4]) {
        self.pixels.fill(color);
    }

    /// Write a square splat centered on `(x, y)`; out-of-bounds pixels
    /// are clipped
    pub fn splat(&mut self, x: i32, y: i32, size: u32, color: [u8; 4], blend: BlendMode) {
        let half = (size / 2) as i32;
        for py in (y - half)..=(y + half) {
            for px in (x - half)..=(x + half) {
                if px < 0 || py < 0 || px >= self.width as i32 || py >= self.height as i32 {
                    continue;
                }
                let index = (py as u32 * self.width + px as u32) as usize;
                match blend {
                    BlendMode::Opaque => self.pixels[index] = color,
                    BlendMode::Alpha => {
                        let dst = self.pixels[index];
                        let a = color[3] as u32;
                        let mut out = [0u8; 4];
                        for c in 0..3 {
                            out[c] =
                                ((color[c] as u32 * a + dst[c] as u32 * (255 - a)) / 255) as u8;
                        }
                        out[3] = 255;
                        self.pixels[index] = out;
                    }
                }
            }
        }
    }

    /// Pixel at `(x, y)`, if in bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }
}

/// CPU device: framebuffer plus the live pipeline-object table
///
/// Work "submitted" here completes synchronously, so
/// [`wait_idle`](Self::wait_idle) is a trivially satisfied fence — it is
/// still the documented point callers must pass before destroying
/// retired pipeline handles.
pub struct SoftwareDevice {
    framebuffer: Mutex<Framebuffer>,
    pipelines: Mutex<SlotMap<PipelineHandle, PipelineDesc>>,
    frames_presented: AtomicU32,
}

impl SoftwareDevice {
    /// Create a device with a `width` x `height` framebuffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: Mutex::new(Framebuffer::new(width.max(1), height.max(1))),
            pipelines: Mutex::new(SlotMap::with_key()),
            frames_presented: AtomicU32::new(0),
        }
    }

    /// Current framebuffer size in pixels
    pub fn size(&self) -> (u32, u32) {
        let fb = self.framebuffer.lock().unwrap();
        (fb.width, fb.height)
    }

    /// Replace the framebuffer with a fresh one of the new size
    pub fn resize(&self, width: u32, height: u32) {
        let mut fb = self.framebuffer.lock().unwrap();
        *fb = Framebuffer::new(width.max(1), height.max(1));
    }

    /// Run `f` against the framebuffer under the device lock
    pub fn with_framebuffer<R>(&self, f: impl FnOnce(&mut Framebuffer) -> R) -> R {
        f(&mut self.framebuffer.lock().unwrap())
    }

    /// Validate `handle` and return the pipeline state it was built from
    pub fn bind_pipeline(&self, handle: PipelineHandle) -> BackendResult<PipelineDesc> {
        self.pipelines
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| RenderError::RenderingFailed("bound a destroyed pipeline".into()))
    }

    /// Fence point: returns once no device work is outstanding
    pub fn wait_idle(&self) {
        // CPU submission is synchronous; nothing to wait on.
    }

    /// Present the frame
    pub fn present(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames presented since creation
    pub fn frames_presented(&self) -> u32 {
        self.frames_presented.load(Ordering::Relaxed)
    }

    /// Copy the framebuffer into a screenshot buffer
    pub fn capture(&self, info: &mut ScreenshotInfo) {
        let fb = self.framebuffer.lock().unwrap();
        info.width = fb.width;
        info.height = fb.height;
        info.channels = 4;
        info.data = bytemuck::cast_slice(&fb.pixels).to_vec();
    }

    /// Live pipeline objects, for leak checks
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }
}

impl PipelineFactory for SoftwareDevice {
    fn create_pipeline(&self, desc: &PipelineDesc) -> BackendResult<PipelineHandle> {
        if desc.shader_source.trim().is_empty() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "pipeline '{}' has no shader source",
                desc.name
            )));
        }
        if desc.point_size == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "pipeline '{}' has zero point size",
                desc.name
            )));
        }
        let handle = self.pipelines.lock().unwrap().insert(desc.clone());
        log::debug!("Created pipeline '{}'", desc.name);
        Ok(handle)
    }

    fn destroy_pipeline(&self, handle: PipelineHandle) {
        if self.pipelines.lock().unwrap().remove(handle).is_none() {
            log::warn!("Destroyed an unknown pipeline handle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rejects_empty_shader() {
        let device = SoftwareDevice::new(16, 16);
        let desc = PipelineDesc::new("broken", "   ");

        assert!(device.create_pipeline(&desc).is_err());
        assert_eq!(device.pipeline_count(), 0);
    }

    #[test]
    fn test_bind_destroyed_pipeline_fails() {
        let device = SoftwareDevice::new(16, 16);
        let handle = device
            .create_pipeline(&PipelineDesc::new("flat", "flat_v1"))
            .unwrap();

        assert!(device.bind_pipeline(handle).is_ok());
        device.destroy_pipeline(handle);
        assert!(device.bind_pipeline(handle).is_err());
    }

    #[test]
    fn test_capture_matches_framebuffer() {
        let device = SoftwareDevice::new(8, 4);
        device.with_framebuffer(|fb| fb.clear([10, 20, 30, 255]));

        let mut info = ScreenshotInfo::named("cap");
        device.capture(&mut info);

        assert_eq!((info.width, info.height, info.channels), (8, 4, 4));
        assert_eq!(info.data.len(), 8 * 4 * 4);
        assert_eq!(&info.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_splat_clips_at_bounds() {
        let device = SoftwareDevice::new(4, 4);
        device.with_framebuffer(|fb| {
            fb.clear([0, 0, 0, 255]);
            fb.splat(0, 0, 3, [255, 0, 0, 255], BlendMode::Opaque);
            assert_eq!(fb.pixel(0, 0), Some([255, 0, 0, 255]));
            assert_eq!(fb.pixel(1, 1), Some([255, 0, 0, 255]));
            assert_eq!(fb.pixel(2, 2), Some([0, 0, 0, 255]));
        });
    }
}
