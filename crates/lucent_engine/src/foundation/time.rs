//! Frame timing utilities
//!
//! [`FrameClock`] produces the per-frame statistics published in
//! [`RenderConfig`](crate::render::RenderConfig): raw frametime plus a
//! smoothed frametime/framerate once its sample window has filled.

use std::time::Instant;

/// Number of frames in the smoothing window
pub const FPS_FRAMES: usize = 60;

/// Smoothed frame statistics for one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSample {
    /// Time since the previous tick, in milliseconds
    pub frametime: f32,
    /// Mean frametime over the last [`FPS_FRAMES`] ticks, 0 until the window fills
    pub frametime_smooth: f32,
    /// Frames per second derived from the smoothed frametime, 0 until the window fills
    pub framerate_smooth: f32,
}

/// Per-frame clock with a rolling smoothing window
pub struct FrameClock {
    previous: Option<Instant>,
    samples: [f32; FPS_FRAMES],
    index: usize,
    max_fps: Option<u32>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock with no framerate cap
    pub fn new() -> Self {
        Self {
            previous: None,
            samples: [0.0; FPS_FRAMES],
            index: 0,
            max_fps: None,
        }
    }

    /// Cap the framerate; `None` or 0 disables the cap
    pub fn set_max_fps(&mut self, max_fps: Option<u32>) {
        self.max_fps = max_fps.filter(|fps| *fps > 0);
    }

    /// Advance the clock by one frame and return the updated statistics
    ///
    /// When a cap is set, spins until the target frametime has elapsed
    /// before sampling.
    pub fn tick(&mut self) -> FrameSample {
        let mut now = Instant::now();

        if let (Some(previous), Some(max_fps)) = (self.previous, self.max_fps) {
            let target_ms = 1000.0 / max_fps as f32;
            while duration_ms(previous, now) < target_ms {
                std::hint::spin_loop();
                now = Instant::now();
            }
        }

        let frametime = match self.previous {
            Some(previous) => duration_ms(previous, now),
            None => 0.0,
        };
        self.previous = Some(now);

        self.samples[self.index % FPS_FRAMES] = frametime;
        self.index += 1;

        let mut sample = FrameSample {
            frametime,
            ..Default::default()
        };
        if self.index > FPS_FRAMES {
            let sum: f32 = self.samples.iter().sum();
            sample.frametime_smooth = sum / FPS_FRAMES as f32;
            if sample.frametime_smooth > 0.0 {
                sample.framerate_smooth = 1000.0 / sample.frametime_smooth;
            }
        }
        sample
    }
}

fn duration_ms(from: Instant, to: Instant) -> f32 {
    to.duration_since(from).as_secs_f32() * 1000.0
}
