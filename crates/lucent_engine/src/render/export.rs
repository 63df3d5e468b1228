//! Screenshot export
//!
//! Writes the pixel buffer a backend captured into [`ScreenshotInfo`]
//! out as a PNG file. Export failures are reported to the caller, which
//! logs them and moves on — a failed screenshot never stops the frame.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb, Rgba};
use thiserror::Error;

use super::view::ScreenshotInfo;

/// Screenshot export errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// Capture buffer is empty or inconsistent with its dimensions
    #[error("Capture buffer does not match {0}x{1}x{2}")]
    InvalidCapture(u32, u32, u32),

    /// Channel count this exporter cannot encode
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u32),

    /// PNG encode or file write failure
    #[error("PNG write failed: {0}")]
    Write(#[from] image::ImageError),
}

/// Write `info` as `<dir>/<name>.png`
///
/// A `.png` extension is appended when the name has none. Supports 3
/// (RGB) and 4 (RGBA) channel captures.
pub fn save_png(info: &ScreenshotInfo, dir: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
    let expected = info.width as usize * info.height as usize * info.channels as usize;
    if expected == 0 || info.data.len() != expected {
        return Err(ExportError::InvalidCapture(
            info.width,
            info.height,
            info.channels,
        ));
    }

    let mut path = dir.as_ref().join(&info.name);
    if path.extension().is_none() {
        path.set_extension("png");
    }

    match info.channels {
        3 => {
            let buffer: ImageBuffer<Rgb<u8>, _> =
                ImageBuffer::from_raw(info.width, info.height, info.data.clone())
                    .ok_or(ExportError::InvalidCapture(info.width, info.height, 3))?;
            buffer.save(&path)?;
        }
        4 => {
            let buffer: ImageBuffer<Rgba<u8>, _> =
                ImageBuffer::from_raw(info.width, info.height, info.data.clone())
                    .ok_or(ExportError::InvalidCapture(info.width, info.height, 4))?;
            buffer.save(&path)?;
        }
        channels => return Err(ExportError::UnsupportedChannels(channels)),
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(width: u32, height: u32, channels: u32) -> ScreenshotInfo {
        ScreenshotInfo {
            name: String::from("capture"),
            width,
            height,
            channels,
            data: vec![128; (width * height * channels) as usize],
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lucent_export_{tag}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_save_rgba_png() {
        let path = save_png(&capture(8, 8, 4), temp_dir("rgba")).unwrap();

        assert_eq!(path.extension().unwrap(), "png");
        assert!(path.is_file());
    }

    #[test]
    fn test_empty_capture_rejected() {
        let info = ScreenshotInfo::named("never_filled");
        assert!(matches!(
            save_png(&info, temp_dir("empty")),
            Err(ExportError::InvalidCapture(..))
        ));
    }

    #[test]
    fn test_unsupported_channels_rejected() {
        assert!(matches!(
            save_png(&capture(4, 4, 2), temp_dir("chan")),
            Err(ExportError::UnsupportedChannels(2))
        ));
    }
}
