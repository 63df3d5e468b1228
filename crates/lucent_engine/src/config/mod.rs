//! Configuration system
//!
//! Settings files are TOML or RON, picked by extension. The renderer reads
//! [`RendererSettings`] once at startup; there is no hidden global state.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Loadable/savable configuration backed by serde
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = match extension(path) {
            Some(ext @ ("toml" | "ron")) => ext,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if format == "toml" {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Startup settings for the render system
///
/// `backend` and `implementation` select by name from whatever was
/// registered; unset or unknown names fall back to the first candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Render backend to select at init, by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Backend implementation to select after init, by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    /// Render target size when no surface callback has resized it
    pub render_size: [u32; 2],
    /// Run without a presentation surface
    pub headless: bool,
    /// Optional framerate cap for the render thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fps: Option<u32>,
    /// Directory screenshot files are written to
    pub screenshot_dir: String,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            backend: None,
            implementation: None,
            render_size: [1280, 720],
            headless: false,
            max_fps: None,
            screenshot_dir: String::from("."),
        }
    }
}

impl Config for RendererSettings {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RendererSettings::default();

        assert!(settings.backend.is_none());
        assert_eq!(settings.render_size, [1280, 720]);
        assert!(!settings.headless);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = std::env::temp_dir().join("lucent_config_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("renderer.toml");

        let mut settings = RendererSettings::default();
        settings.backend = Some("software".to_string());
        settings.max_fps = Some(120);
        settings.save_to_file(&path).unwrap();

        let loaded = RendererSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.backend.as_deref(), Some("software"));
        assert_eq!(loaded.max_fps, Some(120));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = RendererSettings::load_from_file("renderer.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
