//! Viewer configuration

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Resource and presentation configuration for the viewer
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Vertical gap between pages in pixels (default: 8)
    pub page_spacing: u32,
    /// Maximum number of cached page bitmaps (default: 64)
    pub cache_max_entries: usize,
    /// Maximum total bytes of cached bitmaps (default: 256MB)
    pub cache_max_bytes: usize,
    /// Draw annotations when rendering (default: true)
    pub render_annotations: bool,
    /// Draw form field contents when rendering (default: true)
    pub render_form_data: bool,
    /// Name of the thread that owns the document handle
    pub worker_thread_name: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_spacing: 8,
            cache_max_entries: 64,
            cache_max_bytes: 256 * 1024 * 1024, // 256MB
            render_annotations: true,
            render_form_data: true,
            worker_thread_name: "pdf-render".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_max_entries == 0 {
            return Err(Error::InvalidConfig {
                reason: "cache_max_entries must be at least 1".to_string(),
            });
        }
        if self.worker_thread_name.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "worker_thread_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_spacing, 8);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ViewerConfig::from_json_str(r#"{"page_spacing": 16}"#).unwrap();
        assert_eq!(config.page_spacing, 16);
        assert_eq!(config.cache_max_entries, 64);
        assert!(config.render_annotations);
    }

    #[test]
    fn test_zero_cache_entries_rejected() {
        let result = ViewerConfig::from_json_str(r#"{"cache_max_entries": 0}"#);
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = ViewerConfig::from_json_str("{page_spacing:");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
