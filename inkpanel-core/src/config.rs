//! Read-only access to the device configuration.
//!
//! The configuration document is owned by an outside collaborator (the web
//! front end edits and persists it). This crate only reads it, once per render,
//! through the [`DeviceConfig`] trait.

use crate::error::DisplayError;
use crate::refresh::ContentSourceId;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Panel resolution used when the configuration has none (or a malformed one).
pub const DEFAULT_RESOLUTION: (u32, u32) = (800, 480);

/// Display type used when the configuration does not name one.
pub const DEFAULT_DISPLAY_TYPE: &str = "inky";

/// Where the last displayed frame is cached unless configured otherwise.
pub const DEFAULT_CACHE_FILE: &str = "static/images/current_image.png";

// =============================================================================
// Settings Types
// =============================================================================

/// Panel orientation.
///
/// Panels are natively landscape; [`Orientation::Vertical`] content is rotated
/// onto the panel before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Native landscape orientation.
    #[default]
    Horizontal,
    /// Portrait content on a landscape panel.
    Vertical,
}

/// Enhancement factors applied as the last pipeline stage.
///
/// Each factor is multiplicative: `1.0` leaves the image unchanged, `0.0`
/// yields the fully degenerate image (black, flat grey, greyscale, blurred).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Brightness factor.
    pub brightness: f32,
    /// Contrast factor.
    pub contrast: f32,
    /// Colour saturation factor.
    pub saturation: f32,
    /// Sharpness factor.
    pub sharpness: f32,
}

impl ImageSettings {
    /// Whether applying these settings would leave any image unchanged.
    pub fn is_identity(&self) -> bool {
        [self.brightness, self.contrast, self.saturation, self.sharpness]
            .iter()
            .all(|f| (f - 1.0).abs() < f32::EPSILON)
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpness: 1.0,
        }
    }
}

/// The geometry half of the configuration snapshot consumed by a render.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplaySettings {
    /// Configured orientation.
    pub orientation: Orientation,
    /// Rotate the final frame by 180°.
    pub inverted: bool,
    /// Panel resolution as `(width, height)`.
    pub resolution: (u32, u32),
}

/// Metadata about the most recent background refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RefreshInfo {
    /// When the refresh happened, as written by the scheduler.
    pub refresh_time: Option<String>,
    /// Hash of the image that was produced.
    pub image_hash: Option<String>,
    /// Id of the content source that produced the current image.
    pub plugin_id: Option<String>,
    /// Name of the content source instance, for playlist refreshes.
    pub plugin_instance: Option<String>,
}

impl RefreshInfo {
    /// The content source currently on the panel, if known.
    pub fn active_source(&self) -> Option<ContentSourceId> {
        self.plugin_id.as_deref().map(ContentSourceId::new)
    }
}

// =============================================================================
// DeviceConfig Trait
// =============================================================================

/// Read-only view of the device configuration.
///
/// Only [`get_config`](DeviceConfig::get_config) is required; every typed
/// accessor is derived from it so implementations stay trivial.
pub trait DeviceConfig: Send + Sync {
    /// Look up a raw configuration value.
    fn get_config(&self, key: &str) -> Option<Value>;

    /// Panel resolution as `(width, height)`.
    ///
    /// Falls back to [`DEFAULT_RESOLUTION`] when absent or malformed.
    fn resolution(&self) -> (u32, u32) {
        self.get_config("resolution")
            .and_then(|v| serde_json::from_value::<(u32, u32)>(v).ok())
            .filter(|&(w, h)| w > 0 && h > 0)
            .unwrap_or(DEFAULT_RESOLUTION)
    }

    /// Metadata about the most recent refresh.
    fn refresh_info(&self) -> RefreshInfo {
        match self.get_config("refresh_info") {
            Some(Value::Null) | None => RefreshInfo::default(),
            Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                warn!("ignoring malformed refresh_info: {}", e);
                RefreshInfo::default()
            }),
        }
    }

    /// Load a secret (API key) from the process environment.
    fn load_secret(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    /// Orientation, inversion and resolution for the next render.
    fn display_settings(&self) -> DisplaySettings {
        let orientation = self
            .get_config("orientation")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        DisplaySettings {
            orientation,
            inverted: self.config_bool("inverted_image", false),
            resolution: self.resolution(),
        }
    }

    /// The `image_settings` block, or identity settings if absent.
    fn image_settings(&self) -> ImageSettings {
        match self.get_config("image_settings") {
            Some(Value::Null) | None => ImageSettings::default(),
            Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                warn!("ignoring malformed image_settings: {}", e);
                ImageSettings::default()
            }),
        }
    }

    /// The configured display type identifier.
    fn display_type(&self) -> String {
        self.config_string("display_type")
            .unwrap_or_else(|| DEFAULT_DISPLAY_TYPE.to_string())
    }

    /// Path of the cached-frame artifact.
    fn current_image_file(&self) -> PathBuf {
        self.config_string("current_image_file")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE))
    }

    /// A boolean flag, `default` if absent or not a boolean.
    fn config_bool(&self, key: &str, default: bool) -> bool {
        self.get_config(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// An unsigned integer, `default` if absent or not an integer.
    fn config_u64(&self, key: &str, default: u64) -> u64 {
        self.get_config(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(default)
    }

    /// A string value, if present.
    fn config_string(&self, key: &str) -> Option<String> {
        self.get_config(key)
            .and_then(|v| v.as_str().map(str::to_owned))
    }
}

// =============================================================================
// JsonConfig
// =============================================================================

/// A [`DeviceConfig`] backed by a JSON document.
///
/// The document is read at construction and again on [`reload`](JsonConfig::reload).
/// Nothing is ever written back to disk.
#[derive(Debug)]
pub struct JsonConfig {
    path: Option<PathBuf>,
    values: RwLock<Map<String, Value>>,
}

impl JsonConfig {
    /// Load the configuration document at `path`.
    ///
    /// # Errors
    ///
    /// - [`DisplayError::Io`] if the file cannot be read
    /// - [`DisplayError::Config`] if it is not a JSON object
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DisplayError> {
        let path = path.as_ref();
        let values = read_document(path)?;
        debug!("loaded device config from {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            values: RwLock::new(values),
        })
    }

    /// Build an in-memory configuration. Non-object values yield an empty one.
    pub fn from_value(value: Value) -> Self {
        let values = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            path: None,
            values: RwLock::new(values),
        }
    }

    /// Re-read the backing file so external edits reach the next render.
    ///
    /// In-memory configurations are left untouched.
    pub fn reload(&self) -> Result<(), DisplayError> {
        if let Some(path) = &self.path {
            let fresh = read_document(path)?;
            *self.values.write().unwrap_or_else(PoisonError::into_inner) = fresh;
            debug!("reloaded device config from {}", path.display());
        }
        Ok(())
    }

    /// Override a value in memory. The change is never persisted.
    pub fn set_value(&self, key: &str, value: Value) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

impl DeviceConfig for JsonConfig {
    fn get_config(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

fn read_document(path: &Path) -> Result<Map<String, Value>, DisplayError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolution_defaults_when_missing_or_malformed() {
        let config = JsonConfig::from_value(json!({}));
        assert_eq!(config.resolution(), DEFAULT_RESOLUTION);

        config.set_value("resolution", json!("800x480"));
        assert_eq!(config.resolution(), DEFAULT_RESOLUTION);

        config.set_value("resolution", json!([0, 480]));
        assert_eq!(config.resolution(), DEFAULT_RESOLUTION);

        config.set_value("resolution", json!([640, 400]));
        assert_eq!(config.resolution(), (640, 400));
    }

    #[test]
    fn test_display_settings_from_document() {
        let config = JsonConfig::from_value(json!({
            "orientation": "vertical",
            "inverted_image": true,
            "resolution": [600, 448],
        }));
        let settings = config.display_settings();
        assert_eq!(settings.orientation, Orientation::Vertical);
        assert!(settings.inverted);
        assert_eq!(settings.resolution, (600, 448));
    }

    #[test]
    fn test_image_settings_partial_block_keeps_identity_for_missing_keys() {
        let config = JsonConfig::from_value(json!({
            "image_settings": { "contrast": 1.5 }
        }));
        let settings = config.image_settings();
        assert_eq!(settings.contrast, 1.5);
        assert_eq!(settings.brightness, 1.0);
        assert!(!settings.is_identity());
        assert!(ImageSettings::default().is_identity());
    }

    #[test]
    fn test_refresh_info_active_source() {
        let config = JsonConfig::from_value(json!({
            "refresh_info": { "plugin_id": "ai_text", "refresh_time": "2024-05-01T10:00:00" }
        }));
        let info = config.refresh_info();
        assert_eq!(info.active_source(), Some(ContentSourceId::new("ai_text")));

        config.set_value("refresh_info", Value::Null);
        assert_eq!(config.refresh_info().active_source(), None);
    }

    #[test]
    fn test_load_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, r#"{"display_type": "mock"}"#).unwrap();

        let config = JsonConfig::load(&path).unwrap();
        assert_eq!(config.display_type(), "mock");

        fs::write(&path, r#"{"display_type": "epd7in5_V2"}"#).unwrap();
        config.reload().unwrap();
        assert_eq!(config.display_type(), "epd7in5_V2");
    }

    #[test]
    fn test_load_rejects_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            JsonConfig::load(&path),
            Err(DisplayError::Config(_))
        ));
    }
}
