//! Controller settings: purge throttling, history retention and export defaults.
//!
//! Settings deserialize from YAML or JSON; every field has a default so a
//! partial file only overrides what it names.

use std::path::Path;

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::error::PlotResult;

// ─────────────────────────────────────────────────────────────────────────────
// ControllerSettings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Minimum wall-clock time between two tick-driven purges.
    pub purge_interval_ms: u64,
    /// History kept before the visible range on tick purges, in window widths.
    pub retention_windows: f64,
    /// RGBA background the exported image is flattened onto.
    pub export_background: [u8; 4],
    pub jpg_file_name: String,
    pub png_file_name: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            purge_interval_ms: 1000,
            retention_windows: 1.0,
            export_background: [255, 255, 255, 255],
            jpg_file_name: "plot.jpg".to_string(),
            png_file_name: "plot.png".to_string(),
        }
    }
}

impl ControllerSettings {
    pub fn from_yaml_str(s: &str) -> PlotResult<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> PlotResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a `.json` file, anything else is read as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> PlotResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    /// Purge interval as signed milliseconds, clamped to `i64::MAX`.
    pub fn purge_interval_ms_i64(&self) -> i64 {
        i64::try_from(self.purge_interval_ms).unwrap_or(i64::MAX)
    }

    pub fn background_color(&self) -> Color32 {
        let [r, g, b, a] = self.export_background;
        Color32::from_rgba_unmultiplied(r, g, b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let s = ControllerSettings::from_yaml_str("purge_interval_ms: 250\n").unwrap();
        assert_eq!(s.purge_interval_ms, 250);
        assert_eq!(s.retention_windows, 1.0);
        assert_eq!(s.png_file_name, "plot.png");
    }

    #[test]
    fn json_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"jpg_file_name": "view.jpg", "retention_windows": 2.0}"#).unwrap();
        let s = ControllerSettings::load(&path).unwrap();
        assert_eq!(s.jpg_file_name, "view.jpg");
        assert_eq!(s.retention_windows, 2.0);
        assert_eq!(s.purge_interval_ms, 1000);
    }

    #[test]
    fn huge_purge_interval_is_clamped() {
        let s = ControllerSettings::from_yaml_str("purge_interval_ms: 18446744073709551615\n").unwrap();
        assert_eq!(s.purge_interval_ms, u64::MAX);
        assert_eq!(s.purge_interval_ms_i64(), i64::MAX);

        let s = ControllerSettings::from_yaml_str("purge_interval_ms: 9223372036854775807\n").unwrap();
        assert_eq!(s.purge_interval_ms_i64(), i64::MAX);
        assert_eq!(ControllerSettings::default().purge_interval_ms_i64(), 1000);
    }

    #[test]
    fn default_background_is_white() {
        assert_eq!(ControllerSettings::default().background_color(), Color32::WHITE);
    }
}
