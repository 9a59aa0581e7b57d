//! Plot configuration persistence: save and load to/from JSON or YAML.
//!
//! A configuration holds live series (with their telemetry sources) behind
//! locks, so it is stored through serializable mirror types. Restoring needs
//! a factory that provides a source for each saved series.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::configuration::{ObjectDescriptor, PlotConfiguration, XAxis};
use crate::data::series::{PlotSeries, SeriesId, TelemetrySource};
use crate::error::PlotResult;
use crate::events::lock;

// ---------- Serializable mirror types ----------

/// Serializable version of XAxis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XAxisSerde {
    pub key: String,
    pub range: Option<[f64; 2]>,
    pub display_range: Option<[f64; 2]>,
}

impl From<&XAxis> for XAxisSerde {
    fn from(a: &XAxis) -> Self {
        Self {
            key: a.key.clone(),
            range: a.range.map(Into::into),
            display_range: a.display_range.map(Into::into),
        }
    }
}

impl XAxisSerde {
    /// Apply stored settings to an XAxis instance.
    pub fn apply_to(self, a: &mut XAxis) {
        a.key = self.key;
        a.range = self.range.map(Into::into);
        a.display_range = self.display_range.map(Into::into);
    }
}

/// Serializable series entry. Records are not stored; they are reloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSerde {
    pub name: String,
    pub y_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfigurationSerde {
    pub id: String,
    pub object: ObjectDescriptor,
    pub x_axis: XAxisSerde,
    #[serde(default)]
    pub series: Vec<SeriesSerde>,
}

impl From<&PlotConfiguration> for PlotConfigurationSerde {
    fn from(c: &PlotConfiguration) -> Self {
        Self {
            id: c.id().to_string(),
            object: c.object().clone(),
            x_axis: XAxisSerde::from(&c.x_axis),
            series: c
                .series()
                .iter()
                .map(|s| {
                    let s = lock(s);
                    SeriesSerde {
                        name: s.name().to_string(),
                        y_key: s.y_key().to_string(),
                    }
                })
                .collect(),
        }
    }
}

impl PlotConfigurationSerde {
    /// Restore x-axis state into `config` and append the saved series, each
    /// backed by the source `source_for` returns. Returns the new series ids.
    pub fn apply_to<F>(self, config: &mut PlotConfiguration, mut source_for: F) -> Vec<SeriesId>
    where
        F: FnMut(&SeriesSerde) -> Box<dyn TelemetrySource>,
    {
        self.x_axis.apply_to(&mut config.x_axis);
        self.series
            .iter()
            .map(|entry| {
                let series = PlotSeries::new(&entry.name, &entry.y_key, source_for(entry));
                config.series_mut().add(series.into_shared())
            })
            .collect()
    }

    /// Build a fresh configuration from the saved state.
    pub fn into_configuration<F>(self, source_for: F) -> PlotConfiguration
    where
        F: FnMut(&SeriesSerde) -> Box<dyn TelemetrySource>,
    {
        let mut config = PlotConfiguration::new(self.id.clone(), self.object.clone());
        self.apply_to(&mut config, source_for);
        config
    }
}

// ---------- File helpers ----------

pub fn config_to_json(state: &PlotConfigurationSerde) -> PlotResult<String> {
    Ok(serde_json::to_string_pretty(state)?)
}

pub fn config_from_json(json: &str) -> PlotResult<PlotConfigurationSerde> {
    Ok(serde_json::from_str(json)?)
}

pub fn config_to_yaml(state: &PlotConfigurationSerde) -> PlotResult<String> {
    Ok(serde_yaml::to_string(state)?)
}

pub fn config_from_yaml(yaml: &str) -> PlotResult<PlotConfigurationSerde> {
    Ok(serde_yaml::from_str(yaml)?)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Save as YAML for `.yaml`/`.yml` paths, JSON otherwise.
pub fn save_config_to_path(state: &PlotConfigurationSerde, path: &Path) -> PlotResult<()> {
    let text = if is_yaml(path) {
        config_to_yaml(state)?
    } else {
        config_to_json(state)?
    };
    std::fs::write(path, text)?;
    Ok(())
}

pub fn load_config_from_path(path: &Path) -> PlotResult<PlotConfigurationSerde> {
    let text = std::fs::read_to_string(path)?;
    if is_yaml(path) {
        config_from_yaml(&text)
    } else {
        config_from_json(&text)
    }
}
