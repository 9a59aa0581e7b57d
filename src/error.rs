//! Error types shared across the crate.

/// Why a series load did not produce records.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("telemetry source failed: {0}")]
    Source(String),
    #[error("load reply dropped without an answer")]
    Abandoned,
    #[error("load cancelled")]
    Cancelled,
}

#[derive(thiserror::Error, Debug)]
pub enum PlotError {
    #[error("invalid bounds: start {start} end {end}")]
    InvalidBounds { start: f64, end: f64 },
    #[error("no configuration registered for '{0}'")]
    UnknownConfiguration(String),
    #[error("configuration for '{0}' already registered")]
    ConfigurationExists(String),
    #[error("load failed: {0}")]
    Load(#[from] LoadError),
    #[error("no captured frame to export")]
    NothingToExport,
    #[error("exporter dropped without reporting a result")]
    ExportAbandoned,
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type PlotResult<T> = Result<T, PlotError>;
