//! telemetry-plot crate root: re-exports and module wiring.
//!
//! A headless plot view-controller for telemetry. A [`PlotController`]
//! binds one domain object's plot configuration to a [`ViewScope`], follows
//! the [`TimeConductor`], drives series loads and history purges, and
//! exports the view as an image. The optional `view` feature adds an
//! `egui_plot` widget that renders a controller.
//!
//! Modules:
//! - `events`: typed event bus with explicit subscription handles
//! - `data`: series, plot configuration, the configuration store and an in-memory source
//! - `time_conductor`: bounds/time-system/clock authority and wall clocks
//! - `domain`: domain objects and their status capability
//! - `scope`: view scope shared with the rendering layer
//! - `controller`: the plot controller
//! - `export`: image exporters
//! - `config`: controller settings
//! - `persistence`: saving and restoring plot configurations

pub mod config;
pub mod controller;
pub mod data;
pub mod domain;
pub mod error;
pub mod events;
pub mod export;
pub mod persistence;
pub mod range;
pub mod scope;
pub mod time_conductor;
#[cfg(feature = "view")]
pub mod view;

// Public re-exports for a compact external API
pub use config::ControllerSettings;
pub use controller::PlotController;
pub use data::configuration::{
    ObjectDescriptor, PlotConfiguration, SeriesCollectionEvent, SharedConfiguration, XAxis,
};
pub use data::series::{
    LoadOptions, LoadReply, LoadRequest, PlotSeries, SeriesEvent, SeriesId, SharedSeries,
    TelemetrySource,
};
pub use data::source::MemorySource;
pub use data::store::ConfigStore;
pub use domain::{DomainObject, StatusCapability, TelemetryObject, TIMECONDUCTOR_UNSYNCED};
pub use error::{LoadError, PlotError, PlotResult};
pub use export::{ExportFormat, FileImageExporter, ImageExporter, PendingExport};
pub use range::{Bounds, Range};
pub use scope::{ScopeEvent, ViewElement, ViewScope};
pub use time_conductor::{
    Clock, ClockOffsets, ConductorEvent, ManualClock, SystemClock, TimeConductor, TimeSystem,
    WallClock,
};
#[cfg(feature = "view")]
pub use view::PlotView;
