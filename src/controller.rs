//! Plot controller: binds one object's plot configuration to a view scope
//! and keeps it in step with the time conductor.
//!
//! The controller owns no data. It
//! - obtains (or creates) the shared configuration from the [`ConfigStore`]
//!   and tracks it for as long as it lives,
//! - reloads series when the conductor bounds change and purges old history
//!   (at most once per purge interval) while the live clock ticks,
//! - keeps the scope's pending counter equal to the loads in flight,
//! - mirrors viewport synchronization into the object's status,
//! - runs image exports while hiding the export controls.
//!
//! Events from the scope, the series collection, each series and the
//! conductor are queued on channels and handled by [`PlotController::poll`],
//! which also settles finished loads and exports. Call it once per frame.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::config::ControllerSettings;
use crate::data::configuration::{
    PlotConfiguration, SeriesCollectionEvent, SharedConfiguration,
};
use crate::data::series::{
    LoadOptions, LoadResult, PendingLoad, SeriesEvent, SeriesId, SharedSeries,
};
use crate::data::store::ConfigStore;
use crate::domain::TIMECONDUCTOR_UNSYNCED;
use crate::error::LoadError;
use crate::events::{lock, SubscriptionSet};
use crate::export::{ExportFormat, ImageExporter, PendingExport};
use crate::range::{Bounds, Range};
use crate::scope::{ScopeEvent, ViewScope};
use crate::time_conductor::{ConductorEvent, SystemClock, TimeConductor, TimeSystem, WallClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenTarget {
    Scope,
    Collection,
    Conductor,
    Series(SeriesId),
}

pub struct PlotController {
    scope: ViewScope,
    conductor: TimeConductor,
    store: ConfigStore,
    exporter: Arc<dyn ImageExporter>,
    wall_clock: Arc<dyn WallClock>,
    settings: ControllerSettings,

    config: SharedConfiguration,
    config_id: String,

    subscriptions: SubscriptionSet<ListenTarget>,
    scope_rx: Option<Receiver<ScopeEvent>>,
    collection_rx: Option<Receiver<SeriesCollectionEvent>>,
    conductor_rx: Option<Receiver<ConductorEvent>>,
    series_rx: Vec<(SeriesId, Receiver<SeriesEvent>)>,

    pending_loads: Vec<PendingLoad>,
    pending_exports: Vec<PendingExport>,
    hide_export_buttons: bool,
    synchronized: Option<bool>,
    next_purge_ms: i64,
    destroyed: bool,
}

impl PlotController {
    /// Controller with default settings and the system wall clock.
    pub fn new(
        scope: ViewScope,
        conductor: TimeConductor,
        store: ConfigStore,
        exporter: Arc<dyn ImageExporter>,
    ) -> Self {
        Self::with_options(
            scope,
            conductor,
            store,
            exporter,
            ControllerSettings::default(),
            Arc::new(SystemClock),
        )
    }

    pub fn with_options(
        scope: ViewScope,
        conductor: TimeConductor,
        store: ConfigStore,
        exporter: Arc<dyn ImageExporter>,
        settings: ControllerSettings,
        wall_clock: Arc<dyn WallClock>,
    ) -> Self {
        let config_id = scope.domain_object().id().to_string();
        let config = Self::get_config(&scope, &conductor, &store, &config_id);
        let next_purge_ms = wall_clock
            .now_ms()
            .saturating_add(settings.purge_interval_ms_i64());

        let mut ctrl = Self {
            scope,
            conductor,
            store,
            exporter,
            wall_clock,
            settings,
            config,
            config_id,
            subscriptions: SubscriptionSet::new(),
            scope_rx: None,
            collection_rx: None,
            conductor_rx: None,
            series_rx: Vec::new(),
            pending_loads: Vec::new(),
            pending_exports: Vec::new(),
            hide_export_buttons: false,
            synchronized: None,
            next_purge_ms,
            destroyed: false,
        };

        let (sub, rx) = ctrl.scope.subscribe();
        ctrl.subscriptions.listen(ListenTarget::Scope, sub);
        ctrl.scope_rx = Some(rx);

        let (sub, rx, existing) = {
            let cfg = lock(&ctrl.config);
            let (sub, rx) = cfg.series().subscribe();
            let existing = cfg.series().to_vec();
            (sub, rx, existing)
        };
        ctrl.subscriptions.listen(ListenTarget::Collection, sub);
        ctrl.collection_rx = Some(rx);
        for series in &existing {
            ctrl.add_series(series);
        }

        ctrl.follow_time_conductor();
        log::debug!(
            "plot controller bound to '{}' with {} series",
            ctrl.config_id,
            existing.len()
        );
        ctrl
    }

    /// Shared configuration for the scope's object, created on first view.
    /// Either way it is tracked once for this controller.
    fn get_config(
        scope: &ViewScope,
        conductor: &TimeConductor,
        store: &ConfigStore,
        id: &str,
    ) -> SharedConfiguration {
        let config = store.get_or_insert_with(id, || {
            PlotConfiguration::new(id, scope.domain_object().adapt())
        });
        {
            let mut cfg = lock(&config);
            if cfg.x_axis.key.is_empty() {
                cfg.x_axis.key = conductor.time_system().key;
            }
            if cfg.x_axis.range.is_none() {
                let range = Range::from(conductor.bounds());
                cfg.x_axis.range = Some(range);
                cfg.x_axis.display_range = Some(range);
            }
        }
        config
    }

    fn follow_time_conductor(&mut self) {
        let (sub, rx) = self.conductor.subscribe();
        self.subscriptions.listen(ListenTarget::Conductor, sub);
        self.conductor_rx = Some(rx);
        self.set_synchronized(true);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> SharedConfiguration {
        self.config.clone()
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    pub fn conductor(&self) -> &TimeConductor {
        &self.conductor
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Last value given to [`Self::set_synchronized`]; `None` before the first.
    pub fn synchronized(&self) -> Option<bool> {
        self.synchronized
    }

    pub fn hide_export_buttons(&self) -> bool {
        self.hide_export_buttons
    }

    pub fn loads_in_flight(&self) -> usize {
        self.pending_loads.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Handle every queued event, then settle finished loads and exports.
    /// Returns the number of events and settlements handled.
    pub fn poll(&mut self) -> usize {
        if self.destroyed {
            return 0;
        }
        let mut handled = 0;

        let scope_events: Vec<ScopeEvent> = drain(&self.scope_rx);
        for event in scope_events {
            handled += 1;
            match event {
                ScopeEvent::ViewportChangeEnd => self.on_user_viewport_change_end(),
                ScopeEvent::Destroy => {
                    self.destroy();
                    return handled;
                }
                ScopeEvent::ClearHistory => {}
            }
        }

        let collection_events: Vec<SeriesCollectionEvent> = drain(&self.collection_rx);
        for event in collection_events {
            handled += 1;
            match event {
                SeriesCollectionEvent::Added(series) => self.add_series(&series),
                SeriesCollectionEvent::Removed(id) => self.remove_series(id),
            }
        }

        let series_events: Vec<SeriesEvent> = self
            .series_rx
            .iter()
            .flat_map(|(_, rx)| rx.try_iter())
            .collect();
        for event in series_events {
            handled += 1;
            match event {
                SeriesEvent::YKeyChanged { series, .. } => {
                    let found = lock(&self.config).series().get(series);
                    if let Some(series) = found {
                        self.load_series_data(&series);
                    }
                }
            }
        }

        let conductor_events: Vec<ConductorEvent> = drain(&self.conductor_rx);
        for event in conductor_events {
            handled += 1;
            match event {
                ConductorEvent::Bounds { bounds, is_tick } => {
                    self.update_display_bounds(bounds, is_tick)
                }
                ConductorEvent::TimeSystem(ts) => self.on_time_system_change(&ts),
                ConductorEvent::Clock(_) => {}
            }
        }

        handled += self.settle_loads();
        handled += self.settle_exports();
        handled
    }

    // ─────────────────────────────────────────────────────────────────────
    // Series
    // ─────────────────────────────────────────────────────────────────────

    /// Start listening to `series` and load it.
    pub fn add_series(&mut self, series: &SharedSeries) {
        let (id, sub, rx) = {
            let s = lock(series);
            let (sub, rx) = s.subscribe();
            (s.id(), sub, rx)
        };
        if self.subscriptions.is_listening_to(&ListenTarget::Series(id)) {
            sub.release();
            log::debug!("series {id} already followed");
            return;
        }
        self.subscriptions.listen(ListenTarget::Series(id), sub);
        self.series_rx.push((id, rx));
        self.load_series_data(series);
    }

    /// Stop listening to the series with `id`.
    pub fn remove_series(&mut self, id: SeriesId) {
        let released = self.subscriptions.stop_listening_to(&ListenTarget::Series(id));
        self.series_rx.retain(|(sid, _)| *sid != id);
        log::debug!("series {id} removed, released {released} subscription(s)");
    }

    /// Load one series over the configured x-axis range in its time system.
    pub fn load_series_data(&mut self, series: &SharedSeries) {
        let options = {
            let cfg = lock(&self.config);
            LoadOptions {
                size: self.scope.element_width_px(),
                domain: Some(cfg.x_axis.key.clone()),
                start: cfg.x_axis.range.map(|r| r.min),
                end: cfg.x_axis.range.map(|r| r.max),
            }
        };
        self.start_load(series, options);
    }

    /// Reload every series over `range`; with `purge`, drop records outside
    /// it right away instead of waiting for the loads. A purge also makes
    /// loads still in flight for the previous range stale.
    pub fn load_more_data(&mut self, range: Range, purge: bool) {
        let series = lock(&self.config).series().to_vec();
        let size = self.scope.element_width_px();
        for s in &series {
            if purge {
                let mut s = lock(s);
                s.invalidate_loads();
                s.purge_records_outside_range(range);
            }
            self.start_load(
                s,
                LoadOptions {
                    size,
                    domain: None,
                    start: Some(range.min),
                    end: Some(range.max),
                },
            );
        }
    }

    fn start_load(&mut self, series: &SharedSeries, options: LoadOptions) {
        self.scope.pending_counter().start();
        let pending = lock(series).load(options);
        self.pending_loads.push(pending);
    }

    fn settle_loads(&mut self) -> usize {
        let mut settled = 0;
        let mut waiting = Vec::with_capacity(self.pending_loads.len());
        for pending in std::mem::take(&mut self.pending_loads) {
            match pending.try_settle() {
                None => waiting.push(pending),
                Some(outcome) => {
                    settled += 1;
                    self.scope.pending_counter().finish();
                    self.apply_load(&pending, outcome);
                }
            }
        }
        self.pending_loads = waiting;
        settled
    }

    fn apply_load(&self, pending: &PendingLoad, outcome: LoadResult) {
        let id = pending.series();
        match outcome {
            Ok(records) => {
                let found = lock(&self.config).series().get(id);
                match found {
                    Some(series) => {
                        let n = records.len();
                        match lock(&series).apply_load(pending.generation(), records) {
                            Some(total) => log::debug!(
                                "series {id}: loaded {n} record(s), {total} buffered"
                            ),
                            None => log::debug!("series {id}: dropped {n} stale record(s)"),
                        }
                    }
                    None => log::debug!("series {id} left the plot before its load settled"),
                }
            }
            Err(LoadError::Cancelled) => log::debug!("series {id}: load cancelled"),
            Err(e) => log::warn!("series {id}: {e}"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Time conductor
    // ─────────────────────────────────────────────────────────────────────

    /// Track the conductor's latest bounds. Manual changes clear history
    /// and reload; ticks only purge, at most once per purge interval.
    pub fn update_display_bounds(&mut self, bounds: Bounds, is_tick: bool) {
        let range = Range::from(bounds);
        lock(&self.config).x_axis.range = Some(range);
        if !is_tick {
            self.scope.broadcast(ScopeEvent::ClearHistory);
            self.load_more_data(range, true);
            return;
        }

        let now = self.wall_clock.now_ms();
        if self.next_purge_ms < now {
            let keep = range.retention_window(self.settings.retention_windows);
            let series = lock(&self.config).series().to_vec();
            let dropped: usize = series
                .iter()
                .map(|s| lock(s).purge_records_outside_range(keep))
                .sum();
            log::debug!(
                "purged {dropped} record(s) outside [{}, {}]",
                keep.min,
                keep.max
            );
            self.next_purge_ms = now.saturating_add(self.settings.purge_interval_ms_i64());
        }
    }

    pub fn on_time_system_change(&mut self, time_system: &TimeSystem) {
        lock(&self.config).x_axis.key = time_system.key.clone();
    }

    /// Record whether the displayed range matches the conductor's and mark
    /// the object unsynced when it does not while a live clock runs.
    pub fn set_synchronized(&mut self, value: bool) {
        self.synchronized = Some(value);
        let unsynced = !value && self.conductor.clock().is_some();
        if let Some(status) = self.scope.domain_object().status() {
            status.set(TIMECONDUCTOR_UNSYNCED, unsynced);
        }
    }

    /// The user finished a pan/zoom: load the displayed range and
    /// re-evaluate synchronization.
    pub fn on_user_viewport_change_end(&mut self) {
        let (display, range) = {
            let cfg = lock(&self.config);
            (cfg.x_axis.display_range, cfg.x_axis.range)
        };
        if let Some(display) = display {
            self.load_more_data(display, false);
        }
        let synced = self.conductor.clock().is_none() || display == range;
        self.set_synchronized(synced);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────

    pub fn export_jpg(&mut self) {
        self.export(ExportFormat::Jpeg);
    }

    pub fn export_png(&mut self) {
        self.export(ExportFormat::Png);
    }

    fn export(&mut self, format: ExportFormat) {
        if self.destroyed {
            return;
        }
        self.hide_export_buttons = true;
        let file_name = match format {
            ExportFormat::Jpeg => &self.settings.jpg_file_name,
            ExportFormat::Png => &self.settings.png_file_name,
        };
        let pending = self.exporter.export(
            &self.scope.element(),
            file_name,
            format,
            self.settings.background_color(),
        );
        self.pending_exports.push(pending);
    }

    /// Export controls stay hidden until every started export has finished.
    fn settle_exports(&mut self) -> usize {
        let mut finished = 0;
        self.pending_exports.retain(|pending| match pending.try_finish() {
            None => true,
            Some(Ok(path)) => {
                log::info!("plot exported to {}", path.display());
                finished += 1;
                false
            }
            Some(Err(e)) => {
                log::warn!("plot export failed: {e}");
                finished += 1;
                false
            }
        });
        if self.pending_exports.is_empty() {
            self.hide_export_buttons = false;
        }
        finished
    }

    // ─────────────────────────────────────────────────────────────────────
    // Teardown
    // ─────────────────────────────────────────────────────────────────────

    /// Stop following everything, cancel in-flight loads and release the
    /// configuration. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let released = self.subscriptions.stop_listening();
        self.scope_rx = None;
        self.collection_rx = None;
        self.conductor_rx = None;
        self.series_rx.clear();

        let cancelled = self.pending_loads.len();
        for pending in self.pending_loads.drain(..) {
            pending.cancel();
            self.scope.pending_counter().finish();
        }
        self.pending_exports.clear();
        self.hide_export_buttons = false;

        if let Err(e) = self.store.untrack(&self.config_id) {
            log::warn!("releasing plot configuration: {e}");
        }
        log::debug!(
            "plot controller for '{}' destroyed: {released} subscription(s) released, {cancelled} load(s) cancelled",
            self.config_id
        );
    }
}

impl Drop for PlotController {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn drain<E>(rx: &Option<Receiver<E>>) -> Vec<E> {
    rx.as_ref().map(|rx| rx.try_iter().collect()).unwrap_or_default()
}
