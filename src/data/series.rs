//! Plot series: one telemetry stream with its value key and record buffer.
//!
//! A series does not fetch data itself. Each [`PlotSeries::load`] hands a
//! [`LoadRequest`] and a [`LoadReply`] to the series' [`TelemetrySource`];
//! the source answers through the reply (now or later, from any thread) and
//! the caller observes the answer through the returned [`PendingLoad`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

use crate::error::LoadError;
use crate::events::{EventBus, Subscription};
use crate::range::Range;

/// Numeric identifier for a series, assigned when the series is created.
pub type SeriesId = u32;

/// Series shared between the configuration and every controller viewing it.
pub type SharedSeries = Arc<Mutex<PlotSeries>>;

/// Outcome of one load: `[x, y]` records on success.
pub type LoadResult = Result<Vec<[f64; 2]>, LoadError>;

/// Options for a single load.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadOptions {
    /// Pixel width of the plot; sources may downsample to roughly this many points.
    pub size: u32,
    /// Key of the x-axis (time system) the records should be expressed in.
    pub domain: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl LoadOptions {
    pub fn range(&self) -> Option<Range> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(Range::new(start, end)),
            _ => None,
        }
    }
}

/// What a [`TelemetrySource`] is asked to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub series: SeriesId,
    pub y_key: String,
    pub options: LoadOptions,
}

/// Shared cancellation flag between a pending load and its reply.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Answer channel handed to a source with each request. Consumed on answer;
/// dropping it unanswered settles the load as [`LoadError::Abandoned`].
pub struct LoadReply {
    tx: Sender<LoadResult>,
    cancel: CancelToken,
}

impl LoadReply {
    /// Sources doing expensive work may check this and skip it.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn complete(self, records: Vec<[f64; 2]>) {
        let _ = self.tx.send(Ok(records));
    }

    pub fn fail<S: Into<String>>(self, reason: S) {
        let _ = self.tx.send(Err(LoadError::Source(reason.into())));
    }
}

/// An issued load that has not been observed as settled yet.
pub struct PendingLoad {
    series: SeriesId,
    generation: u64,
    rx: Receiver<LoadResult>,
    cancel: CancelToken,
}

impl PendingLoad {
    pub fn series(&self) -> SeriesId {
        self.series
    }

    /// Load generation of the series when this load was issued.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `None` while the source has not answered.
    pub fn try_settle(&self) -> Option<LoadResult> {
        if self.cancel.is_cancelled() {
            return Some(Err(LoadError::Cancelled));
        }
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoadError::Abandoned)),
        }
    }
}

/// Data provider behind a series.
pub trait TelemetrySource: Send {
    /// Start fetching `request`. Answer through `reply` exactly once.
    fn request(&mut self, request: LoadRequest, reply: LoadReply);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesEvent {
    /// The plotted value key changed; previously loaded records were dropped.
    YKeyChanged { series: SeriesId, y_key: String },
}

pub struct PlotSeries {
    id: SeriesId,
    name: String,
    y_key: String,
    records: VecDeque<[f64; 2]>,
    // bumped whenever loads already issued stop matching the buffer
    generation: u64,
    source: Box<dyn TelemetrySource>,
    events: EventBus<SeriesEvent>,
}

impl PlotSeries {
    pub fn new<N, K>(name: N, y_key: K, source: Box<dyn TelemetrySource>) -> Self
    where
        N: Into<String>,
        K: Into<String>,
    {
        static NEXT_ID: AtomicU32 = AtomicU32::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            name: name.into(),
            y_key: y_key.into(),
            records: VecDeque::new(),
            generation: 0,
            source,
            events: EventBus::new(),
        }
    }

    pub fn into_shared(self) -> SharedSeries {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> SeriesId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn y_key(&self) -> &str {
        &self.y_key
    }

    /// Loaded records, sorted by x.
    pub fn records(&self) -> &VecDeque<[f64; 2]> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark every load issued so far as stale. Their records will not be
    /// accepted by [`Self::apply_load`].
    pub fn invalidate_loads(&mut self) {
        self.generation += 1;
    }

    pub fn subscribe(&self) -> (Subscription, Receiver<SeriesEvent>) {
        self.events.subscribe()
    }

    /// Change the plotted value key. Returns `false` if it was already `y_key`.
    pub fn set_y_key<S: Into<String>>(&mut self, y_key: S) -> bool {
        let y_key = y_key.into();
        if y_key == self.y_key {
            return false;
        }
        self.y_key = y_key.clone();
        self.records.clear();
        self.invalidate_loads();
        self.events.emit(SeriesEvent::YKeyChanged {
            series: self.id,
            y_key,
        });
        true
    }

    pub fn load(&mut self, options: LoadOptions) -> PendingLoad {
        let (tx, rx) = std::sync::mpsc::channel();
        let cancel = CancelToken::new();
        let request = LoadRequest {
            series: self.id,
            y_key: self.y_key.clone(),
            options,
        };
        log::debug!(
            "series {} ({}): load {:?}",
            self.id,
            self.name,
            request.options
        );
        self.source.request(
            request,
            LoadReply {
                tx,
                cancel: cancel.clone(),
            },
        );
        PendingLoad {
            series: self.id,
            generation: self.generation,
            rx,
            cancel,
        }
    }

    /// Merge loaded records into the buffer. Records with an x already present
    /// replace the existing value. Returns the buffer length afterwards.
    pub fn apply_records(&mut self, records: Vec<[f64; 2]>) -> usize {
        let mut merged: Vec<[f64; 2]> = self.records.drain(..).collect();
        merged.extend(records.into_iter().filter(|p| p[0].is_finite()));
        // stable: for equal x the incoming record sorts after the existing one
        merged.sort_by(|a, b| a[0].total_cmp(&b[0]));
        for p in merged {
            match self.records.back_mut() {
                Some(last) if last[0] == p[0] => *last = p,
                _ => self.records.push_back(p),
            }
        }
        self.records.len()
    }

    /// Merge the records of a load issued at `generation`. Returns `None`
    /// without touching the buffer when that load has gone stale.
    pub fn apply_load(&mut self, generation: u64, records: Vec<[f64; 2]>) -> Option<usize> {
        if generation != self.generation {
            return None;
        }
        Some(self.apply_records(records))
    }

    /// Drop every record whose x lies outside `range` (inclusive). Returns how many were dropped.
    pub fn purge_records_outside_range(&mut self, range: Range) -> usize {
        let before = self.records.len();
        self.records.retain(|p| range.contains(p[0]));
        before - self.records.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl std::fmt::Debug for PlotSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotSeries")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("y_key", &self.y_key)
            .field("records", &self.records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps replies so the test decides when and how they settle.
    #[derive(Default)]
    struct HeldSource {
        replies: Arc<Mutex<Vec<(LoadRequest, LoadReply)>>>,
    }

    impl TelemetrySource for HeldSource {
        fn request(&mut self, request: LoadRequest, reply: LoadReply) {
            self.replies.lock().unwrap().push((request, reply));
        }
    }

    fn held() -> (PlotSeries, Arc<Mutex<Vec<(LoadRequest, LoadReply)>>>) {
        let src = HeldSource::default();
        let replies = src.replies.clone();
        (PlotSeries::new("temp", "value", Box::new(src)), replies)
    }

    #[test]
    fn ids_are_unique() {
        let (a, _) = held();
        let (b, _) = held();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn load_settles_through_reply() {
        let (mut s, replies) = held();
        let pending = s.load(LoadOptions {
            size: 100,
            start: Some(0.0),
            end: Some(5.0),
            ..Default::default()
        });
        assert!(pending.try_settle().is_none());

        let (req, reply) = replies.lock().unwrap().pop().unwrap();
        assert_eq!(req.y_key, "value");
        assert_eq!(req.options.range(), Some(Range::new(0.0, 5.0)));
        reply.complete(vec![[1.0, 10.0]]);
        assert_eq!(pending.try_settle(), Some(Ok(vec![[1.0, 10.0]])));
    }

    #[test]
    fn dropped_reply_settles_as_abandoned() {
        let (mut s, replies) = held();
        let pending = s.load(LoadOptions::default());
        replies.lock().unwrap().clear();
        assert_eq!(pending.try_settle(), Some(Err(LoadError::Abandoned)));
    }

    #[test]
    fn cancel_is_visible_to_source() {
        let (mut s, replies) = held();
        let pending = s.load(LoadOptions::default());
        pending.cancel();
        let (_, reply) = replies.lock().unwrap().pop().unwrap();
        assert!(reply.is_cancelled());
        assert_eq!(pending.try_settle(), Some(Err(LoadError::Cancelled)));
    }

    #[test]
    fn apply_records_sorts_and_replaces_duplicates() {
        let (mut s, _) = held();
        s.apply_records(vec![[3.0, 30.0], [1.0, 10.0]]);
        s.apply_records(vec![[2.0, 20.0], [3.0, 33.0], [f64::NAN, 0.0]]);
        let xs: Vec<[f64; 2]> = s.records().iter().copied().collect();
        assert_eq!(xs, vec![[1.0, 10.0], [2.0, 20.0], [3.0, 33.0]]);
    }

    #[test]
    fn stale_load_is_rejected_after_key_change() {
        let (mut s, replies) = held();
        let old = s.load(LoadOptions::default());
        assert!(s.set_y_key("current"));
        let new = s.load(LoadOptions::default());
        assert_ne!(old.generation(), new.generation());

        assert_eq!(s.apply_load(old.generation(), vec![[20.0, 999.0]]), None);
        assert_eq!(s.apply_load(new.generation(), vec![[10.0, 2.0]]), Some(1));
        let keys: Vec<String> = replies
            .lock()
            .unwrap()
            .iter()
            .map(|(req, _)| req.y_key.clone())
            .collect();
        assert_eq!(keys, vec!["value".to_string(), "current".to_string()]);
        assert_eq!(s.records().iter().copied().collect::<Vec<_>>(), vec![[10.0, 2.0]]);
    }

    #[test]
    fn name_and_key_take_different_string_types() {
        let name = String::from("Temp A");
        let s = PlotSeries::new(name, "raw", Box::new(HeldSource::default()));
        assert_eq!(s.name(), "Temp A");
        assert_eq!(s.y_key(), "raw");
    }

    #[test]
    fn purge_keeps_inclusive_range() {
        let (mut s, _) = held();
        s.apply_records((0..10).map(|i| [i as f64, 0.0]).collect());
        let dropped = s.purge_records_outside_range(Range::new(2.0, 5.0));
        assert_eq!(dropped, 6);
        assert_eq!(s.records().front().unwrap()[0], 2.0);
        assert_eq!(s.records().back().unwrap()[0], 5.0);
    }

    #[test]
    fn y_key_change_clears_and_notifies() {
        let (mut s, _) = held();
        let (_sub, rx) = s.subscribe();
        s.apply_records(vec![[0.0, 1.0]]);
        assert!(!s.set_y_key("value"));
        assert!(s.set_y_key("voltage"));
        assert!(s.is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            SeriesEvent::YKeyChanged {
                series: s.id(),
                y_key: "voltage".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
