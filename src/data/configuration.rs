//! Plot configuration: x-axis state and the ordered series collection.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::data::series::{SeriesId, SharedSeries};
use crate::events::{lock, EventBus, Subscription};
use crate::range::Range;

/// Configuration shared by every view of one object.
pub type SharedConfiguration = Arc<Mutex<PlotConfiguration>>;

/// Adapted, serializable description of the plotted domain object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub identifier: String,
    pub name: String,
    pub object_type: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XAxis {
    /// Time system key the x values are expressed in.
    pub key: String,
    /// Range requested by the time conductor.
    pub range: Option<Range>,
    /// Range currently shown, which diverges from `range` after user pan/zoom.
    pub display_range: Option<Range>,
}

#[derive(Debug, Clone)]
pub enum SeriesCollectionEvent {
    Added(SharedSeries),
    Removed(SeriesId),
}

/// Ordered series that announces additions and removals.
pub struct SeriesCollection {
    items: Vec<SharedSeries>,
    events: EventBus<SeriesCollectionEvent>,
}

impl SeriesCollection {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&self) -> (Subscription, Receiver<SeriesCollectionEvent>) {
        self.events.subscribe()
    }

    pub fn add(&mut self, series: SharedSeries) -> SeriesId {
        let id = lock(&series).id();
        self.items.push(series.clone());
        self.events.emit(SeriesCollectionEvent::Added(series));
        id
    }

    pub fn remove(&mut self, id: SeriesId) -> Option<SharedSeries> {
        let at = self.items.iter().position(|s| lock(s).id() == id)?;
        let removed = self.items.remove(at);
        self.events.emit(SeriesCollectionEvent::Removed(id));
        Some(removed)
    }

    pub fn get(&self, id: SeriesId) -> Option<SharedSeries> {
        self.items.iter().find(|s| lock(s).id() == id).cloned()
    }

    pub fn contains(&self, id: SeriesId) -> bool {
        self.items.iter().any(|s| lock(s).id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedSeries> {
        self.items.iter()
    }

    /// Snapshot of the current series handles, in order.
    pub fn to_vec(&self) -> Vec<SharedSeries> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every series without announcing it.
    fn clear_silently(&mut self) {
        self.items.clear();
    }
}

impl Default for SeriesCollection {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PlotConfiguration {
    id: String,
    object: ObjectDescriptor,
    pub x_axis: XAxis,
    series: SeriesCollection,
}

impl PlotConfiguration {
    pub fn new<S: Into<String>>(id: S, object: ObjectDescriptor) -> Self {
        Self {
            id: id.into(),
            object,
            x_axis: XAxis::default(),
            series: SeriesCollection::new(),
        }
    }

    pub fn into_shared(self) -> SharedConfiguration {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object(&self) -> &ObjectDescriptor {
        &self.object
    }

    pub fn series(&self) -> &SeriesCollection {
        &self.series
    }

    pub fn series_mut(&mut self) -> &mut SeriesCollection {
        &mut self.series
    }

    /// Release the series once no view holds this configuration any more.
    pub(crate) fn dispose(&mut self) {
        log::debug!("disposing plot configuration '{}'", self.id);
        self.series.clear_silently();
    }
}

impl std::fmt::Debug for PlotConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotConfiguration")
            .field("id", &self.id)
            .field("x_axis", &self.x_axis)
            .field("series", &self.series.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::PlotSeries;
    use crate::data::source::MemorySource;

    fn descriptor() -> ObjectDescriptor {
        ObjectDescriptor {
            identifier: "sat:temp".into(),
            name: "Temperature".into(),
            object_type: "telemetry".into(),
        }
    }

    #[test]
    fn collection_announces_add_and_remove() {
        let mut cfg = PlotConfiguration::new("sat:temp", descriptor());
        let (_sub, rx) = cfg.series().subscribe();
        let s = PlotSeries::new("a", "value", Box::new(MemorySource::new())).into_shared();
        let id = cfg.series_mut().add(s);

        match rx.try_recv().unwrap() {
            SeriesCollectionEvent::Added(added) => assert_eq!(lock(&added).id(), id),
            other => panic!("unexpected {other:?}"),
        }
        assert!(cfg.series().contains(id));

        assert!(cfg.series_mut().remove(id).is_some());
        assert!(matches!(
            rx.try_recv().unwrap(),
            SeriesCollectionEvent::Removed(r) if r == id
        ));
        assert!(cfg.series_mut().remove(id).is_none());
        assert!(cfg.series().is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let mut cfg = PlotConfiguration::new("x", descriptor());
        let ids: Vec<SeriesId> = ["a", "b", "c"]
            .iter()
            .map(|n| {
                cfg.series_mut()
                    .add(PlotSeries::new(*n, "value", Box::new(MemorySource::new())).into_shared())
            })
            .collect();
        let seen: Vec<SeriesId> = cfg.series().iter().map(|s| lock(s).id()).collect();
        assert_eq!(seen, ids);
    }
}
