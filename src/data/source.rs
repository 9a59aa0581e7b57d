//! In-memory telemetry source.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::data::series::{LoadReply, LoadRequest, TelemetrySource};
use crate::events::lock;

/// Serves `[x, y]` records per value key from memory.
///
/// Clones share the same storage, so a producer can keep appending while a
/// series loads from it. Requests are restricted to `start..=end` when both
/// are given and decimated to at most `size` records when `size > 0`.
#[derive(Clone, Default)]
pub struct MemorySource {
    values: Arc<Mutex<BTreeMap<String, Vec<[f64; 2]>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<S: Into<String>>(self, y_key: S, points: Vec<[f64; 2]>) -> Self {
        self.set_values(y_key, points);
        self
    }

    pub fn set_values<S: Into<String>>(&self, y_key: S, mut points: Vec<[f64; 2]>) {
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));
        lock(&self.values).insert(y_key.into(), points);
    }

    /// Append one record; keeps the key's records sorted.
    pub fn push<S: Into<String>>(&self, y_key: S, point: [f64; 2]) {
        let mut values = lock(&self.values);
        let points = values.entry(y_key.into()).or_default();
        let at = points.partition_point(|p| p[0] <= point[0]);
        points.insert(at, point);
    }

    pub fn len(&self, y_key: &str) -> usize {
        lock(&self.values).get(y_key).map_or(0, Vec::len)
    }
}

impl TelemetrySource for MemorySource {
    fn request(&mut self, request: LoadRequest, reply: LoadReply) {
        let range = request.options.range();
        let selected: Option<Vec<[f64; 2]>> = {
            let values = lock(&self.values);
            values.get(&request.y_key).map(|points| match range {
                Some(range) => points.iter().copied().filter(|p| range.contains(p[0])).collect(),
                None => points.clone(),
            })
        };
        match selected {
            Some(points) => reply.complete(decimate(points, request.options.size as usize)),
            None => reply.fail(format!("unknown value key '{}'", request.y_key)),
        }
    }
}

/// Keep every n-th record so at most `size` remain; `size == 0` disables.
fn decimate(points: Vec<[f64; 2]>, size: usize) -> Vec<[f64; 2]> {
    if size == 0 || points.len() <= size {
        return points;
    }
    let stride = points.len().div_ceil(size);
    points.into_iter().step_by(stride).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::{LoadOptions, PlotSeries};
    use crate::error::LoadError;

    fn ramp(n: usize) -> Vec<[f64; 2]> {
        (0..n).map(|i| [i as f64, i as f64 * 2.0]).collect()
    }

    #[test]
    fn restricts_to_requested_range() {
        let src = MemorySource::new().with_values("v", ramp(20));
        let mut series = PlotSeries::new("s", "v", Box::new(src));
        let pending = series.load(LoadOptions {
            start: Some(5.0),
            end: Some(9.0),
            ..Default::default()
        });
        let records = pending.try_settle().unwrap().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0], [5.0, 10.0]);
    }

    #[test]
    fn decimates_to_size_hint() {
        let src = MemorySource::new().with_values("v", ramp(1000));
        let mut series = PlotSeries::new("s", "v", Box::new(src));
        let records = series
            .load(LoadOptions {
                size: 100,
                ..Default::default()
            })
            .try_settle()
            .unwrap()
            .unwrap();
        assert!(records.len() <= 100);
        assert_eq!(records[0], [0.0, 0.0]);
    }

    #[test]
    fn unknown_key_fails() {
        let mut series = PlotSeries::new("s", "missing", Box::new(MemorySource::new()));
        let outcome = series.load(LoadOptions::default()).try_settle().unwrap();
        assert!(matches!(outcome, Err(LoadError::Source(_))));
    }

    #[test]
    fn push_keeps_order() {
        let src = MemorySource::new();
        src.push("v", [2.0, 0.0]);
        src.push("v", [1.0, 0.0]);
        src.push("v", [3.0, 0.0]);
        assert_eq!(src.len("v"), 3);
        let values = lock(&src.values);
        let xs: Vec<f64> = values["v"].iter().map(|p| p[0]).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }
}
