//! Reference-counted registry of plot configurations keyed by object id.
//!
//! Several views of the same object share one [`PlotConfiguration`]. Each
//! view tracks the entry while it is alive and untracks it on teardown; the
//! entry is disposed and removed when the count drops back to zero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::data::configuration::{PlotConfiguration, SharedConfiguration};
use crate::error::{PlotError, PlotResult};
use crate::events::lock;

struct StoreEntry {
    config: SharedConfiguration,
    holders: usize,
}

/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct ConfigStore {
    inner: Arc<Mutex<HashMap<String, StoreEntry>>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SharedConfiguration> {
        lock(&self.inner).get(id).map(|e| e.config.clone())
    }

    /// Register `config` under `id` with no holders yet.
    pub fn add<S: Into<String>>(&self, id: S, config: SharedConfiguration) -> PlotResult<()> {
        let id = id.into();
        let mut inner = lock(&self.inner);
        if inner.contains_key(&id) {
            return Err(PlotError::ConfigurationExists(id));
        }
        inner.insert(id, StoreEntry { config, holders: 0 });
        Ok(())
    }

    /// Count one more holder. Returns the new count.
    pub fn track(&self, id: &str) -> PlotResult<usize> {
        let mut inner = lock(&self.inner);
        let entry = inner
            .get_mut(id)
            .ok_or_else(|| PlotError::UnknownConfiguration(id.to_string()))?;
        entry.holders += 1;
        Ok(entry.holders)
    }

    /// Count one holder less. At zero the configuration is disposed and
    /// removed. Returns the remaining count.
    pub fn untrack(&self, id: &str) -> PlotResult<usize> {
        let disposed = {
            let mut inner = lock(&self.inner);
            let entry = inner
                .get_mut(id)
                .ok_or_else(|| PlotError::UnknownConfiguration(id.to_string()))?;
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders > 0 {
                return Ok(entry.holders);
            }
            inner.remove(id)
        };
        if let Some(entry) = disposed {
            lock(&entry.config).dispose();
            log::info!("plot configuration '{id}' released by its last view");
        }
        Ok(0)
    }

    /// Existing configuration for `id`, or one built by `create` and
    /// registered. Either way the returned entry is tracked once more.
    pub fn get_or_insert_with<F>(&self, id: &str, create: F) -> SharedConfiguration
    where
        F: FnOnce() -> PlotConfiguration,
    {
        let mut inner = lock(&self.inner);
        let entry = inner.entry(id.to_string()).or_insert_with(|| {
            log::debug!("creating plot configuration '{id}'");
            StoreEntry {
                config: create().into_shared(),
                holders: 0,
            }
        });
        entry.holders += 1;
        entry.config.clone()
    }

    pub fn holders(&self, id: &str) -> usize {
        lock(&self.inner).get(id).map_or(0, |e| e.holders)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}
