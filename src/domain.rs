//! Domain objects as seen by a plot: an identifier, an optional status
//! capability other views read indicators from, and an adapted descriptor.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::data::configuration::ObjectDescriptor;
use crate::events::lock;

/// Status flag set while a plot shows a range other than the live conductor range.
pub const TIMECONDUCTOR_UNSYNCED: &str = "timeconductor-unsynced";

/// Set of named status flags on an object. Clones share the same flags.
#[derive(Debug, Clone, Default)]
pub struct StatusCapability {
    flags: Arc<Mutex<BTreeSet<String>>>,
}

impl StatusCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, flag: &str, on: bool) {
        let mut flags = lock(&self.flags);
        if on {
            flags.insert(flag.to_string());
        } else {
            flags.remove(flag);
        }
    }

    pub fn get(&self, flag: &str) -> bool {
        lock(&self.flags).contains(flag)
    }

    pub fn list(&self) -> Vec<String> {
        lock(&self.flags).iter().cloned().collect()
    }
}

pub trait DomainObject: Send + Sync {
    fn id(&self) -> &str;

    /// Objects without status support return `None`.
    fn status(&self) -> Option<&StatusCapability> {
        None
    }

    /// Descriptor stored in a newly created plot configuration.
    fn adapt(&self) -> ObjectDescriptor;
}

/// Plain telemetry point with a status capability.
#[derive(Debug, Clone)]
pub struct TelemetryObject {
    id: String,
    name: String,
    status: StatusCapability,
}

impl TelemetryObject {
    pub fn new<S: Into<String>>(id: S, name: S) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: StatusCapability::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl DomainObject for TelemetryObject {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> Option<&StatusCapability> {
        Some(&self.status)
    }

    fn adapt(&self) -> ObjectDescriptor {
        ObjectDescriptor {
            identifier: self.id.clone(),
            name: self.name.clone(),
            object_type: "telemetry".to_string(),
        }
    }
}
