//! Time conductor: the global authority for the current time bounds, the
//! active time system and the optional live clock.
//!
//! Views observe it through [`TimeConductor::subscribe`]. Bounds changes made
//! with [`TimeConductor::set_bounds`] are announced as non-tick updates;
//! advances driven by the live clock through [`TimeConductor::tick`] are
//! announced with `is_tick = true`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};
use crate::events::{lock, EventBus, Subscription};
use crate::range::Bounds;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSystem {
    pub key: String,
    pub name: String,
}

impl TimeSystem {
    pub fn new<S: Into<String>>(key: S, name: S) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    pub fn utc() -> Self {
        Self::new("utc", "UTC")
    }
}

/// Offsets of the bounds relative to the clock's current time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockOffsets {
    pub start: f64,
    pub end: f64,
}

/// A live clock. While one is active, bounds follow `now + offsets`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    pub key: String,
    pub offsets: ClockOffsets,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConductorEvent {
    Bounds { bounds: Bounds, is_tick: bool },
    TimeSystem(TimeSystem),
    Clock(Option<Clock>),
}

struct ConductorInner {
    bounds: Bounds,
    time_system: TimeSystem,
    clock: Option<Clock>,
}

/// Clones share the same state and subscribers.
#[derive(Clone)]
pub struct TimeConductor {
    inner: Arc<Mutex<ConductorInner>>,
    events: EventBus<ConductorEvent>,
}

impl TimeConductor {
    pub fn new(time_system: TimeSystem, bounds: Bounds) -> PlotResult<Self> {
        if !bounds.is_valid() {
            return Err(PlotError::InvalidBounds {
                start: bounds.start,
                end: bounds.end,
            });
        }
        Ok(Self {
            inner: Arc::new(Mutex::new(ConductorInner {
                bounds,
                time_system,
                clock: None,
            })),
            events: EventBus::new(),
        })
    }

    pub fn subscribe(&self) -> (Subscription, Receiver<ConductorEvent>) {
        self.events.subscribe()
    }

    pub fn bounds(&self) -> Bounds {
        lock(&self.inner).bounds
    }

    /// Set bounds explicitly (a non-tick update).
    pub fn set_bounds(&self, bounds: Bounds) -> PlotResult<()> {
        if !bounds.is_valid() {
            return Err(PlotError::InvalidBounds {
                start: bounds.start,
                end: bounds.end,
            });
        }
        lock(&self.inner).bounds = bounds;
        self.events.emit(ConductorEvent::Bounds {
            bounds,
            is_tick: false,
        });
        Ok(())
    }

    pub fn time_system(&self) -> TimeSystem {
        lock(&self.inner).time_system.clone()
    }

    pub fn set_time_system(&self, time_system: TimeSystem) {
        lock(&self.inner).time_system = time_system.clone();
        self.events.emit(ConductorEvent::TimeSystem(time_system));
    }

    /// Active live clock, if any.
    pub fn clock(&self) -> Option<Clock> {
        lock(&self.inner).clock.clone()
    }

    pub fn set_clock(&self, clock: Option<Clock>) {
        lock(&self.inner).clock = clock.clone();
        self.events.emit(ConductorEvent::Clock(clock));
    }

    /// Advance the bounds to `now` plus the clock offsets and announce a tick.
    /// Returns `false` without doing anything when no clock is active.
    pub fn tick(&self, now: f64) -> bool {
        let bounds = {
            let mut inner = lock(&self.inner);
            let Some(offsets) = inner.clock.as_ref().map(|c| c.offsets) else {
                return false;
            };
            inner.bounds = Bounds::new(now + offsets.start, now + offsets.end);
            inner.bounds
        };
        self.events.emit(ConductorEvent::Bounds {
            bounds,
            is_tick: true,
        });
        true
    }
}

/// Source of wall-clock milliseconds, used for purge throttling.
pub trait WallClock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(start_ms)))
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl WallClock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conductor() -> TimeConductor {
        TimeConductor::new(TimeSystem::utc(), Bounds::new(0.0, 100.0)).unwrap()
    }

    #[test]
    fn set_bounds_announces_non_tick() {
        let tc = conductor();
        let (_sub, rx) = tc.subscribe();
        tc.set_bounds(Bounds::new(10.0, 20.0)).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ConductorEvent::Bounds {
                bounds: Bounds::new(10.0, 20.0),
                is_tick: false
            }
        );
        assert_eq!(tc.bounds(), Bounds::new(10.0, 20.0));
    }

    #[test]
    fn invalid_bounds_rejected() {
        let tc = conductor();
        assert!(matches!(
            tc.set_bounds(Bounds::new(5.0, 1.0)),
            Err(PlotError::InvalidBounds { .. })
        ));
        assert_eq!(tc.bounds(), Bounds::new(0.0, 100.0));
    }

    #[test]
    fn tick_requires_clock() {
        let tc = conductor();
        let (_sub, rx) = tc.subscribe();
        assert!(!tc.tick(500.0));
        assert!(rx.try_recv().is_err());

        tc.set_clock(Some(Clock {
            key: "local".into(),
            offsets: ClockOffsets {
                start: -30.0,
                end: 5.0,
            },
        }));
        let _ = rx.try_recv();
        assert!(tc.tick(500.0));
        assert_eq!(
            rx.try_recv().unwrap(),
            ConductorEvent::Bounds {
                bounds: Bounds::new(470.0, 505.0),
                is_tick: true
            }
        );
    }

    #[test]
    fn manual_clock_shares_time() {
        let c = ManualClock::new(10);
        let c2 = c.clone();
        c.advance(5);
        assert_eq!(c2.now_ms(), 15);
        c2.set(0);
        assert_eq!(c.now_ms(), 0);
    }
}
