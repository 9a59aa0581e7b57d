//! View scope: the state a plot controller shares with the rendering layer.
//!
//! Holds the bound domain object, the in-flight load counter, the bound view
//! element (its pixel size and last captured frame) and a bus for view
//! signals such as the end of a user pan/zoom or the scope's destruction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use crate::domain::DomainObject;
use crate::events::{lock, EventBus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEvent {
    /// The user finished changing the viewport (drag, box zoom release).
    ViewportChangeEnd,
    /// Renderers should drop any cached line geometry.
    ClearHistory,
    /// The view is going away.
    Destroy,
}

/// Element the plot is drawn into.
#[derive(Debug, Clone, Default)]
pub struct ViewElement {
    pub width_px: f32,
    pub height_px: f32,
    /// Last rendered frame, used by image export.
    pub capture: Option<Arc<egui::ColorImage>>,
}

/// Count of loads started but not yet settled. Clones share the count.
#[derive(Debug, Clone, Default)]
pub struct PendingCounter(Arc<AtomicUsize>);

impl PendingCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Decrement; a decrement at zero is ignored and returns `false`.
    pub fn finish(&self) -> bool {
        let ok = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if !ok {
            log::warn!("pending load counter already at zero");
        }
        ok
    }
}

/// Clones share the same scope.
#[derive(Clone)]
pub struct ViewScope {
    domain_object: Arc<dyn DomainObject>,
    pending: PendingCounter,
    events: EventBus<ScopeEvent>,
    element: Arc<Mutex<ViewElement>>,
}

impl ViewScope {
    pub fn new(domain_object: Arc<dyn DomainObject>) -> Self {
        Self {
            domain_object,
            pending: PendingCounter::default(),
            events: EventBus::new(),
            element: Arc::new(Mutex::new(ViewElement::default())),
        }
    }

    pub fn domain_object(&self) -> &Arc<dyn DomainObject> {
        &self.domain_object
    }

    /// Number of loads in flight.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    pub fn pending_counter(&self) -> &PendingCounter {
        &self.pending
    }

    pub fn subscribe(&self) -> (Subscription, Receiver<ScopeEvent>) {
        self.events.subscribe()
    }

    pub fn broadcast(&self, event: ScopeEvent) -> usize {
        self.events.emit(event)
    }

    pub fn viewport_change_end(&self) {
        self.broadcast(ScopeEvent::ViewportChangeEnd);
    }

    pub fn destroy(&self) {
        self.broadcast(ScopeEvent::Destroy);
    }

    pub fn element(&self) -> ViewElement {
        lock(&self.element).clone()
    }

    pub fn set_element_size(&self, width_px: f32, height_px: f32) {
        let mut el = lock(&self.element);
        el.width_px = width_px;
        el.height_px = height_px;
    }

    pub fn set_capture(&self, image: Arc<egui::ColorImage>) {
        lock(&self.element).capture = Some(image);
    }

    /// Element width rounded to whole pixels, used as the load size hint.
    pub fn element_width_px(&self) -> u32 {
        let w = lock(&self.element).width_px;
        if w.is_finite() && w > 0.0 {
            w.round() as u32
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TelemetryObject;

    #[test]
    fn counter_never_goes_negative() {
        let c = PendingCounter::default();
        assert!(!c.finish());
        assert_eq!(c.start(), 1);
        assert!(c.finish());
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn element_width_hint() {
        let scope = ViewScope::new(Arc::new(TelemetryObject::new("a", "A")));
        assert_eq!(scope.element_width_px(), 0);
        scope.set_element_size(640.4, 480.0);
        assert_eq!(scope.element_width_px(), 640);
    }

    #[test]
    fn broadcast_reaches_subscribers() {
        let scope = ViewScope::new(Arc::new(TelemetryObject::new("a", "A")));
        let (_sub, rx) = scope.subscribe();
        scope.viewport_change_end();
        scope.destroy();
        assert_eq!(rx.try_recv().unwrap(), ScopeEvent::ViewportChangeEnd);
        assert_eq!(rx.try_recv().unwrap(), ScopeEvent::Destroy);
    }
}
