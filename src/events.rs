//! Typed publish/subscribe with explicit subscription handles.
//!
//! An [`EventBus`] delivers every emitted event to each subscriber over its
//! own `mpsc` channel. Subscribing returns a [`Subscription`] handle next to
//! the receiver; releasing the handle detaches the subscriber from the bus so
//! nothing further is queued for it. Subscribers whose receiver was dropped
//! are pruned on the next emit.
//!
//! Owners that listen to several buses record their handles in a
//! [`SubscriptionSet`], keyed by listen target, and release them per target
//! or all at once at teardown.

use std::fmt;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifier of one subscription, unique per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber<E> {
    id: SubscriptionId,
    sender: Sender<E>,
}

struct BusInner<E> {
    next_id: u64,
    subscribers: Vec<Subscriber<E>>,
}

/// Type-erased view of a bus used by [`Subscription::release`].
trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
}

impl<E: Send> Detach for Mutex<BusInner<E>> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut inner = lock(self);
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        inner.subscribers.len() != before
    }
}

/// Multi-subscriber event bus. Clones share the same subscriber list.
pub struct EventBus<E> {
    inner: Arc<Mutex<BusInner<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Subscribe to every event emitted from now on.
    pub fn subscribe(&self) -> (Subscription, Receiver<E>) {
        let (tx, rx) = std::sync::mpsc::channel();
        let id = {
            let mut inner = lock(&self.inner);
            inner.next_id += 1;
            let id = SubscriptionId(inner.next_id);
            inner.subscribers.push(Subscriber { id, sender: tx });
            id
        };
        let erased: Arc<dyn Detach> = self.inner.clone();
        let sub = Subscription {
            id,
            source: Arc::downgrade(&erased),
        };
        (sub, rx)
    }

    /// Deliver `event` to all live subscribers. Returns how many received it.
    pub fn emit(&self, event: E) -> usize {
        let mut inner = lock(&self.inner);
        let mut delivered = 0;
        inner.subscribers.retain(|sub| {
            if sub.sender.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });
        delivered
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.detach(id)
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one registration on an [`EventBus`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::release`].
pub struct Subscription {
    id: SubscriptionId,
    source: Weak<dyn Detach>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Detach from the bus. Returns `false` if the bus no longer exists or
    /// the subscriber was already gone.
    pub fn release(self) -> bool {
        match self.source.upgrade() {
            Some(bus) => bus.detach(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("bus_alive", &(self.source.strong_count() > 0))
            .finish()
    }
}

/// Subscriptions owned by one listener, grouped by the target they listen to.
pub struct SubscriptionSet<K> {
    entries: Vec<(K, Subscription)>,
}

impl<K: PartialEq> SubscriptionSet<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn listen(&mut self, target: K, sub: Subscription) {
        self.entries.push((target, sub));
    }

    pub fn is_listening_to(&self, target: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == target)
    }

    /// Release every subscription held on `target`. Returns how many were held.
    pub fn stop_listening_to(&mut self, target: &K) -> usize {
        let (released, kept): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|(k, _)| k == target);
        self.entries = kept;
        let n = released.len();
        for (_, sub) in released {
            sub.release();
        }
        n
    }

    /// Release everything. Returns how many subscriptions were held.
    pub fn stop_listening(&mut self) -> usize {
        let n = self.entries.len();
        for (_, sub) in self.entries.drain(..) {
            sub.release();
        }
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq> Default for SubscriptionSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_all_subscribers() {
        let bus: EventBus<u32> = EventBus::new();
        let (_a, rx_a) = bus.subscribe();
        let (_b, rx_b) = bus.subscribe();
        assert_eq!(bus.emit(7), 2);
        assert_eq!(rx_a.try_recv().unwrap(), 7);
        assert_eq!(rx_b.try_recv().unwrap(), 7);
    }

    #[test]
    fn released_subscription_gets_nothing() {
        let bus: EventBus<u32> = EventBus::new();
        let (sub, rx) = bus.subscribe();
        assert!(sub.release());
        assert_eq!(bus.emit(1), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_receiver_is_pruned() {
        let bus: EventBus<u32> = EventBus::new();
        let (_sub, rx) = bus.subscribe();
        let (_keep, rx_keep) = bus.subscribe();
        drop(rx);
        assert_eq!(bus.emit(3), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx_keep.try_recv().unwrap(), 3);
    }

    #[test]
    fn release_after_bus_dropped_is_harmless() {
        let bus: EventBus<u32> = EventBus::new();
        let (sub, _rx) = bus.subscribe();
        drop(bus);
        assert!(!sub.release());
    }

    #[test]
    fn subscription_set_releases_per_target() {
        let bus: EventBus<&'static str> = EventBus::new();
        let mut set = SubscriptionSet::new();
        let (a, rx_a) = bus.subscribe();
        let (b, rx_b) = bus.subscribe();
        let (c, rx_c) = bus.subscribe();
        set.listen("series-1", a);
        set.listen("series-1", b);
        set.listen("scope", c);

        assert_eq!(set.stop_listening_to(&"series-1"), 2);
        assert!(!set.is_listening_to(&"series-1"));
        bus.emit("ping");
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(rx_c.try_recv().unwrap(), "ping");

        assert_eq!(set.stop_listening(), 1);
        assert!(set.is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
