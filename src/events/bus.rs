//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that application threads, the
//! registry and the coordinator can publish without blocking and without
//! being inside a tokio runtime.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Subscriber (one):
//!   app thread (birth/death/migrate) ──┐
//!   registry (priority/activity)     ──┼──► Bus ──► subscriber_listener ──► SubscriberSet
//!   coordinator (phases, apply)      ──┘            (on coordinator runtime)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receiver the event is dropped.
//! - Slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::PatchDone));
    }

    #[test]
    fn receiver_sees_later_events() {
        let bus = Bus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::TriggerIgnored).with_reason("empty"));
        let ev = rx.try_recv().expect("event");
        assert_eq!(ev.kind, EventKind::TriggerIgnored);
        assert_eq!(ev.reason.as_deref(), Some("empty"));
    }
}
