use crossbeam_channel::{Receiver, Sender};

use crate::media::types::LifecycleEvent;

/// Fans lifecycle events out to every subscriber.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<LifecycleEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<LifecycleEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Delivers `event`; subscribers whose receiver is gone are dropped.
    pub fn emit(&mut self, event: LifecycleEvent) {
        log::debug!("Lifecycle event: {event:?}");
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_event() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(LifecycleEvent::DidStart);
        bus.emit(LifecycleEvent::DidStop);
        assert_eq!(a.try_iter().collect::<Vec<_>>(), vec![LifecycleEvent::DidStart, LifecycleEvent::DidStop]);
        assert_eq!(b.try_iter().count(), 2);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        bus.emit(LifecycleEvent::Done);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv(), Ok(LifecycleEvent::Done));
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let mut bus = EventBus::new();
        bus.emit(LifecycleEvent::PreparedToAnimate);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
