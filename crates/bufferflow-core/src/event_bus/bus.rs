//! In-process event hub.

use parking_lot::RwLock;

use super::events::{EventSink, HubEvent};

type EventHandler = Box<dyn Fn(HubEvent) + Send + Sync>;

/// Hub that hands every published event to each subscriber
pub struct EventBus {
    handlers: RwLock<Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Add a handler for every future event
    ///
    /// The handler runs on the publishing thread, which for line events is
    /// the port's reader thread. Keep it short.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(HubEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write();
        handlers.push(Box::new(handler));
        tracing::debug!("Event bus now has {} subscribers", handlers.len());
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver an event to every handler, returning how many saw it
    pub fn dispatch(&self, event: HubEvent) -> usize {
        let handlers = self.handlers.read();
        for handler in handlers.iter() {
            handler(event.clone());
        }
        handlers.len()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: HubEvent) {
        self.dispatch(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
