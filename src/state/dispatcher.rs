//! Per-grid publish/subscribe hub

use crate::state::events::{Channel, GridEvent};
use std::fmt;
use tracing::{debug, info};

/// Trait for components that subscribe to grid notifications
pub trait GridSubscriber {
    /// Handle a grid event
    fn on_event(&mut self, event: &GridEvent);

    /// Get subscriber name for debugging
    fn name(&self) -> &str;
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct FnSubscriber<F> {
    name: String,
    callback: F,
}

impl<F: FnMut(&GridEvent)> GridSubscriber for FnSubscriber<F> {
    fn on_event(&mut self, event: &GridEvent) {
        (self.callback)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct Subscription {
    id: SubscriptionId,
    channel: Channel,
    subscriber: Box<dyn GridSubscriber>,
}

/// Typed callback registry owned by a single grid instance.
///
/// Delivery is synchronous and unbuffered: a subscriber added after an
/// event was published never sees it.
pub struct EventChannel {
    subscriptions: Vec<Subscription>,
    next_id: u64,

    /// Event history for debugging
    event_history: Vec<GridEvent>,

    /// Maximum event history size
    max_history: usize,
}

impl EventChannel {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
            event_history: Vec::new(),
            max_history: 100,
        }
    }

    /// Add a subscriber on one channel
    pub fn subscribe(
        &mut self,
        channel: Channel,
        subscriber: Box<dyn GridSubscriber>,
    ) -> SubscriptionId {
        info!(
            "EventChannel: Adding subscriber {} on {:?}",
            subscriber.name(),
            channel
        );
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            channel,
            subscriber,
        });
        id
    }

    /// Add a closure subscriber on one channel
    pub fn subscribe_fn<F>(
        &mut self,
        channel: Channel,
        name: impl Into<String>,
        callback: F,
    ) -> SubscriptionId
    where
        F: FnMut(&GridEvent) + 'static,
    {
        self.subscribe(
            channel,
            Box::new(FnSubscriber {
                name: name.into(),
                callback,
            }),
        )
    }

    /// Remove a subscriber. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Deliver an event to every subscriber of its channel
    pub fn publish(&mut self, event: GridEvent) {
        let channel = event.channel();
        debug!("EventChannel: Publishing {:?}", channel);

        for subscription in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.channel == channel)
        {
            debug!(
                "EventChannel: Notifying subscriber: {}",
                subscription.subscriber.name()
            );
            subscription.subscriber.on_event(&event);
        }

        self.event_history.push(event);
        if self.event_history.len() > self.max_history {
            self.event_history.remove(0);
        }
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.channel == channel)
            .count()
    }

    /// Get event history for debugging
    pub fn get_event_history(&self) -> &[GridEvent] {
        &self.event_history
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscriptions", &self.subscriptions.len())
            .field("history", &self.event_history.len())
            .finish()
    }
}
