// ABOUTME: Ordered in-memory publish/subscribe bus for actions and observations
// ABOUTME: Synchronous delivery with a per-subscriber publish-order guarantee

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::types::{Action, Event, Observation};

/// Subscriber callback. Errors are logged and contained by the bus, never
/// propagated to the publisher.
pub type SubscriberFn = dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync;

/// Token returned by `subscribe`, accepted by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: u64,
    handler: Arc<SubscriberFn>,
}

#[derive(Default)]
struct BusState {
    log: Vec<Event>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    next_subscription: u64,
}

/// Ordered, typed publish/subscribe channel carrying actions and observations.
///
/// Publish order == log order == delivery order to any single subscriber.
/// There is no guarantee of cross-subscriber relative timing. Publish,
/// subscribe, and unsubscribe serialize against each other; handlers must not
/// publish re-entrantly (executors publish observations from their own task
/// context instead).
#[derive(Default)]
pub struct EventBus {
    // Held across append + delivery so no two publishes interleave.
    publish_order: Mutex<()>,
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the event to the log and synchronously notify subscribers
    /// registered for its kind. Never blocks on or suspends for subscribers;
    /// subscriber errors are logged and swallowed.
    pub fn publish(&self, event: impl Into<Event>) {
        let event = event.into();
        let _ordering = self.publish_order.lock().expect("event bus lock poisoned");

        let kind = event.kind();
        let handlers: Vec<(u64, Arc<SubscriberFn>)> = {
            let mut state = self.state.lock().expect("event bus lock poisoned");
            state.log.push(event.clone());
            state
                .subscribers
                .get(kind)
                .map(|subs| {
                    subs.iter()
                        .map(|s| (s.id, Arc::clone(&s.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        debug!(kind, subscribers = handlers.len(), "publishing event");

        for (id, handler) in handlers {
            if let Err(e) = handler(&event) {
                warn!("subscriber {} failed handling '{}' event: {:#}", id, kind, e);
            }
        }
    }

    /// Register a handler for a single event kind.
    pub fn subscribe<F>(&self, kind: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut state = self.state.lock().expect("event bus lock poisoned");
        let id = state.next_subscription;
        state.next_subscription += 1;
        state.subscribers.entry(kind.into()).or_default().push(Subscriber {
            id,
            handler: Arc::new(handler),
        });
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns false if the token is unknown.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut state = self.state.lock().expect("event bus lock poisoned");
        for subs in state.subscribers.values_mut() {
            if let Some(index) = subs.iter().position(|s| s.id == subscription.0) {
                subs.remove(index);
                return true;
            }
        }
        false
    }

    /// Read-only view of all logged events with the given kind.
    pub fn query(&self, kind: &str) -> Vec<Event> {
        let state = self.state.lock().expect("event bus lock poisoned");
        state
            .log
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    /// All logged actions, in publish order.
    pub fn actions(&self) -> Vec<Action> {
        let state = self.state.lock().expect("event bus lock poisoned");
        state
            .log
            .iter()
            .filter_map(|e| e.as_action().cloned())
            .collect()
    }

    /// All logged observations, in publish order.
    pub fn observations(&self) -> Vec<Observation> {
        let state = self.state.lock().expect("event bus lock poisoned");
        state
            .log
            .iter()
            .filter_map(|e| e.as_observation().cloned())
            .collect()
    }

    /// The observation answering `action_id`, if one has been published.
    ///
    /// The bus does not deduplicate: if a caller wrongly publishes two
    /// observations for one action, the first in publish order wins here.
    pub fn observation_for(&self, action_id: &str) -> Option<Observation> {
        let state = self.state.lock().expect("event bus lock poisoned");
        state
            .log
            .iter()
            .filter_map(|e| e.as_observation())
            .find(|o| o.action_id == action_id)
            .cloned()
    }

    /// Drop the in-memory log. Subscriptions survive; used between
    /// independent conversational sessions.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("event bus lock poisoned");
        state.log.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("event bus lock poisoned").log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
