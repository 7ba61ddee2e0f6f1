// ABOUTME: Event bus package for switchboard
// ABOUTME: Typed action/observation envelopes and ordered publish/subscribe

pub mod bus;
pub mod types;

pub use bus::{EventBus, SubscriptionId};
pub use types::{
    Action, ActionPayload, Event, EventSource, FileOp, Observation, OBSERVATION_KIND,
};
