//! Grid notifications
//!
//! Each grid owns one `EventChannel`; components publish to it after a
//! state change and hosts subscribe per channel.

pub mod dispatcher;
pub mod events;

pub use dispatcher::{EventChannel, GridSubscriber, SubscriptionId};
pub use events::{Channel, GridEvent};
