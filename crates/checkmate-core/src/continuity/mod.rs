//! Long-lived subscription streams and update fan-out.
//!
//! A list endpoint streams its snapshot, then parks the subscriber in the
//! registry for its entity type. Mutating endpoints broadcast changes to
//! every parked subscriber; a subscriber whose write fails is released.

mod registry;
mod subscriber;

pub use registry::{BroadcastReport, BroadcastRegistry};
pub use subscriber::{StreamWriter, Subscriber, SubscriberId};
