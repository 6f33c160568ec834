//! Checkmate core library.
//!
//! Concurrency primitives shared by the Checkmate library backend:
//!
//! - [`SignalGate`]: single-slot async wait/notify gate
//! - [`BroadcastRegistry`]: keeps server-pushed subscription streams parked,
//!   fans updates out to them, sends heartbeats and prunes dead subscribers
//! - [`CredentialLedger`]: time-limited and single-use credentials whose
//!   invalidation can be awaited

pub mod config;
pub mod continuity;
pub mod credential;
pub mod error;
pub mod gate;

pub use config::{ContinuityConfig, CredentialConfig};
pub use continuity::{BroadcastReport, BroadcastRegistry, StreamWriter, Subscriber, SubscriberId};
pub use credential::{Credential, CredentialKind, CredentialLedger};
pub use error::{Error, Result, WriteError};
pub use gate::SignalGate;
