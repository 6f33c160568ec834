//! Checkmate server library.
//!
//! The service layer of the Checkmate library backend: live list feeds for
//! books, readers, borrows, borrow batches and users, change notifications,
//! and account bootstrap through ephemeral credentials.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod continuity;
pub mod error;
pub mod library;
pub mod model;

pub use accounts::{AccountStore, MemoryAccountStore};
pub use auth::AuthenticationService;
pub use config::{Args, ServerConfig};
pub use continuity::{FeedRegistry, LibraryContinuity};
pub use error::Error;
pub use library::LibraryService;
