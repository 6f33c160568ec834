//! One broadcast registry per entity type.

use std::sync::Arc;

use checkmate_core::{BroadcastRegistry, ContinuityConfig};

use crate::model::{Book, Borrow, BorrowBatch, Feed, Reader, User};

/// Registry for one entity feed.
pub type FeedRegistry<E> = BroadcastRegistry<Feed<E>>;

/// The live feeds of the library, each kept alive with `Feed::End` heartbeats.
pub struct LibraryContinuity {
    pub books: Arc<FeedRegistry<Book>>,
    pub readers: Arc<FeedRegistry<Reader>>,
    pub borrows: Arc<FeedRegistry<Borrow>>,
    pub borrow_batches: Arc<FeedRegistry<BorrowBatch>>,
    pub users: Arc<FeedRegistry<User>>,
}

impl LibraryContinuity {
    /// Create all feeds and start their heartbeats.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &ContinuityConfig) -> Self {
        Self {
            books: BroadcastRegistry::with_heartbeat("books", Feed::End, config.clone()),
            readers: BroadcastRegistry::with_heartbeat("readers", Feed::End, config.clone()),
            borrows: BroadcastRegistry::with_heartbeat("borrows", Feed::End, config.clone()),
            borrow_batches: BroadcastRegistry::with_heartbeat(
                "borrow_batches",
                Feed::End,
                config.clone(),
            ),
            users: BroadcastRegistry::with_heartbeat("users", Feed::End, config.clone()),
        }
    }

    /// Total parked subscribers across all feeds.
    pub fn parked_total(&self) -> usize {
        self.books.parked_count()
            + self.readers.parked_count()
            + self.borrows.parked_count()
            + self.borrow_batches.parked_count()
            + self.users.parked_count()
    }

    /// Stop every heartbeat and release every parked subscriber.
    pub fn shutdown(&self) {
        self.books.shutdown();
        self.readers.shutdown();
        self.borrows.shutdown();
        self.borrow_batches.shutdown();
        self.users.shutdown();
    }
}
