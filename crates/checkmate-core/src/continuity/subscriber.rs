//! Subscriber handles and the stream-writer capability.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WriteError;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a subscriber, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport capability for pushing messages down one open stream.
///
/// This is the only thing a registry needs from the networking layer.
#[async_trait]
pub trait StreamWriter<T: Send + 'static>: Send + Sync {
    /// Write one message to the peer.
    async fn write(&self, message: T) -> Result<(), WriteError>;
}

#[async_trait]
impl<T: Send + 'static> StreamWriter<T> for mpsc::Sender<T> {
    async fn write(&self, message: T) -> Result<(), WriteError> {
        self.send(message).await.map_err(|_| WriteError::Closed)
    }
}

#[async_trait]
impl<T: Send + 'static> StreamWriter<T> for mpsc::UnboundedSender<T> {
    async fn write(&self, message: T) -> Result<(), WriteError> {
        self.send(message).map_err(|_| WriteError::Closed)
    }
}

/// A stream writer paired with its identity.
pub struct Subscriber<T: Send + 'static> {
    id: SubscriberId,
    writer: Arc<dyn StreamWriter<T>>,
}

impl<T: Send + 'static> Subscriber<T> {
    /// Wrap a shared writer under a fresh identity.
    pub fn new(writer: Arc<dyn StreamWriter<T>>) -> Self {
        Self {
            id: SubscriberId::next(),
            writer,
        }
    }

    /// Wrap an owned writer under a fresh identity.
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: StreamWriter<T> + 'static,
    {
        Self::new(Arc::new(writer))
    }

    /// Get the subscriber identity.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Get the underlying writer.
    pub fn writer(&self) -> &Arc<dyn StreamWriter<T>> {
        &self.writer
    }

    /// Write directly to this subscriber, outside of any broadcast.
    ///
    /// List endpoints use this for the initial snapshot before parking.
    pub async fn write(&self, message: T) -> Result<(), WriteError> {
        self.writer.write(message).await
    }

    pub(crate) fn into_writer(self) -> Arc<dyn StreamWriter<T>> {
        self.writer
    }
}

impl<T: Send + 'static> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
