//! Broadcast registry for parked subscription streams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::subscriber::{StreamWriter, Subscriber, SubscriberId};
use crate::config::ContinuityConfig;
use crate::error::{Error, Result, WriteError};
use crate::gate::SignalGate;

/// A parked subscriber: its writer and the gate its `park` call waits on.
struct Parked<T: Send + 'static> {
    writer: Arc<dyn StreamWriter<T>>,
    gate: Arc<SignalGate>,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the message.
    pub delivered: usize,
    /// Subscribers whose write failed and were released.
    pub pruned: usize,
}

impl BroadcastReport {
    /// Number of subscribers the broadcast tried to reach.
    pub fn attempted(&self) -> usize {
        self.delivered + self.pruned
    }
}

/// Registry of parked subscription streams for one entity type.
///
/// Each parked subscriber occupies the task that called [`park`] until its
/// gate opens, either through [`release`], through a failed delivery during
/// [`broadcast`], or through [`shutdown`].
///
/// [`park`]: BroadcastRegistry::park
/// [`release`]: BroadcastRegistry::release
/// [`broadcast`]: BroadcastRegistry::broadcast
/// [`shutdown`]: BroadcastRegistry::shutdown
pub struct BroadcastRegistry<T: Send + 'static> {
    topic: String,
    config: ContinuityConfig,
    parked: Mutex<HashMap<SubscriberId, Parked<T>>>,
    /// Broadcasts take turns in arrival order so each subscriber sees
    /// messages in the order their broadcasts started.
    turn: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl<T> BroadcastRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a registry without a heartbeat.
    pub fn new(topic: impl Into<String>, config: ContinuityConfig) -> Self {
        Self {
            topic: topic.into(),
            config,
            parked: Mutex::new(HashMap::new()),
            turn: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            heartbeat: Mutex::new(None),
        }
    }

    /// Create a registry that broadcasts `payload` every heartbeat interval.
    ///
    /// Must be called from within a tokio runtime. The first heartbeat goes
    /// out immediately.
    pub fn with_heartbeat(
        topic: impl Into<String>,
        payload: T,
        config: ContinuityConfig,
    ) -> Arc<Self> {
        let registry = Arc::new(Self::new(topic, config));
        let task = registry.spawn_heartbeat(payload);
        *registry.heartbeat.lock() = Some(task);
        registry
    }

    fn spawn_heartbeat(self: &Arc<Self>, payload: T) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let topic = self.topic.clone();
        let period = self.config.heartbeat_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                let report = registry.broadcast(payload.clone()).await;
                trace!(
                    topic = %topic,
                    delivered = report.delivered,
                    pruned = report.pruned,
                    "heartbeat sent"
                );
            }
            debug!(topic = %topic, "heartbeat stopped");
        })
    }

    /// Park a subscriber until it is released.
    ///
    /// Returns once the subscriber's gate opens. The subscriber is no longer
    /// in the registry when this returns, and is also removed if the returned
    /// future is dropped early.
    pub async fn park(&self, subscriber: Subscriber<T>) -> Result<()> {
        let id = subscriber.id();
        let gate = Arc::new(SignalGate::closed());

        {
            let mut parked = self.parked.lock();
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::RegistryClosed(self.topic.clone()));
            }
            if parked.contains_key(&id) {
                return Err(Error::AlreadyParked(id));
            }
            parked.insert(
                id,
                Parked {
                    writer: subscriber.into_writer(),
                    gate: Arc::clone(&gate),
                },
            );
        }

        let _unpark = Unpark {
            registry: self,
            id,
            gate: Arc::clone(&gate),
        };

        debug!(topic = %self.topic, subscriber = %id, "subscriber parked");
        gate.wait_open().await;
        debug!(topic = %self.topic, subscriber = %id, "subscriber unparked");

        Ok(())
    }

    /// Broadcast a message to every parked subscriber.
    ///
    /// Writes run concurrently. A subscriber whose write fails or times out
    /// is released; that never affects delivery to the others and is never
    /// reported as an error. Completes once every write has settled.
    pub async fn broadcast(&self, message: T) -> BroadcastReport {
        let _turn = self.turn.lock().await;

        let targets: Vec<(SubscriberId, Arc<dyn StreamWriter<T>>)> = self
            .parked
            .lock()
            .iter()
            .map(|(id, parked)| (*id, Arc::clone(&parked.writer)))
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let deliveries = targets
            .into_iter()
            .map(|(id, writer)| self.deliver(id, writer, message.clone()));
        let outcomes = join_all(deliveries).await;

        let delivered = outcomes.iter().filter(|delivered| **delivered).count();
        let report = BroadcastReport {
            delivered,
            pruned: outcomes.len() - delivered,
        };

        trace!(
            topic = %self.topic,
            delivered = report.delivered,
            pruned = report.pruned,
            "broadcast settled"
        );

        report
    }

    async fn deliver(
        &self,
        id: SubscriberId,
        writer: Arc<dyn StreamWriter<T>>,
        message: T,
    ) -> bool {
        let outcome = match timeout(self.config.write_timeout, writer.write(message)).await {
            Ok(result) => result,
            Err(_) => Err(WriteError::TimedOut),
        };

        match outcome {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    topic = %self.topic,
                    subscriber = %id,
                    error = %error,
                    "delivery failed, releasing subscriber"
                );
                if let Err(error) = self.release(id) {
                    // Released concurrently (teardown or an explicit release).
                    debug!(topic = %self.topic, error = %error, "subscriber already gone");
                }
                false
            }
        }
    }
}

impl<T: Send + 'static> BroadcastRegistry<T> {
    /// Release a parked subscriber, letting its `park` call return.
    ///
    /// The subscriber is absent from the registry once this returns.
    /// Releasing a subscriber that is not parked is an error.
    pub fn release(&self, id: SubscriberId) -> Result<()> {
        let parked = self
            .parked
            .lock()
            .remove(&id)
            .ok_or(Error::UnknownSubscriber(id))?;
        parked.gate.open();

        debug!(topic = %self.topic, subscriber = %id, "subscriber released");
        Ok(())
    }

    /// Tear the registry down.
    ///
    /// Stops the heartbeat and opens every outstanding gate so no parked
    /// task is left suspended. Later `park` calls fail.
    pub fn shutdown(&self) {
        let drained: Vec<(SubscriberId, Parked<T>)> = {
            let mut parked = self.parked.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            parked.drain().collect()
        };

        if let Some(task) = self.heartbeat.lock().take() {
            task.abort();
        }

        let released = drained.len();
        for (_, parked) in drained {
            parked.gate.shutdown();
        }

        info!(topic = %self.topic, released, "registry shut down");
    }

    /// Identifiers of the currently parked subscribers.
    pub fn parked(&self) -> Vec<SubscriberId> {
        self.parked.lock().keys().copied().collect()
    }

    /// Number of currently parked subscribers.
    pub fn parked_count(&self) -> usize {
        self.parked.lock().len()
    }

    /// Check whether a subscriber is parked.
    pub fn is_parked(&self, id: SubscriberId) -> bool {
        self.parked.lock().contains_key(&id)
    }

    /// Topic name, used in logs and errors.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Check whether the registry has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check whether a heartbeat task is running.
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    fn remove_if_current(&self, id: SubscriberId, gate: &Arc<SignalGate>) {
        let mut parked = self.parked.lock();
        if parked
            .get(&id)
            .map(|entry| Arc::ptr_eq(&entry.gate, gate))
            .unwrap_or(false)
        {
            parked.remove(&id);
        }
    }
}

impl<T: Send + 'static> Drop for BroadcastRegistry<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Removes a parked entry when `park` finishes or is cancelled.
struct Unpark<'a, T: Send + 'static> {
    registry: &'a BroadcastRegistry<T>,
    id: SubscriberId,
    gate: Arc<SignalGate>,
}

impl<T: Send + 'static> Drop for Unpark<'_, T> {
    fn drop(&mut self) {
        self.registry.remove_if_current(self.id, &self.gate);
    }
}
