//! Credential ledger and the credentials it issues.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::secret;
use crate::config::CredentialConfig;
use crate::gate::SignalGate;

type LiveSet<T> = Mutex<Vec<Arc<Credential<T>>>>;

/// How a credential stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Expires on its own after `lifespan`.
    Timed {
        /// Time from issue to expiry.
        lifespan: Duration,
    },
    /// Valid until explicitly invalidated.
    SingleUse,
}

/// An issued ephemeral credential.
///
/// Carries an optional tag, typically the pending account to create once
/// the secret is redeemed.
pub struct Credential<T> {
    id: u64,
    secret: String,
    kind: CredentialKind,
    created_at: Instant,
    valid: AtomicBool,
    gate: SignalGate,
    tag: Mutex<Option<T>>,
    live: Weak<LiveSet<T>>,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Credential<T> {
    fn new(id: u64, secret: String, kind: CredentialKind, live: Weak<LiveSet<T>>) -> Self {
        Self {
            id,
            secret,
            kind,
            created_at: Instant::now(),
            valid: AtomicBool::new(true),
            gate: SignalGate::closed(),
            tag: Mutex::new(None),
            live,
            expiry: Mutex::new(None),
        }
    }

    /// Ledger-local identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The secret value.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Timed or single-use.
    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    /// Lifespan of a timed credential.
    pub fn lifespan(&self) -> Option<Duration> {
        match self.kind {
            CredentialKind::Timed { lifespan } => Some(lifespan),
            CredentialKind::SingleUse => None,
        }
    }

    /// Time left before a timed credential expires.
    pub fn remaining(&self) -> Option<Duration> {
        self.lifespan()
            .map(|lifespan| lifespan.saturating_sub(self.created_at.elapsed()))
    }

    /// Check whether the credential can still be redeemed.
    pub fn is_valid(&self) -> bool {
        if !self.valid.load(Ordering::Acquire) {
            return false;
        }
        match self.kind {
            CredentialKind::SingleUse => true,
            CredentialKind::Timed { lifespan } => self.created_at.elapsed() < lifespan,
        }
    }

    /// Invalidate the credential.
    ///
    /// Removes it from the ledger, cancels its expiry timer and wakes every
    /// task awaiting invalidation. Later calls do nothing.
    pub fn invalidate(&self) {
        if !self.valid.swap(false, Ordering::AcqRel) {
            trace!(credential = self.id, "credential already invalidated");
            return;
        }

        if let Some(live) = self.live.upgrade() {
            live.lock().retain(|credential| credential.id != self.id);
        }
        if let Some(timer) = self.expiry.lock().take() {
            timer.abort();
        }
        self.gate.shutdown();

        debug!(credential = self.id, kind = ?self.kind, "credential invalidated");
    }

    /// Wait until the credential has been invalidated, manually or by expiry.
    pub async fn await_invalidation(&self) {
        self.gate.wait_open().await;
    }

    /// Attach a tag, replacing any previous one.
    pub fn set_tag(&self, tag: T) {
        *self.tag.lock() = Some(tag);
    }

    /// Remove and return the tag.
    pub fn take_tag(&self) -> Option<T> {
        self.tag.lock().take()
    }

    /// Check whether a tag is attached.
    pub fn has_tag(&self) -> bool {
        self.tag.lock().is_some()
    }

    /// Clone the tag.
    pub fn tag(&self) -> Option<T>
    where
        T: Clone,
    {
        self.tag.lock().clone()
    }
}

impl<T> fmt::Debug for Credential<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// Set of live ephemeral credentials.
pub struct CredentialLedger<T> {
    live: Arc<LiveSet<T>>,
    config: CredentialConfig,
    next_id: AtomicU64,
}

impl<T: Send + 'static> CredentialLedger<T> {
    /// Create an empty ledger.
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            live: Arc::new(Mutex::new(Vec::new())),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue a credential of `length` digits that expires after `lifespan`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn issue_timed(&self, lifespan: Duration, length: usize) -> Arc<Credential<T>> {
        let credential = self.admit(secret::numeric(length), CredentialKind::Timed { lifespan });

        let weak = Arc::downgrade(&credential);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(lifespan).await;
            if let Some(credential) = weak.upgrade() {
                debug!(credential = credential.id, "credential expired");
                credential.invalidate();
            }
        });
        *credential.expiry.lock() = Some(timer);

        credential
    }

    /// Issue a timed credential with the configured lifespan and length.
    pub fn issue_timed_default(&self) -> Arc<Credential<T>> {
        self.issue_timed(self.config.timed_lifespan, self.config.timed_length)
    }

    /// Issue a credential of `length` hex characters with no deadline.
    pub fn issue_single_use(&self, length: usize) -> Arc<Credential<T>> {
        self.admit(secret::hexadecimal(length), CredentialKind::SingleUse)
    }

    /// Issue a single-use credential with the configured length.
    pub fn issue_single_use_default(&self) -> Arc<Credential<T>> {
        self.issue_single_use(self.config.single_use_length)
    }

    /// Admit a single-use credential with a caller-chosen secret.
    pub fn register_single_use(&self, secret: impl Into<String>) -> Arc<Credential<T>> {
        self.admit(secret.into(), CredentialKind::SingleUse)
    }

    fn admit(&self, secret: String, kind: CredentialKind) -> Arc<Credential<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let credential = Arc::new(Credential::new(id, secret, kind, Arc::downgrade(&self.live)));
        self.live.lock().push(Arc::clone(&credential));

        debug!(credential = id, kind = ?kind, "credential issued");
        credential
    }
}

impl<T> CredentialLedger<T> {
    /// Find the first live credential with this secret that is still valid.
    pub fn find_valid(&self, secret: &str) -> Option<Arc<Credential<T>>> {
        self.live
            .lock()
            .iter()
            .find(|credential| credential.is_valid() && credential.secret == secret)
            .cloned()
    }

    /// Snapshot of the live credentials, in issue order.
    pub fn live(&self) -> Vec<Arc<Credential<T>>> {
        self.live.lock().clone()
    }

    /// Number of live credentials.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Invalidate every live credential. Dropping the ledger does the same.
    pub fn shutdown(&self) {
        let outstanding = self.live();
        let count = outstanding.len();
        for credential in outstanding {
            credential.invalidate();
        }
        info!(invalidated = count, "credential ledger shut down");
    }
}

impl<T> Drop for CredentialLedger<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Send + 'static> Default for CredentialLedger<T> {
    fn default() -> Self {
        Self::new(CredentialConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    fn ledger() -> CredentialLedger<String> {
        CredentialLedger::default()
    }

    #[tokio::test]
    async fn test_issue_timed() {
        let ledger = ledger();
        let credential = ledger.issue_timed(Duration::from_secs(45), 8);

        assert_eq!(credential.secret().len(), 8);
        assert!(credential.secret().chars().all(|c| c.is_ascii_digit()));
        assert_eq!(
            credential.kind(),
            CredentialKind::Timed {
                lifespan: Duration::from_secs(45)
            }
        );
        assert!(credential.is_valid());
        assert_eq!(ledger.live_count(), 1);
    }

    #[tokio::test]
    async fn test_issue_single_use() {
        let ledger = ledger();
        let credential = ledger.issue_single_use(24);

        assert_eq!(credential.secret().len(), 24);
        assert_eq!(credential.kind(), CredentialKind::SingleUse);
        assert!(credential.lifespan().is_none());
        assert!(credential.remaining().is_none());
        assert!(credential.is_valid());
    }

    #[tokio::test]
    async fn test_timed_expiry_boundary() {
        let ledger = ledger();
        let credential = ledger.issue_timed(Duration::from_millis(150), 8);
        let secret = credential.secret().to_string();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(credential.is_valid());
        assert!(ledger.find_valid(&secret).is_some());
        assert!(credential.remaining().unwrap() > Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!credential.is_valid());
        assert!(ledger.find_valid(&secret).is_none());
        assert_eq!(ledger.live_count(), 0);
        assert_eq!(credential.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_unbounded_lifespan() {
        let ledger = ledger();
        let credential = ledger.issue_timed(Duration::MAX, 8);
        let secret = credential.secret().to_string();

        assert!(credential.is_valid());
        assert_eq!(ledger.find_valid(&secret).unwrap().id(), credential.id());
        assert!(credential.remaining().unwrap() > Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_single_use_lifecycle() {
        let ledger = ledger();
        let credential = ledger.register_single_use("7f3a9c");

        let found = ledger.find_valid("7f3a9c").expect("credential should be valid");
        assert_eq!(found.id(), credential.id());

        credential.invalidate();
        assert!(!credential.is_valid());
        assert!(ledger.find_valid("7f3a9c").is_none());
        assert_eq!(ledger.live_count(), 0);
    }

    #[tokio::test]
    async fn test_find_valid_miss() {
        let ledger = ledger();
        ledger.issue_single_use(24);
        assert!(ledger.find_valid("not-a-secret").is_none());
    }

    #[tokio::test]
    async fn test_find_valid_prefers_first_issued() {
        let ledger = ledger();
        let first = ledger.register_single_use("shared");
        let second = ledger.register_single_use("shared");

        assert_eq!(ledger.find_valid("shared").unwrap().id(), first.id());

        first.invalidate();
        assert_eq!(ledger.find_valid("shared").unwrap().id(), second.id());
    }

    #[tokio::test]
    async fn test_await_invalidation_manual() {
        let ledger = ledger();
        let credential = ledger.issue_single_use(24);

        assert!(timeout(SHORT, credential.await_invalidation()).await.is_err());

        let waiter = {
            let credential = Arc::clone(&credential);
            tokio::spawn(async move { credential.await_invalidation().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        credential.invalidate();
        timeout(SHORT, waiter).await.unwrap().unwrap();

        // Invalidation is terminal: later waits return at once.
        timeout(SHORT, credential.await_invalidation()).await.unwrap();
    }

    #[tokio::test]
    async fn test_await_invalidation_by_timer() {
        let ledger = ledger();
        let credential = ledger.issue_timed(Duration::from_millis(40), 8);

        timeout(Duration::from_secs(1), credential.await_invalidation())
            .await
            .expect("timer should invalidate the credential");
        assert!(!credential.is_valid());
        assert_eq!(ledger.live_count(), 0);
    }

    #[tokio::test]
    async fn test_double_invalidation_is_noop() {
        let ledger = ledger();
        let credential = ledger.issue_timed(Duration::from_millis(30), 8);
        let other = ledger.issue_single_use(24);

        credential.invalidate();
        credential.invalidate();

        // Let the (cancelled) timer's deadline pass.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!credential.is_valid());
        assert!(other.is_valid());
        assert_eq!(ledger.live_count(), 1);
    }

    #[tokio::test]
    async fn test_tag_slot() {
        let ledger = ledger();
        let credential = ledger.issue_single_use(24);
        assert!(!credential.has_tag());

        credential.set_tag("admin".to_string());
        assert_eq!(credential.tag(), Some("admin".to_string()));
        assert_eq!(credential.take_tag(), Some("admin".to_string()));
        assert!(credential.tag().is_none());
    }

    #[tokio::test]
    async fn test_default_issue_uses_config() {
        let config = CredentialConfig::new()
            .with_timed_length(6)
            .with_single_use_length(12);
        let ledger: CredentialLedger<()> = CredentialLedger::new(config);

        assert_eq!(ledger.issue_timed_default().secret().len(), 6);
        assert_eq!(ledger.issue_single_use_default().secret().len(), 12);
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let ledger = ledger();
        let timed = ledger.issue_timed(Duration::from_secs(60), 8);
        let single = ledger.issue_single_use(24);

        let waiters: Vec<_> = [Arc::clone(&timed), Arc::clone(&single)]
            .into_iter()
            .map(|credential| tokio::spawn(async move { credential.await_invalidation().await }))
            .collect();

        ledger.shutdown();
        for waiter in waiters {
            timeout(SHORT, waiter).await.unwrap().unwrap();
        }
        assert_eq!(ledger.live_count(), 0);
        assert!(!timed.is_valid());
        assert!(!single.is_valid());
    }

    #[tokio::test]
    async fn test_drop_invalidates_outstanding() {
        let ledger = ledger();
        let single = ledger.issue_single_use(24);
        let timed = ledger.issue_timed(Duration::from_secs(60), 8);

        let waiter = {
            let single = Arc::clone(&single);
            tokio::spawn(async move { single.await_invalidation().await })
        };

        drop(ledger);
        timeout(SHORT, waiter).await.unwrap().unwrap();
        timeout(SHORT, timed.await_invalidation()).await.unwrap();
        assert!(!single.is_valid());
        assert!(!timed.is_valid());
    }
}
