//! Library endpoints: live list feeds, change notifications and account
//! creation.
//!
//! Row storage belongs to the catalog repository; list endpoints receive the
//! rows it returned and stream them before parking the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use checkmate_core::{BroadcastReport, CredentialLedger, StreamWriter, Subscriber};

use crate::accounts::AccountStore;
use crate::config::ServerConfig;
use crate::continuity::{FeedRegistry, LibraryContinuity};
use crate::error::{Error, Result};
use crate::model::{
    AddUserResponse, Book, Borrow, BorrowBatch, Feed, Keyed, PendingAccount, Reader, User,
    UserRole, UserUpdate,
};

/// Library service.
pub struct LibraryService {
    accounts: Arc<dyn AccountStore>,
    continuity: Arc<LibraryContinuity>,
    credentials: Arc<CredentialLedger<PendingAccount>>,
    add_user_lifespan: Duration,
    timed_length: usize,
}

impl LibraryService {
    /// Create a library service.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        continuity: Arc<LibraryContinuity>,
        credentials: Arc<CredentialLedger<PendingAccount>>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            accounts,
            continuity,
            credentials,
            add_user_lifespan: config.add_user_lifespan,
            timed_length: config.credentials.timed_length,
        }
    }

    /// The feed registries.
    pub fn continuity(&self) -> &Arc<LibraryContinuity> {
        &self.continuity
    }

    async fn session_user(&self, token: &str) -> Result<User> {
        self.accounts
            .user_by_token(token)
            .await?
            .ok_or(Error::Unauthorized)
    }

    async fn session_admin(&self, token: &str) -> Result<User> {
        let user = self.session_user(token).await?;
        if user.role != UserRole::Admin {
            return Err(Error::Forbidden);
        }
        Ok(user)
    }

    /// Stream the book snapshot, then keep the caller subscribed.
    pub async fn stream_books(
        &self,
        token: &str,
        books: Vec<Book>,
        subscriber: Subscriber<Feed<Book>>,
    ) -> Result<()> {
        self.session_user(token).await?;
        serve(&self.continuity.books, books, subscriber).await
    }

    /// Stream the reader snapshot, then keep the caller subscribed.
    pub async fn stream_readers(
        &self,
        token: &str,
        readers: Vec<Reader>,
        subscriber: Subscriber<Feed<Reader>>,
    ) -> Result<()> {
        self.session_user(token).await?;
        serve(&self.continuity.readers, readers, subscriber).await
    }

    /// Stream the borrow snapshot, then keep the caller subscribed.
    pub async fn stream_borrows(
        &self,
        token: &str,
        borrows: Vec<Borrow>,
        subscriber: Subscriber<Feed<Borrow>>,
    ) -> Result<()> {
        self.session_user(token).await?;
        serve(&self.continuity.borrows, borrows, subscriber).await
    }

    /// Stream the borrow batch snapshot, then keep the caller subscribed.
    pub async fn stream_borrow_batches(
        &self,
        token: &str,
        batches: Vec<BorrowBatch>,
        subscriber: Subscriber<Feed<BorrowBatch>>,
    ) -> Result<()> {
        self.session_user(token).await?;
        serve(&self.continuity.borrow_batches, batches, subscriber).await
    }

    /// Stream all users to an administrator, then keep them subscribed.
    ///
    /// Anyone else gets a bare `End` and the stream finishes.
    pub async fn stream_users(
        &self,
        token: &str,
        subscriber: Subscriber<Feed<User>>,
    ) -> Result<()> {
        match self.session_admin(token).await {
            Ok(_) => {}
            Err(Error::Unauthorized | Error::Forbidden) => {
                subscriber.write(Feed::End).await?;
                return Ok(());
            }
            Err(error) => return Err(error),
        }

        let users = self.accounts.users().await?;
        serve(&self.continuity.users, users, subscriber).await
    }

    /// Notify book subscribers of a committed change.
    pub async fn publish_book(&self, token: &str, change: Feed<Book>) -> Result<BroadcastReport> {
        self.session_user(token).await?;
        Ok(self.continuity.books.broadcast(change).await)
    }

    /// Notify reader subscribers of a committed change.
    pub async fn publish_reader(
        &self,
        token: &str,
        change: Feed<Reader>,
    ) -> Result<BroadcastReport> {
        self.session_user(token).await?;
        Ok(self.continuity.readers.broadcast(change).await)
    }

    /// Notify borrow subscribers of a committed change.
    pub async fn publish_borrow(
        &self,
        token: &str,
        change: Feed<Borrow>,
    ) -> Result<BroadcastReport> {
        self.session_user(token).await?;
        Ok(self.continuity.borrows.broadcast(change).await)
    }

    /// Notify borrow batch subscribers of a committed change.
    pub async fn publish_borrow_batch(
        &self,
        token: &str,
        change: Feed<BorrowBatch>,
    ) -> Result<BroadcastReport> {
        self.session_user(token).await?;
        Ok(self.continuity.borrow_batches.broadcast(change).await)
    }

    /// Change a user's role and reader link, password, or both.
    /// Administrators only.
    ///
    /// Profile changes are announced on the users feed; a password change
    /// is not visible there.
    pub async fn update_user(&self, token: &str, user_id: i64, update: UserUpdate) -> Result<()> {
        self.session_admin(token).await?;

        if let Some(mut user) = update.user {
            user.id = user_id;
            let updated = self.accounts.update_user(user).await?;
            self.continuity.users.broadcast(Feed::entry(updated)).await;
        }
        if let Some(password) = update.password {
            self.accounts.update_password(user_id, &password).await?;
        }

        info!(user = user_id, "user updated");
        Ok(())
    }

    /// Delete a user. The caller must be an administrator, identified by
    /// password and device.
    pub async fn delete_user(
        &self,
        password: &str,
        device_name: &str,
        user_id: i64,
    ) -> Result<User> {
        match self.accounts.user_by_password(password, device_name).await? {
            Some(sender) if sender.role == UserRole::Admin => {}
            _ => return Err(Error::Forbidden),
        }

        let deleted = self.accounts.delete_user(user_id).await?;
        self.continuity
            .users
            .broadcast(Feed::removed(deleted.key()))
            .await;

        info!(user = user_id, device = device_name, "user deleted");
        Ok(deleted)
    }

    /// Hand out account-creation credentials, one at a time.
    ///
    /// The caller must be an administrator, identified by password and
    /// device. Each round issues a timed credential tagged with `pending`,
    /// writes it to the caller and waits until it is redeemed or expires
    /// before issuing the next one. Ends when the caller is no longer an
    /// administrator or the stream breaks. Returns the number of
    /// credentials handed out.
    pub async fn add_user(
        &self,
        password: &str,
        device_name: &str,
        pending: PendingAccount,
        writer: Arc<dyn StreamWriter<AddUserResponse>>,
    ) -> Result<usize> {
        let mut issued = 0;

        loop {
            let sender = self.accounts.user_by_password(password, device_name).await?;
            if !matches!(sender, Some(ref user) if user.role == UserRole::Admin) {
                if let Err(error) = writer.write(AddUserResponse::Denied).await {
                    debug!(error = %error, "add-user caller gone before denial");
                }
                break;
            }

            let credential = self
                .credentials
                .issue_timed(self.add_user_lifespan, self.timed_length);
            credential.set_tag(pending.clone());

            let granted = AddUserResponse::Granted {
                secret: credential.secret().to_string(),
                lifespan_secs: self.add_user_lifespan.as_secs(),
            };
            if let Err(error) = writer.write(granted).await {
                debug!(error = %error, "add-user stream closed");
                credential.invalidate();
                break;
            }
            issued += 1;

            credential.await_invalidation().await;
        }

        info!(device = device_name, issued, "add-user stream finished");
        Ok(issued)
    }
}

/// Stream the snapshot followed by `End`, then park until released.
async fn serve<E>(
    registry: &FeedRegistry<E>,
    rows: Vec<E>,
    subscriber: Subscriber<Feed<E>>,
) -> Result<()>
where
    E: Keyed + Clone + Send + Sync + 'static,
{
    let count = rows.len();
    for row in rows {
        subscriber.write(Feed::entry(row)).await?;
    }
    subscriber.write(Feed::End).await?;

    debug!(
        topic = registry.topic(),
        subscriber = %subscriber.id(),
        rows = count,
        "snapshot sent"
    );

    registry.park(subscriber).await?;
    Ok(())
}
