//! Account and session repository.
//!
//! The service layer only talks to accounts through [`AccountStore`]. The
//! relational implementation lives with the schema; [`MemoryAccountStore`]
//! keeps everything in process for the standalone binary and tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use checkmate_core::credential::secret;

use crate::error::{Error, Result};
use crate::model::{NewAccount, Session, User};

/// Session token length in bytes.
pub const SESSION_TOKEN_BYTES: usize = 24;

/// Account and session repository.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Resolve a session token to its user.
    async fn user_by_token(&self, token: &str) -> Result<Option<User>>;

    /// Find the user registered with this password on this device.
    async fn user_by_password(&self, password: &str, device_name: &str) -> Result<Option<User>>;

    /// All users.
    async fn users(&self) -> Result<Vec<User>>;

    /// Check whether any user exists.
    async fn has_users(&self) -> Result<bool>;

    /// Create a user.
    async fn add_user(&self, account: NewAccount) -> Result<User>;

    /// Replace a user's role and reader link.
    async fn update_user(&self, user: User) -> Result<User>;

    /// Set a new password for a user.
    async fn update_password(&self, user_id: i64, password: &str) -> Result<User>;

    /// Delete a user together with its sessions.
    async fn delete_user(&self, user_id: i64) -> Result<User>;

    /// Open a session for a user and return its token.
    async fn begin_session(&self, os: &str, user_id: i64) -> Result<String>;

    /// Close a session, returning it if it existed.
    async fn revoke_session(&self, token: &str) -> Result<Option<Session>>;
}

struct StoredUser {
    user: User,
    password_hash: String,
}

fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// In-process account store.
pub struct MemoryAccountStore {
    users: RwLock<Vec<StoredUser>>,
    sessions: DashMap<String, Session>,
    next_user_id: AtomicI64,
}

impl MemoryAccountStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            sessions: DashMap::new(),
            next_user_id: AtomicI64::new(1),
        }
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn find_user(&self, user_id: i64) -> Option<User> {
        self.users
            .read()
            .iter()
            .find(|stored| stored.user.id == user_id)
            .map(|stored| stored.user.clone())
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn user_by_token(&self, token: &str) -> Result<Option<User>> {
        let user_id = match self.sessions.get(token) {
            Some(session) => session.user_id,
            None => return Ok(None),
        };
        Ok(self.find_user(user_id))
    }

    async fn user_by_password(&self, password: &str, device_name: &str) -> Result<Option<User>> {
        let hash = hash_password(password);
        Ok(self
            .users
            .read()
            .iter()
            .find(|stored| stored.password_hash == hash && stored.user.device_name == device_name)
            .map(|stored| stored.user.clone()))
    }

    async fn users(&self) -> Result<Vec<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .map(|stored| stored.user.clone())
            .collect())
    }

    async fn has_users(&self) -> Result<bool> {
        Ok(!self.users.read().is_empty())
    }

    async fn add_user(&self, account: NewAccount) -> Result<User> {
        let password_hash = hash_password(&account.password);
        let mut users = self.users.write();
        if users.iter().any(|stored| {
            stored.password_hash == password_hash && stored.user.device_name == account.device_name
        }) {
            return Err(Error::Store(format!(
                "password already in use on device {}",
                account.device_name
            )));
        }

        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::Relaxed),
            device_name: account.device_name,
            role: account.role,
            reader_id: account.reader_id,
        };
        users.push(StoredUser {
            user: user.clone(),
            password_hash,
        });

        tracing::debug!(user = user.id, role = ?user.role, "user added");
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User> {
        let mut users = self.users.write();
        let stored = users
            .iter_mut()
            .find(|stored| stored.user.id == user.id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user.id)))?;

        stored.user.role = user.role;
        stored.user.reader_id = user.reader_id;
        Ok(stored.user.clone())
    }

    async fn update_password(&self, user_id: i64, password: &str) -> Result<User> {
        let mut users = self.users.write();
        let stored = users
            .iter_mut()
            .find(|stored| stored.user.id == user_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;

        stored.password_hash = hash_password(password);
        tracing::debug!(user = user_id, "password changed");
        Ok(stored.user.clone())
    }

    async fn delete_user(&self, user_id: i64) -> Result<User> {
        let user = {
            let mut users = self.users.write();
            let index = users
                .iter()
                .position(|stored| stored.user.id == user_id)
                .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
            users.remove(index).user
        };
        self.sessions.retain(|_, session| session.user_id != user_id);

        tracing::debug!(user = user_id, "user deleted");
        Ok(user)
    }

    async fn begin_session(&self, os: &str, user_id: i64) -> Result<String> {
        let user = self
            .find_user(user_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;

        let token = secret::hexadecimal(SESSION_TOKEN_BYTES * 2);
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                os: os.to_string(),
                device_name: user.device_name,
                created_at: Utc::now(),
            },
        );

        tracing::debug!(user = user_id, os, "session started");
        Ok(token)
    }

    async fn revoke_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.remove(token).map(|(_, session)| session))
    }
}
