//! Entities and the messages streamed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything that can appear in a feed.
pub trait Keyed {
    /// Stable identifier used as the feed entry id.
    fn key(&self) -> String;
}

/// A catalogued book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub name: String,
    pub author: String,
    pub isbn: String,
    pub avatar_uri: String,
    pub stock: u32,
}

/// A library member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reader {
    pub id: String,
    pub name: String,
    pub avatar_uri: String,
    pub tier: u16,
    pub creditability: f32,
}

/// A single borrowed book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrow {
    pub id: String,
    pub reader_id: String,
    pub book_id: String,
    pub time: DateTime<Utc>,
    pub due_time: DateTime<Utc>,
    pub return_time: Option<DateTime<Utc>>,
}

/// Several books borrowed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowBatch {
    pub id: String,
    pub reader_id: String,
    pub time: DateTime<Utc>,
    pub due_time: DateTime<Utc>,
    pub return_time: Option<DateTime<Utc>>,
    pub book_ids: Vec<String>,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Librarian,
    Reader,
}

/// A user account, as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub device_name: String,
    pub role: UserRole,
    pub reader_id: Option<String>,
}

impl Keyed for Book {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for Reader {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for Borrow {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for BorrowBatch {
    fn key(&self) -> String {
        self.id.clone()
    }
}

impl Keyed for User {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// One message on a list stream.
///
/// A list stream carries the snapshot as `Entry` messages, one `End`, and
/// afterwards live changes. `End` doubles as the heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feed<E> {
    /// Inserted or updated record.
    Entry { id: String, value: E },
    /// Deleted record.
    Removed { id: String },
    /// End of snapshot, or heartbeat.
    End,
}

impl<E: Keyed> Feed<E> {
    /// Wrap a record as an entry.
    pub fn entry(value: E) -> Self {
        Self::Entry {
            id: value.key(),
            value,
        }
    }
}

impl<E> Feed<E> {
    /// Announce the deletion of a record.
    pub fn removed(id: impl Into<String>) -> Self {
        Self::Removed { id: id.into() }
    }

    /// Check whether this is the end/heartbeat marker.
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Account parameters attached to a credential until it is redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAccount {
    pub role: UserRole,
    pub reader_id: Option<String>,
}

impl PendingAccount {
    /// Pending administrator account, used for bootstrap.
    pub fn admin() -> Self {
        Self {
            role: UserRole::Admin,
            reader_id: None,
        }
    }
}

/// Parameters for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub password: String,
    pub device_name: String,
    pub role: UserRole,
    pub reader_id: Option<String>,
}

/// Changes to an existing account. Either part may be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    /// New role and reader link.
    pub user: Option<User>,
    /// New password for the account's device.
    pub password: Option<String>,
}

impl UserUpdate {
    /// Change only the role and reader link.
    pub fn profile(user: User) -> Self {
        Self {
            user: Some(user),
            password: None,
        }
    }

    /// Change only the password.
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            user: None,
            password: Some(password.into()),
        }
    }
}

/// A message on the add-user stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddUserResponse {
    /// The caller may not create accounts.
    Denied,
    /// A fresh credential for the new account.
    Granted { secret: String, lifespan_secs: u64 },
}

/// Result of an authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthorizationResponse {
    Denied,
    Allowed { token: String },
}

/// An authenticated device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub os: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
}
