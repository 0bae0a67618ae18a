//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::Result;
use crate::models::{AuthorId, Message, MessageId, Principal};
use crate::query::{MessageSort, Page, PageRequest};
use crate::voting::{VoteKind, VoteReceipt};

/// Data persistence contract for messages.
///
/// Every mutating method is a single atomic operation on one record. Owner
/// checks happen inside the store against the record as it is at write time.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persists a new message. Fails with `NotFound` when `parent_id` does not
    /// resolve at the moment of the write.
    async fn insert(&self, message: Message) -> Result<Message>;

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>>;

    /// Replaces `content` and `updated_at` if `requester` owns the message.
    async fn update_content(
        &self,
        id: MessageId,
        requester: &AuthorId,
        content: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Message>;

    /// Physically removes the message if `requester` owns it. Replies are untouched.
    async fn delete(&self, id: MessageId, requester: &AuthorId) -> Result<()>;

    /// Toggles `voter`'s vote. Must not lose updates under concurrent voters.
    async fn apply_vote(
        &self,
        id: MessageId,
        voter: &AuthorId,
        kind: VoteKind,
    ) -> Result<VoteReceipt>;

    async fn list_children(&self, parent_id: MessageId, sort: MessageSort)
        -> Result<Vec<Message>>;

    async fn list_roots(&self, page: PageRequest, sort: MessageSort) -> Result<Page<Message>>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed credential")]
    Malformed,
    #[error("credential signature mismatch")]
    BadSignature,
    #[error("credential names an invalid author: {0}")]
    InvalidAuthor(String),
}

/// Identity contract. Turns a bearer credential into an authenticated principal.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Mints a credential for `author`.
    fn issue(&self, author: &AuthorId) -> String;

    /// Verifies a credential previously minted by [`IdentityProvider::issue`].
    fn verify(&self, credential: &str) -> std::result::Result<Principal, AuthError>;
}
