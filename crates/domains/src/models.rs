//! # Domain Models
//!
//! A post and a comment are the same entity: a [`Message`] with or without a
//! parent reference. We use UUID v7 for time-ordered, globally unique ids.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::validation::validate_author_id;
use crate::voting::VoteTally;

/// Opaque identifier of a message, assigned by the core on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| DomainError::validation(format!("invalid message id {s:?}")))
    }
}

/// Identifies a user. Not verified against any identity system; the shape is
/// the only thing checked here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthorId(String);

impl AuthorId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        validate_author_id(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AuthorId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AuthorId> for String {
    fn from(id: AuthorId) -> Self {
        id.0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An author id that an identity provider has already authenticated.
/// Services only accept writes on behalf of a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    author_id: AuthorId,
}

impl Principal {
    pub fn new(author_id: AuthorId) -> Self {
        Self { author_id }
    }

    pub fn author_id(&self) -> &AuthorId {
        &self.author_id
    }
}

/// The fundamental unit of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub author_id: AuthorId,
    /// `None` marks a top-level post
    pub parent_id: Option<MessageId>,
    #[serde(flatten)]
    pub votes: VoteTally,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Builds a fresh message with empty vote sets. `content` must already be validated.
    pub fn new(
        content: String,
        author_id: AuthorId,
        parent_id: Option<MessageId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            content,
            author_id,
            parent_id,
            votes: VoteTally::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_owned_by(&self, author: &AuthorId) -> bool {
        &self.author_id == author
    }
}
