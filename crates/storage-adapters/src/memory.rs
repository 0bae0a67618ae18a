//! # In-memory message store
//!
//! Backed by a sharded `DashMap`. A mutation holds the write guard of the
//! entry it touches for its whole read-modify-write, which makes votes and
//! owner-guarded edits atomic per message.
//!
//! Replies and deletes touch two entries (the reply and its parent), so they
//! also take the `links` lock: shared for a reply, exclusive for a delete. A
//! reply can then never land after its parent's removal.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domains::{
    AuthorId, DomainError, Message, MessageId, MessageRepository, MessageSort, Page,
    PageRequest, Result, VoteKind, VoteReceipt,
};

#[derive(Clone, Default)]
pub struct MemoryMessageRepository {
    messages: Arc<DashMap<MessageId, Message>>,
    links: Arc<RwLock<()>>,
}

impl MemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn sorted(&self, mut items: Vec<Message>, sort: MessageSort) -> Vec<Message> {
        items.sort_by(|a, b| sort.compare(a, b));
        items
    }
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::Storage("in-memory store lock poisoned".into())
}

fn not_owner(id: MessageId) -> DomainError {
    DomainError::Forbidden(format!("message {id} belongs to another author"))
}

#[async_trait]
impl MessageRepository for MemoryMessageRepository {
    async fn insert(&self, message: Message) -> Result<Message> {
        let Some(parent) = message.parent_id else {
            self.messages.insert(message.id, message.clone());
            return Ok(message);
        };
        let _links = self.links.read().map_err(poisoned)?;
        if !self.messages.contains_key(&parent) {
            return Err(DomainError::message_not_found(parent));
        }
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self.messages.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_content(
        &self,
        id: MessageId,
        requester: &AuthorId,
        content: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Message> {
        let mut entry = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::message_not_found(id))?;
        if !entry.is_owned_by(requester) {
            return Err(not_owner(id));
        }
        entry.content = content;
        entry.updated_at = updated_at;
        Ok(entry.clone())
    }

    async fn delete(&self, id: MessageId, requester: &AuthorId) -> Result<()> {
        let _links = self.links.write().map_err(poisoned)?;
        if self
            .messages
            .remove_if(&id, |_, message| message.is_owned_by(requester))
            .is_some()
        {
            return Ok(());
        }
        if self.messages.contains_key(&id) {
            Err(not_owner(id))
        } else {
            Err(DomainError::message_not_found(id))
        }
    }

    async fn apply_vote(
        &self,
        id: MessageId,
        voter: &AuthorId,
        kind: VoteKind,
    ) -> Result<VoteReceipt> {
        let mut entry = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| DomainError::message_not_found(id))?;
        let outcome = entry.votes.apply(voter, kind);
        Ok(VoteReceipt {
            message: entry.clone(),
            outcome,
        })
    }

    async fn list_children(
        &self,
        parent_id: MessageId,
        sort: MessageSort,
    ) -> Result<Vec<Message>> {
        // Replies of a deleted parent are orphans and stay out of listings.
        if !self.messages.contains_key(&parent_id) {
            return Ok(Vec::new());
        }
        let children = self
            .messages
            .iter()
            .filter(|entry| entry.parent_id == Some(parent_id))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(self.sorted(children, sort))
    }

    async fn list_roots(&self, page: PageRequest, sort: MessageSort) -> Result<Page<Message>> {
        let roots = self
            .messages
            .iter()
            .filter(|entry| entry.is_root())
            .map(|entry| entry.value().clone())
            .collect();
        let roots = self.sorted(roots, sort);
        let total = roots.len() as u64;
        let items = roots
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size() as usize)
            .collect();
        Ok(Page::new(items, total, page))
    }
}
