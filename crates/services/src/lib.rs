//! # services
//!
//! Use cases of the discussion board. Each method validates its input, then
//! hands a single atomic operation to the [`MessageRepository`].

use std::sync::Arc;

use chrono::Utc;
use domains::validation::validate_content;
use domains::{
    DomainError, Message, MessageId, MessageRepository, MessageSort, Page, PageRequest,
    Principal, Result, VoteKind, VoteReceipt,
};

#[derive(Clone)]
pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    /// Posts a new top-level message, or a reply when `parent_id` is set.
    #[tracing::instrument(skip_all, fields(author = %principal.author_id(), parent = ?parent_id))]
    pub async fn create(
        &self,
        principal: &Principal,
        content: &str,
        parent_id: Option<MessageId>,
    ) -> Result<Message> {
        let content = validate_content(content)?;
        let message = Message::new(content, principal.author_id().clone(), parent_id, Utc::now());
        let message = self.repo.insert(message).await?;
        tracing::info!(id = %message.id, "message created");
        Ok(message)
    }

    pub async fn get(&self, id: MessageId) -> Result<Message> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::message_not_found(id))
    }

    #[tracing::instrument(skip_all, fields(author = %principal.author_id(), %id))]
    pub async fn edit(&self, principal: &Principal, id: MessageId, content: &str) -> Result<Message> {
        let content = validate_content(content)?;
        let message = self
            .repo
            .update_content(id, principal.author_id(), content, Utc::now())
            .await
            .inspect_err(log_rejection)?;
        tracing::info!("message edited");
        Ok(message)
    }

    #[tracing::instrument(skip_all, fields(author = %principal.author_id(), %id))]
    pub async fn delete(&self, principal: &Principal, id: MessageId) -> Result<()> {
        self.repo
            .delete(id, principal.author_id())
            .await
            .inspect_err(log_rejection)?;
        tracing::info!("message deleted");
        Ok(())
    }

    /// Toggles the principal's vote on a message.
    #[tracing::instrument(skip_all, fields(voter = %principal.author_id(), %id, %kind))]
    pub async fn vote(&self, principal: &Principal, id: MessageId, kind: VoteKind) -> Result<VoteReceipt> {
        let receipt = self.repo.apply_vote(id, principal.author_id(), kind).await?;
        tracing::info!(
            outcome = receipt.outcome.as_str(),
            likes = receipt.message.votes.like_count(),
            dislikes = receipt.message.votes.dislike_count(),
            "vote applied"
        );
        Ok(receipt)
    }

    /// Direct replies of `parent_id`. One level only; deeper levels are fetched
    /// by calling this again with a child's id.
    pub async fn list_children(&self, parent_id: MessageId, sort: MessageSort) -> Result<Vec<Message>> {
        self.repo.list_children(parent_id, sort).await
    }

    pub async fn list_roots(&self, page: PageRequest, sort: MessageSort) -> Result<Page<Message>> {
        self.repo.list_roots(page, sort).await
    }
}

fn log_rejection(err: &DomainError) {
    if let DomainError::Forbidden(reason) = err {
        tracing::warn!(%reason, "ownership check rejected request");
    }
}
