//! # SQLite message store
//!
//! Maps the `domains` message model onto two tables: `messages` and
//! `message_votes`. Vote sets live in `message_votes` keyed by
//! `(message_id, voter_id)`, so a voter can hold at most one row per message.
//! `like_count`/`dislike_count` on `messages` exist for ordering and are
//! recomputed from the vote rows inside every vote transaction.
//!
//! Every mutating transaction starts with a write statement. SQLite then takes
//! the database write lock before anything is read, and concurrent writers
//! queue on `busy_timeout` instead of failing on a lock upgrade.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use domains::{
    AuthorId, DomainError, Message, MessageId, MessageRepository, MessageSort, Page,
    PageRequest, Result, SortDirection, SortField, VoteKind, VoteOutcome, VoteReceipt, VoteTally,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};

const MESSAGE_COLUMNS: &str = "id, content, author_id, parent_id, created_at, updated_at";

/// Ids bound per vote lookup. Stays under SQLite's oldest variable limit (999),
/// so a thread of any size can be hydrated.
const VOTE_LOOKUP_BATCH: usize = 500;

pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

fn storage(err: sqlx::Error) -> DomainError {
    tracing::error!(error = %err, "sqlite operation failed");
    DomainError::storage(err)
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> DomainError {
    tracing::error!(error = %err, what, "unreadable row in sqlite store");
    DomainError::Storage(format!("corrupt {what}: {err}"))
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| corrupt("timestamp", micros))
}

fn not_owner(id: MessageId) -> DomainError {
    DomainError::Forbidden(format!("message {id} belongs to another author"))
}

fn order_clause(sort: MessageSort) -> String {
    let column = match sort.field {
        SortField::CreatedAt => "created_at",
        SortField::LikeCount => "like_count",
        SortField::DislikeCount => "dislike_count",
    };
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    format!("ORDER BY {column} {direction}, id {direction}")
}

/// A `messages` row before its vote sets are attached.
struct MessageRow {
    id: MessageId,
    content: String,
    author_id: AuthorId,
    parent_id: Option<MessageId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn decode(row: &SqliteRow) -> Result<Self> {
        let id: String = row.try_get("id").map_err(storage)?;
        let author_id: String = row.try_get("author_id").map_err(storage)?;
        let parent_id: Option<String> = row.try_get("parent_id").map_err(storage)?;
        Ok(Self {
            id: MessageId::from_str(&id).map_err(|e| corrupt("message id", e))?,
            content: row.try_get("content").map_err(storage)?,
            author_id: AuthorId::parse(&author_id).map_err(|e| corrupt("author id", e))?,
            parent_id: parent_id
                .map(|p| MessageId::from_str(&p))
                .transpose()
                .map_err(|e| corrupt("parent id", e))?,
            created_at: micros_to_datetime(row.try_get("created_at").map_err(storage)?)?,
            updated_at: micros_to_datetime(row.try_get("updated_at").map_err(storage)?)?,
        })
    }

    fn with_votes(self, votes: VoteTally) -> Message {
        Message {
            id: self.id,
            content: self.content,
            author_id: self.author_id,
            parent_id: self.parent_id,
            votes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl SqliteMessageRepository {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    ///
    /// In-memory databases exist per connection, so they get a single pinned
    /// connection regardless of `max_connections`.
    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let repo = Self { pool };
        repo.migrate().await?;
        tracing::info!(url, "sqlite message store ready");
        Ok(repo)
    }

    /// Shortcut for tests and demos.
    pub async fn in_memory() -> std::result::Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY NOT NULL,
                content TEXT NOT NULL,
                author_id TEXT NOT NULL,
                parent_id TEXT,
                like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                dislike_count INTEGER NOT NULL DEFAULT 0 CHECK (dislike_count >= 0),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // parent_id has no foreign key: deleting a parent leaves replies orphaned.
        for index in [
            "CREATE INDEX IF NOT EXISTS idx_messages_parent_id ON messages (parent_id)",
            "CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at)",
            "CREATE INDEX IF NOT EXISTS idx_messages_author_id ON messages (author_id)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_votes (
                message_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('like', 'dislike')),
                PRIMARY KEY (message_id, voter_id),
                FOREIGN KEY (message_id) REFERENCES messages (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn exists(conn: &mut SqliteConnection, id: MessageId) -> Result<bool> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(conn)
        .await
        .map(|count| count > 0)
        .map_err(storage)
}

async fn owner_rejection(conn: &mut SqliteConnection, id: MessageId) -> Result<DomainError> {
    Ok(if exists(conn, id).await? {
        not_owner(id)
    } else {
        DomainError::message_not_found(id)
    })
}

/// Attaches vote sets to decoded rows, preserving row order.
async fn hydrate(conn: &mut SqliteConnection, rows: Vec<SqliteRow>) -> Result<Vec<Message>> {
    let rows = rows
        .iter()
        .map(MessageRow::decode)
        .collect::<Result<Vec<_>>>()?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = rows.iter().map(|row| row.id.to_string()).collect();
    let mut vote_rows = Vec::new();
    for chunk in ids.chunks(VOTE_LOOKUP_BATCH) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT message_id, voter_id, kind FROM message_votes WHERE message_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");
        vote_rows.extend(qb.build().fetch_all(&mut *conn).await.map_err(storage)?);
    }

    let mut sets: HashMap<String, (BTreeSet<AuthorId>, BTreeSet<AuthorId>)> = HashMap::new();
    for vote in &vote_rows {
        let message_id: String = vote.try_get("message_id").map_err(storage)?;
        let voter: String = vote.try_get("voter_id").map_err(storage)?;
        let kind: String = vote.try_get("kind").map_err(storage)?;
        let voter = AuthorId::parse(&voter).map_err(|e| corrupt("voter id", e))?;
        let (likes, dislikes) = sets.entry(message_id).or_default();
        match VoteKind::from_str(&kind).map_err(|e| corrupt("vote kind", e))? {
            VoteKind::Like => likes.insert(voter),
            VoteKind::Dislike => dislikes.insert(voter),
        };
    }

    rows.into_iter()
        .zip(ids)
        .map(|(row, id)| -> Result<Message> {
            let (likes, dislikes) = sets.remove(&id).unwrap_or_default();
            Ok(row.with_votes(VoteTally::from_sets(likes, dislikes)?))
        })
        .collect()
}

async fn fetch_one(conn: &mut SqliteConnection, id: MessageId) -> Result<Option<Message>> {
    let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?;
    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn fetch_existing(conn: &mut SqliteConnection, id: MessageId) -> Result<Message> {
    fetch_one(conn, id)
        .await?
        .ok_or_else(|| DomainError::message_not_found(id))
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, mut message: Message) -> Result<Message> {
        // Timestamps are stored in microseconds; hand back what a read will return.
        message.created_at = message.created_at.trunc_subsecs(6);
        message.updated_at = message.updated_at.trunc_subsecs(6);
        let parent = message.parent_id.map(|p| p.to_string());
        // Referential integrity is checked by the insert itself.
        let inserted = sqlx::query(
            r#"
            INSERT INTO messages (id, content, author_id, parent_id, like_count, dislike_count, created_at, updated_at)
            SELECT ?, ?, ?, ?, 0, 0, ?, ?
            WHERE ? IS NULL OR EXISTS (SELECT 1 FROM messages WHERE id = ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(&message.content)
        .bind(message.author_id.as_str())
        .bind(parent.as_deref())
        .bind(message.created_at.timestamp_micros())
        .bind(message.updated_at.timestamp_micros())
        .bind(parent.as_deref())
        .bind(parent.as_deref())
        .execute(&self.pool)
        .await
        .map_err(storage)?
        .rows_affected();

        match (inserted, message.parent_id) {
            (0, Some(parent_id)) => Err(DomainError::message_not_found(parent_id)),
            (0, None) => Err(DomainError::Storage(format!(
                "insert of message {} affected no rows",
                message.id
            ))),
            _ => Ok(message),
        }
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        fetch_one(&mut conn, id).await
    }

    async fn update_content(
        &self,
        id: MessageId,
        requester: &AuthorId,
        content: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Message> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let updated = sqlx::query(
            "UPDATE messages SET content = ?, updated_at = ? WHERE id = ? AND author_id = ?",
        )
        .bind(&content)
        .bind(updated_at.timestamp_micros())
        .bind(id.to_string())
        .bind(requester.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();

        if updated == 0 {
            return Err(owner_rejection(&mut tx, id).await?);
        }
        let message = fetch_existing(&mut tx, id).await?;
        tx.commit().await.map_err(storage)?;
        Ok(message)
    }

    async fn delete(&self, id: MessageId, requester: &AuthorId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let deleted = sqlx::query("DELETE FROM messages WHERE id = ? AND author_id = ?")
            .bind(id.to_string())
            .bind(requester.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .rows_affected();

        if deleted == 0 {
            return Err(owner_rejection(&mut tx, id).await?);
        }
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn apply_vote(
        &self,
        id: MessageId,
        voter: &AuthorId,
        kind: VoteKind,
    ) -> Result<VoteReceipt> {
        let message_id = id.to_string();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let cleared = sqlx::query(
            "DELETE FROM message_votes WHERE message_id = ? AND voter_id = ? AND kind = ?",
        )
        .bind(&message_id)
        .bind(voter.as_str())
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected()
            > 0;

        let outcome = if cleared {
            VoteOutcome::Cleared
        } else {
            if !exists(&mut tx, id).await? {
                return Err(DomainError::message_not_found(id));
            }
            let had_opposite = sqlx::query(
                "DELETE FROM message_votes WHERE message_id = ? AND voter_id = ?",
            )
            .bind(&message_id)
            .bind(voter.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?
            .rows_affected()
                > 0;
            sqlx::query("INSERT INTO message_votes (message_id, voter_id, kind) VALUES (?, ?, ?)")
                .bind(&message_id)
                .bind(voter.as_str())
                .bind(kind.as_str())
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
            if had_opposite {
                VoteOutcome::Switched
            } else {
                VoteOutcome::Cast
            }
        };

        sqlx::query(
            r#"
            UPDATE messages SET
                like_count = (SELECT COUNT(*) FROM message_votes WHERE message_id = messages.id AND kind = 'like'),
                dislike_count = (SELECT COUNT(*) FROM message_votes WHERE message_id = messages.id AND kind = 'dislike')
            WHERE id = ?
            "#,
        )
        .bind(&message_id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let message = fetch_existing(&mut tx, id).await?;
        tx.commit().await.map_err(storage)?;
        Ok(VoteReceipt { message, outcome })
    }

    async fn list_children(
        &self,
        parent_id: MessageId,
        sort: MessageSort,
    ) -> Result<Vec<Message>> {
        let parent = parent_id.to_string();
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        // Replies of a deleted parent are orphans and stay out of listings.
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE parent_id = ? AND EXISTS (SELECT 1 FROM messages WHERE id = ?) {}",
            order_clause(sort)
        ))
        .bind(&parent)
        .bind(&parent)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage)?;
        hydrate(&mut conn, rows).await
    }

    async fn list_roots(&self, page: PageRequest, sort: MessageSort) -> Result<Page<Message>> {
        // One read transaction so the total and the page come from the same snapshot.
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE parent_id IS NULL")
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE parent_id IS NULL {} LIMIT ? OFFSET ?",
            order_clause(sort)
        ))
        .bind(i64::from(page.page_size()))
        .bind(page.offset() as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;
        let items = hydrate(&mut tx, rows).await?;
        tx.commit().await.map_err(storage)?;
        Ok(Page::new(items, total.max(0) as u64, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn author(id: &str) -> AuthorId {
        AuthorId::parse(id).unwrap()
    }

    fn message(content: &str, by: &str, parent: Option<MessageId>) -> Message {
        Message::new(content.into(), author(by), parent, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let root = assert_ok!(repo.insert(message("hello", "u1", None)).await);

        let found = repo.find_by_id(root.id).await.unwrap().unwrap();
        assert_eq!(found.content, "hello");
        assert_eq!(found.author_id, author("u1"));
        assert_eq!(found.created_at.timestamp_micros(), root.created_at.timestamp_micros());
        assert!(found.parent_id.is_none());
        assert!(repo.find_by_id(MessageId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reply_to_unknown_parent_is_rejected() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let missing = MessageId::new();
        let err = assert_err!(repo.insert(message("hi", "u2", Some(missing))).await);
        assert_eq!(err, DomainError::message_not_found(missing));
    }

    #[tokio::test]
    async fn vote_rows_drive_counts() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let root = assert_ok!(repo.insert(message("hello", "u1", None)).await);

        let r = assert_ok!(repo.apply_vote(root.id, &author("u3"), VoteKind::Like).await);
        assert_eq!(r.outcome, VoteOutcome::Cast);
        let r = assert_ok!(repo.apply_vote(root.id, &author("u3"), VoteKind::Dislike).await);
        assert_eq!(r.outcome, VoteOutcome::Switched);
        let r = assert_ok!(repo.apply_vote(root.id, &author("u3"), VoteKind::Dislike).await);
        assert_eq!(r.outcome, VoteOutcome::Cleared);
        assert_eq!(r.message.votes.like_count() + r.message.votes.dislike_count(), 0);

        let (likes, dislikes): (i64, i64) =
            sqlx::query_as("SELECT like_count, dislike_count FROM messages WHERE id = ?")
                .bind(root.id.to_string())
                .fetch_one(repo.pool())
                .await
                .unwrap();
        assert_eq!((likes, dislikes), (0, 0));
    }

    #[tokio::test]
    async fn vote_on_missing_message_leaves_no_rows() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let err = assert_err!(
            repo.apply_vote(MessageId::new(), &author("u1"), VoteKind::Like)
                .await
        );
        assert!(matches!(err, DomainError::NotFound { .. }));

        let votes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_votes")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(votes, 0);
    }

    #[tokio::test]
    async fn delete_removes_votes_but_not_replies() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let root = assert_ok!(repo.insert(message("hello", "u1", None)).await);
        let reply = assert_ok!(repo.insert(message("hi", "u2", Some(root.id))).await);
        assert_ok!(repo.apply_vote(root.id, &author("u3"), VoteKind::Like).await);

        let err = assert_err!(repo.delete(root.id, &author("u2")).await);
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_ok!(repo.delete(root.id, &author("u1")).await);

        let votes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_votes")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(votes, 0);
        assert!(repo.find_by_id(reply.id).await.unwrap().is_some());
        assert!(assert_ok!(repo.list_children(root.id, MessageSort::default()).await).is_empty());
    }

    #[tokio::test]
    async fn edit_by_stranger_changes_nothing() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let root = assert_ok!(repo.insert(message("hello", "u1", None)).await);

        let err = assert_err!(
            repo.update_content(root.id, &author("u2"), "mine now".into(), Utc::now())
                .await
        );
        assert!(matches!(err, DomainError::Forbidden(_)));
        let err = assert_err!(
            repo.update_content(MessageId::new(), &author("u1"), "x".into(), Utc::now())
                .await
        );
        assert!(matches!(err, DomainError::NotFound { .. }));

        let stored = repo.find_by_id(root.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.updated_at.timestamp_micros(), root.updated_at.timestamp_micros());
    }

    #[tokio::test]
    async fn thread_wider_than_the_variable_limit_lists() {
        let repo = SqliteMessageRepository::in_memory().await.unwrap();
        let root = assert_ok!(repo.insert(message("hello", "u1", None)).await);

        let replies = 33_000;
        let mut first = None;
        let mut last = None;
        for i in 0..replies {
            let reply = assert_ok!(repo.insert(message("me too", "u2", Some(root.id))).await);
            if i == 0 {
                first = Some(reply.id);
            }
            last = Some(reply.id);
        }
        let (first, last) = (first.unwrap(), last.unwrap());
        assert_ok!(repo.apply_vote(first, &author("u3"), VoteKind::Like).await);
        assert_ok!(repo.apply_vote(last, &author("u3"), VoteKind::Dislike).await);

        let oldest_first = MessageSort::new(SortField::CreatedAt, SortDirection::Asc);
        let children = assert_ok!(repo.list_children(root.id, oldest_first).await);
        assert_eq!(children.len(), replies);
        assert_eq!(children[0].id, first);
        assert_eq!(children[0].votes.like_count(), 1);
        assert_eq!(children[replies - 1].id, last);
        assert_eq!(children[replies - 1].votes.dislike_count(), 1);
        assert_eq!(children.iter().map(|m| m.votes.like_count() + m.votes.dislike_count()).sum::<u64>(), 2);
    }
}
