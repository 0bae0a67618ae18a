//! Fixtures shared by the integration tests: every scenario runs once per
//! storage backend.

use std::sync::Arc;

use domains::{AuthorId, MessageRepository, Principal};
use services::MessageService;
use storage_adapters::{MemoryMessageRepository, SqliteMessageRepository};
use tempfile::TempDir;

pub struct Backend {
    pub name: &'static str,
    pub service: MessageService,
}

/// A fresh, empty store of every kind.
pub async fn backends() -> Vec<Backend> {
    let sqlite = SqliteMessageRepository::in_memory()
        .await
        .expect("in-memory sqlite opens");
    vec![
        backend("memory", Arc::new(MemoryMessageRepository::new())),
        backend("sqlite", Arc::new(sqlite)),
    ]
}

/// A file-backed SQLite store with a real connection pool, for tests that need
/// several connections writing at once. The database is removed when the
/// returned `TempDir` drops.
pub async fn pooled_sqlite(max_connections: u32) -> (Backend, TempDir) {
    let dir = TempDir::new().expect("temp dir is creatable");
    let url = format!("sqlite://{}", dir.path().join("board.db").display());
    let repo = SqliteMessageRepository::connect(&url, max_connections)
        .await
        .expect("file sqlite opens");
    (backend("sqlite-pool", Arc::new(repo)), dir)
}

fn backend(name: &'static str, repo: Arc<dyn MessageRepository>) -> Backend {
    Backend {
        name,
        service: MessageService::new(repo),
    }
}

pub fn user(id: &str) -> Principal {
    Principal::new(AuthorId::parse(id).expect("valid test author id"))
}

pub fn author(id: &str) -> AuthorId {
    AuthorId::parse(id).expect("valid test author id")
}
