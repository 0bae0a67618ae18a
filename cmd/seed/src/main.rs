//! Seeds the configured SQLite database with a small demo thread and prints a
//! bearer token for each demo user.
//!
//! ```text
//! NESTBOARD__DATABASE_URL=sqlite:nestboard.db cargo run -p seed
//! ```

use std::sync::Arc;

use anyhow::Context;
use auth_adapters::HmacIdentityProvider;
use configs::AppConfig;
use domains::{AuthorId, IdentityProvider, Principal, VoteKind};
use secrecy::ExposeSecret;
use services::MessageService;
use storage_adapters::SqliteMessageRepository;
use tracing_subscriber::{fmt, EnvFilter};

const DEMO_USERS: [&str; 4] = ["u1", "u2", "u3", "u4"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let repo = SqliteMessageRepository::connect(&config.database_url, config.database_max_connections)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    let board = MessageService::new(Arc::new(repo));
    let identity = HmacIdentityProvider::new(config.auth_secret.expose_secret().as_bytes())
        .context("auth secret rejected")?;

    let user = |id: &str| -> anyhow::Result<Principal> { Ok(Principal::new(AuthorId::parse(id)?)) };

    let post = board.create(&user("u1")?, "hello", None).await?;
    let reply = board.create(&user("u2")?, "hi back", Some(post.id)).await?;
    board.create(&user("u3")?, "welcome, both of you", Some(reply.id)).await?;
    board.vote(&user("u3")?, post.id, VoteKind::Like).await?;
    board.vote(&user("u4")?, post.id, VoteKind::Like).await?;
    board.vote(&user("u4")?, post.id, VoteKind::Dislike).await?;
    board.vote(&user("u1")?, reply.id, VoteKind::Like).await?;
    tracing::info!(post = %post.id, reply = %reply.id, url = %config.database_url, "demo thread seeded");

    println!("post id: {}", post.id);
    for id in DEMO_USERS {
        println!("{id}: Bearer {}", identity.issue(&AuthorId::parse(id)?));
    }
    Ok(())
}
