use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;

use self::memory::{MemoryStore, Seed};
use self::models::{Gang, Member, MemberFilter, NewGang, NewMember};

pub mod memory;
pub mod models;
pub mod queries;

/// Handle to wherever member records live.
#[derive(Debug, Clone)]
pub enum Store {
    Postgres(Pool<Postgres>),
    Memory(Arc<RwLock<MemoryStore>>),
}

pub async fn init(config: &Config) -> anyhow::Result<Store> {
    match &config.db {
        Some(db) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&db.db_uri())
                .await
                .context("Error connecting to DB")?;
            if config.run_migrations {
                sqlx::migrate!()
                    .run(&pool)
                    .await
                    .context("Error running migrations")?;
            }
            tracing::info!("Using postgres member store");
            Ok(Store::Postgres(pool))
        }
        None => {
            let seed: Seed = match &config.seed {
                Some(path) => {
                    let raw = tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Error reading seed file {}", path.display()))?;
                    serde_json::from_slice(&raw)
                        .with_context(|| format!("Seed file {} is not valid", path.display()))?
                }
                None => Seed::default(),
            };
            tracing::warn!(
                "No database configured, using in-process store with {} seeded members",
                seed.members.len()
            );
            Ok(Store::memory(MemoryStore::from_seed(seed)))
        }
    }
}

impl Store {
    pub fn memory(store: MemoryStore) -> Self {
        Store::Memory(Arc::new(RwLock::new(store)))
    }

    pub async fn list_members(&self, filter: &MemberFilter) -> sqlx::Result<Vec<Member>> {
        match self {
            Store::Postgres(pool) => queries::list_members(pool, filter).await,
            Store::Memory(store) => Ok(store.read().await.list_members(filter)),
        }
    }

    pub async fn insert_member(&self, member: &NewMember) -> sqlx::Result<Member> {
        match self {
            Store::Postgres(pool) => queries::insert_member(pool, member).await,
            Store::Memory(store) => Ok(store.write().await.insert_member(member)),
        }
    }

    /// Soft delete. Returns the flagged record, or `None` for an unknown id.
    pub async fn deactivate_member(&self, id: Uuid) -> sqlx::Result<Option<Member>> {
        match self {
            Store::Postgres(pool) => queries::deactivate_member(pool, id).await,
            Store::Memory(store) => Ok(store.write().await.deactivate_member(id)),
        }
    }

    pub async fn list_gangs(&self) -> sqlx::Result<Vec<Gang>> {
        match self {
            Store::Postgres(pool) => queries::list_gangs(pool).await,
            Store::Memory(store) => Ok(store.read().await.list_gangs()),
        }
    }

    pub async fn find_gang(&self, slug: &str) -> sqlx::Result<Option<Gang>> {
        match self {
            Store::Postgres(pool) => queries::find_gang(pool, slug).await,
            Store::Memory(store) => Ok(store.read().await.find_gang(slug)),
        }
    }

    pub async fn upsert_gang(&self, gang: &NewGang) -> sqlx::Result<Gang> {
        match self {
            Store::Postgres(pool) => queries::upsert_gang(pool, gang).await,
            Store::Memory(store) => Ok(store.write().await.upsert_gang(gang)),
        }
    }
}
