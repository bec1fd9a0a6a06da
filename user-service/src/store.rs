use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tokio::sync::RwLock;

const BOOTSTRAP_SQL: &str = include_str!("../migrations/0001_create_users.sql");

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public projection of a [`User`]; the digest never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> StoreResult<User>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    async fn get(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// `None` when no user has `id`.
    async fn update(&self, id: i64, update: UserUpdate) -> StoreResult<Option<User>>;
    /// Number of rows removed.
    async fn delete(&self, id: i64) -> StoreResult<u64>;
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: HashMap<i64, User>,
}

impl Table {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|row| row.email == email && Some(row.id) != except)
    }
}

/// Process-local store; ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    table: RwLock<Table>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut table = self.table.write().await;
        if table.email_taken(&user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        table.next_id += 1;
        let row = User {
            id: table.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let table = self.table.read().await;
        let mut users: Vec<User> = table.rows.values().cloned().collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|row| row.email == email).cloned())
    }

    async fn update(&self, id: i64, update: UserUpdate) -> StoreResult<Option<User>> {
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        if table.email_taken(&update.email, Some(id)) {
            return Err(StoreError::DuplicateEmail);
        }
        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        row.name = update.name;
        row.email = update.email;
        row.password_hash = update.password_hash;
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> StoreResult<u64> {
        let removed = self.table.write().await.rows.remove(&id);
        Ok(u64::from(removed.is_some()))
    }
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Connects and makes sure the `users` table exists.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn bootstrap(&self) -> StoreResult<()> {
        sqlx::query(BOOTSTRAP_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id, name, email, password_hash",
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, update: UserUpdate) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            "UPDATE users SET name = $2, email = $3, password_hash = $4
             WHERE id = $1
             RETURNING id, name, email, password_hash",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
