//! Database handle and query execution.
//!
//! A [`Database`] owns one connection, opened on the first query and reused
//! for the handle's lifetime. It is not a pool: statements run one at a time
//! behind an async mutex, so the handle can sit in an `Arc` shared by every
//! handler.
//!
//! Backends sit behind the `mysql` and `sqlite` cargo features, both on by
//! default.
//!
//! ```rust,no_run
//! use aapje::db::{Database, DbConfig, MySql};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), aapje::Error> {
//! let db: Database<MySql> = Database::new(DbConfig::new("localhost", "app", "app", "secret"));
//! let id = db.insert("users", &json!({ "email": "a@b.com", "name": "A" })).await?;
//! # Ok(()) }
//! ```

use std::fmt;
use std::future::Future;

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::query::QuerySpec;

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::MySql;
#[cfg(feature = "sqlite")]
pub use sqlite::Sqlite;

pub use crate::query::{Columns, SelectOptions, Sort, Statement};

/// One fetched row: column name → value, in select order.
pub type Row = Map<String, Value>;

/// What a write statement reports back.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Executed {
    /// Id generated by the last insert, `0` when none.
    pub last_insert_id: u64,
    pub affected_rows: u64,
}

/// A driver able to prepare, bind and execute a [`Statement`].
pub trait Backend: Send + Sized + 'static {
    fn connect(config: &DbConfig) -> impl Future<Output = Result<Self, Error>> + Send;

    fn execute(&mut self, stmt: &Statement) -> impl Future<Output = Result<Executed, Error>> + Send;

    fn fetch(&mut self, stmt: &Statement) -> impl Future<Output = Result<Vec<Row>, Error>> + Send;
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Connection settings.
///
/// For the `Sqlite` backend, `database` is the file path (or `:memory:`) and the other
/// fields are ignored.
#[derive(Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(alias = "dbname")]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 { 3306 }

impl DbConfig {
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Settings for a SQLite file, or `":memory:"`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new("", path, "", "")
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

// ── Database ──────────────────────────────────────────────────────────────────

/// A lazily connected, single-connection database handle.
pub struct Database<B: Backend> {
    config: DbConfig,
    conn: Mutex<Option<B>>,
}

impl<B: Backend> Database<B> {
    /// Stores the settings. Nothing connects until the first query.
    pub fn new(config: DbConfig) -> Self {
        Self { config, conn: Mutex::new(None) }
    }

    pub fn config(&self) -> &DbConfig { &self.config }

    /// Whether the connection has been opened yet.
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Inserts one row and returns its generated id.
    pub async fn insert(&self, table: &str, data: &Value) -> Result<u64, Error> {
        let stmt = QuerySpec::Insert { table, data }.build()?;
        Ok(self.execute(&stmt).await?.last_insert_id)
    }

    /// Updates matching rows (all rows for `null` / `{}` conditions) and
    /// returns how many changed.
    pub async fn update(&self, table: &str, data: &Value, conditions: &Value) -> Result<u64, Error> {
        let stmt = QuerySpec::Update { table, data, conditions }.build()?;
        Ok(self.execute(&stmt).await?.affected_rows)
    }

    /// Deletes matching rows and returns how many went.
    pub async fn delete(&self, table: &str, conditions: &Value) -> Result<u64, Error> {
        let stmt = QuerySpec::Delete { table, conditions }.build()?;
        Ok(self.execute(&stmt).await?.affected_rows)
    }

    /// The first matching row, if any.
    pub async fn select(
        &self,
        table: &str,
        columns: &Columns,
        conditions: &Value,
        options: &SelectOptions,
    ) -> Result<Option<Row>, Error> {
        let stmt = QuerySpec::Select { table, columns, conditions, options }.build()?;
        Ok(self.query(&stmt).await?.into_iter().next())
    }

    /// Every matching row.
    pub async fn select_all(
        &self,
        table: &str,
        columns: &Columns,
        conditions: &Value,
        options: &SelectOptions,
    ) -> Result<Vec<Row>, Error> {
        let stmt = QuerySpec::SelectAll { table, columns, conditions, options }.build()?;
        self.query(&stmt).await
    }

    /// Runs a statement that returns no rows.
    pub async fn execute(&self, stmt: &Statement) -> Result<Executed, Error> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "execute");
        let mut slot = self.conn.lock().await;
        self.connection(&mut slot).await?.execute(stmt).await
    }

    /// Runs a statement and collects its rows.
    pub async fn query(&self, stmt: &Statement) -> Result<Vec<Row>, Error> {
        debug!(sql = %stmt.sql, params = stmt.params.len(), "query");
        let mut slot = self.conn.lock().await;
        self.connection(&mut slot).await?.fetch(stmt).await
    }

    async fn connection<'s>(&self, slot: &'s mut Option<B>) -> Result<&'s mut B, Error> {
        if slot.is_none() {
            debug!(host = %self.config.host, database = %self.config.database, "opening database connection");
            *slot = Some(B::connect(&self.config).await?);
        }
        slot.as_mut()
            .ok_or_else(|| Error::Database("database connection unavailable".into()))
    }
}

impl<B: Backend> fmt::Debug for Database<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn config_from_json_uses_defaults() {
        let config: DbConfig = serde_json::from_value(json!({
            "host": "db.internal",
            "dbname": "shop",
            "user": "app",
        }))
        .unwrap();
        assert_eq!(config.port, 3306);
        assert_eq!(config.database, "shop");
        assert_eq!(config.password, "");
    }

    #[test]
    fn debug_hides_password() {
        let config = DbConfig::new("h", "d", "u", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
