// SQL lock store
// One row per held key; expiry is an epoch-millis column compared on every statement

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use latchkey_common::{Configuration, StoreError};
use latchkey_lock::{LockStore, LockTtl, OwnerId};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement,
    Value,
};
use tracing::{debug, info};

/// Statements rendered once per store for its backend and table
#[derive(Debug, Clone)]
struct LockStatements {
    create_table: String,
    insert_if_absent: String,
    delete_if_owner: String,
    select_owner: String,
    purge_expired: String,
}

impl LockStatements {
    fn render(backend: DbBackend, table: &str) -> Result<Self, StoreError> {
        let p: fn(usize) -> String = match backend {
            DbBackend::Postgres => |n| format!("${n}"),
            DbBackend::Sqlite => |n| format!("?{n}"),
            DbBackend::MySql => {
                return Err(StoreError::Unsupported(
                    "MySQL has no conditional upsert usable as a lock insert".to_string(),
                ));
            }
        };

        Ok(Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 lock_key TEXT NOT NULL PRIMARY KEY, \
                 owner_id VARCHAR(36) NOT NULL, \
                 expires_at BIGINT NOT NULL)"
            ),
            // The update branch only fires over an expired row, so a live
            // holder leaves zero affected rows
            insert_if_absent: format!(
                "INSERT INTO {table} (lock_key, owner_id, expires_at) VALUES ({}, {}, {}) \
                 ON CONFLICT (lock_key) DO UPDATE \
                 SET owner_id = excluded.owner_id, expires_at = excluded.expires_at \
                 WHERE {table}.expires_at <= {}",
                p(1),
                p(2),
                p(3),
                p(4)
            ),
            delete_if_owner: format!(
                "DELETE FROM {table} WHERE lock_key = {} AND owner_id = {} AND expires_at > {}",
                p(1),
                p(2),
                p(3)
            ),
            select_owner: format!(
                "SELECT owner_id FROM {table} WHERE lock_key = {} AND expires_at > {}",
                p(1),
                p(2)
            ),
            purge_expired: format!("DELETE FROM {table} WHERE expires_at <= {}", p(1)),
        })
    }
}

fn validate_table_name(table: &str) -> Result<(), StoreError> {
    if !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidConfig(format!(
            "table name '{table}' must match [A-Za-z0-9_]+"
        )))
    }
}

fn db_error(err: DbErr) -> StoreError {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Epoch millis at which a row written at `now` with `ttl` expires
fn expiry_millis(now: i64, ttl: LockTtl) -> Result<i64, StoreError> {
    i64::try_from(ttl.as_duration().as_millis())
        .ok()
        .and_then(|ttl_ms| now.checked_add(ttl_ms))
        .ok_or_else(|| {
            StoreError::InvalidConfig(format!(
                "lock ttl of {}s overflows the expires_at column",
                ttl.as_secs()
            ))
        })
}

/// Lock store over PostgreSQL or SQLite.
///
/// Record expiry is judged against this process's wall clock, so clocks of
/// processes sharing a table should be kept in sync.
pub struct SqlLockStore {
    db: DatabaseConnection,
    backend: DbBackend,
    table: String,
    statements: LockStatements,
}

impl SqlLockStore {
    /// Wrap an existing connection, storing locks in `table`
    pub fn new(db: DatabaseConnection, table: &str) -> Result<Self, StoreError> {
        validate_table_name(table)?;
        let backend = db.get_database_backend();
        let statements = LockStatements::render(backend, table)?;

        Ok(Self {
            db,
            backend,
            table: table.to_string(),
            statements,
        })
    }

    /// Open a connection pool to `url` and store locks in `table`
    pub async fn connect(url: &str, table: &str, max_connections: u32) -> Result<Self, StoreError> {
        validate_table_name(table)?;

        let mut opt = ConnectOptions::new(url.to_string());
        opt.max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let db = Database::connect(opt).await.map_err(db_error)?;

        info!(
            table = %table,
            max_connections = max_connections,
            "Lock store database connection pool configured"
        );

        Self::new(db, table)
    }

    pub async fn from_config(config: &Configuration) -> Result<Self, StoreError> {
        let url = config.database_url().ok_or_else(|| {
            StoreError::InvalidConfig("store.database_url is not set".to_string())
        })?;

        Self::connect(&url, &config.locks_table(), config.max_connections()).await
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn statement(&self, sql: &str, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(self.backend, sql, values)
    }

    /// Owner of the live row for `key`, if any
    pub async fn owner_of(&self, key: &str) -> Result<Option<OwnerId>, StoreError> {
        let stmt = self.statement(
            &self.statements.select_owner,
            vec![key.to_string().into(), now_millis().into()],
        );

        let Some(row) = self.db.query_one(stmt).await.map_err(db_error)? else {
            return Ok(None);
        };

        let owner_id: String = row.try_get("", "owner_id").map_err(db_error)?;
        OwnerId::from_str(&owner_id).map(Some).map_err(|e| {
            StoreError::Database(format!("malformed owner_id '{owner_id}' for key '{key}': {e}"))
        })
    }

    /// Delete every expired row, returning how many were removed
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let stmt = self.statement(&self.statements.purge_expired, vec![now_millis().into()]);
        let purged = self.db.execute(stmt).await.map_err(db_error)?.rows_affected();

        if purged > 0 {
            debug!(table = %self.table, count = purged, "Purged expired lock rows");
        }
        Ok(purged)
    }
}

#[async_trait]
impl LockStore for SqlLockStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.db
            .execute_unprepared(&self.statements.create_table)
            .await
            .map_err(db_error)?;

        info!(table = %self.table, "Lock table ensured");
        Ok(())
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        owner_id: OwnerId,
        ttl: LockTtl,
    ) -> Result<bool, StoreError> {
        let now = now_millis();
        let expires_at = expiry_millis(now, ttl)?;

        let stmt = self.statement(
            &self.statements.insert_if_absent,
            vec![
                key.to_string().into(),
                owner_id.to_string().into(),
                expires_at.into(),
                now.into(),
            ],
        );
        let applied = self.db.execute(stmt).await.map_err(db_error)?.rows_affected() == 1;

        if applied {
            debug!(key = %key, owner_id = %owner_id, expires_at = expires_at, "Lock row written");
        }
        Ok(applied)
    }

    async fn delete_if_owner(&self, key: &str, owner_id: OwnerId) -> Result<bool, StoreError> {
        let stmt = self.statement(
            &self.statements.delete_if_owner,
            vec![
                key.to_string().into(),
                owner_id.to_string().into(),
                now_millis().into(),
            ],
        );
        let removed = self.db.execute(stmt).await.map_err(db_error)?.rows_affected() == 1;

        if removed {
            debug!(key = %key, owner_id = %owner_id, "Lock row deleted");
        }
        Ok(removed)
    }
}
