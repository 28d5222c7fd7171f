//! SQLite session store implementation.
//!
//! Implements `SessionStore` from `zapwire-core` using sqlx with split
//! read/write pools. The `update` path is a single COALESCE statement so a
//! patch can carry any subset of fields; the inherent `create`/`get`/`list`
//! methods serve bootstrap code and tests.

use chrono::{DateTime, Utc};
use sqlx::Row;

use zapwire_core::store::SessionStore;
use zapwire_types::error::StoreError;
use zapwire_types::session::{AccountId, SessionPatch, SessionRecord, SessionStatus};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Insert a new account record.
    pub async fn create(&self, record: &SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts (id, name, status, qrcode, credential, retries, battery, plugged, is_default, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.0)
        .bind(&record.name)
        .bind(record.status.to_string())
        .bind(&record.qrcode)
        .bind(&record.credential)
        .bind(record.retries as i64)
        .bind(record.battery.map(|b| b as i64))
        .bind(record.plugged)
        .bind(record.is_default)
        .bind(format_datetime(&record.created_at))
        .bind(format_datetime(&record.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Fetch one account record.
    pub async fn get(&self, account_id: AccountId) -> Result<SessionRecord, StoreError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(account_id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(store_err)?
            .ok_or(StoreError::NotFound)?;
        SessionRow::from_row(&row)
            .map_err(store_err)?
            .into_record()
    }

    /// List all account records, oldest id first.
    pub async fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM accounts ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(store_err)?;
        rows.iter()
            .map(|row| SessionRow::from_row(row).map_err(store_err)?.into_record())
            .collect()
    }
}

impl SessionStore for SqliteSessionStore {
    async fn update(&self, account_id: AccountId, patch: SessionPatch) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE accounts SET
                status = COALESCE(?, status),
                qrcode = COALESCE(?, qrcode),
                credential = COALESCE(?, credential),
                retries = COALESCE(?, retries),
                battery = COALESCE(?, battery),
                plugged = COALESCE(?, plugged),
                updated_at = ?
             WHERE id = ?",
        )
        .bind(patch.status.map(|s| s.to_string()))
        .bind(patch.qrcode)
        .bind(patch.credential)
        .bind(patch.retries.map(|r| r as i64))
        .bind(patch.battery.map(|b| b as i64))
        .bind(patch.plugged)
        .bind(format_datetime(&Utc::now()))
        .bind(account_id.0)
        .execute(&self.pool.writer)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Internal row type for mapping SQLite rows to the domain record.
struct SessionRow {
    id: i64,
    name: String,
    status: String,
    qrcode: String,
    credential: String,
    retries: i64,
    battery: Option<i64>,
    plugged: Option<bool>,
    is_default: bool,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            qrcode: row.try_get("qrcode")?,
            credential: row.try_get("credential")?,
            retries: row.try_get("retries")?,
            battery: row.try_get("battery")?,
            plugged: row.try_get("plugged")?,
            is_default: row.try_get("is_default")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, StoreError> {
        let status: SessionStatus = self
            .status
            .parse()
            .map_err(|e: String| StoreError::Query(e))?;

        Ok(SessionRecord {
            id: AccountId(self.id),
            name: self.name,
            status,
            qrcode: self.qrcode,
            credential: self.credential,
            retries: self.retries as u32,
            battery: self.battery.map(|b| b as u8),
            plugged: self.plugged,
            is_default: self.is_default,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (SqliteSessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteSessionStore::new(pool), dir)
    }

    fn record(id: i64) -> SessionRecord {
        SessionRecord::new(AccountId(id), format!("account-{id}"))
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let (store, _dir) = store().await;
        let mut rec = record(1);
        rec.status = SessionStatus::Qrcode;
        rec.qrcode = "ABC".to_string();
        rec.battery = Some(55);
        rec.plugged = Some(false);

        store.create(&rec).await.unwrap();
        let loaded = store.get(AccountId(1)).await.unwrap();

        assert_eq!(loaded.name, "account-1");
        assert_eq!(loaded.status, SessionStatus::Qrcode);
        assert_eq!(loaded.qrcode, "ABC");
        assert_eq!(loaded.battery, Some(55));
        assert_eq!(loaded.plugged, Some(false));
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let (store, _dir) = store().await;
        assert!(matches!(
            store.get(AccountId(9)).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn update_patches_only_given_fields() {
        let (store, _dir) = store().await;
        let mut rec = record(1);
        rec.credential = "blob".to_string();
        rec.retries = 3;
        store.create(&rec).await.unwrap();

        store
            .update(
                AccountId(1),
                SessionPatch {
                    status: Some(SessionStatus::Connected),
                    qrcode: Some(String::new()),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = store.get(AccountId(1)).await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Connected);
        assert_eq!(loaded.retries, 0);
        // fields absent from the patch keep their stored values
        assert_eq!(loaded.credential, "blob");
        assert_eq!(loaded.name, "account-1");
    }

    #[tokio::test]
    async fn update_missing_returns_not_found() {
        let (store, _dir) = store().await;
        let result = store
            .update(
                AccountId(42),
                SessionPatch {
                    status: Some(SessionStatus::Opening),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn list_returns_records_in_id_order() {
        let (store, _dir) = store().await;
        store.create(&record(2)).await.unwrap();
        store.create(&record(1)).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, AccountId(1));
        assert_eq!(all[1].id, AccountId(2));
    }
}
