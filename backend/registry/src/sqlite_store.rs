/// SQLite-backed durable subscription registry.
///
/// One row per endpoint in `push_subscriptions`. The payload is kept as the
/// JSON text the browser sent. Upserts are a single `ON CONFLICT` statement,
/// so a row is either fully written or absent, and the implicit rowid keeps
/// the original registration order across re-subscriptions.
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::sync::Mutex;
use tracing::{debug, info};

use pushcast_core::{
    ListFilter, ListOrder, RegistryError, SubscriptionPayload, SubscriptionRecord,
    SubscriptionRegistry,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS push_subscriptions (
        endpoint    TEXT PRIMARY KEY,
        payload     TEXT NOT NULL,
        created_at  INTEGER NOT NULL,
        updated_at  INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_push_subscriptions_updated
        ON push_subscriptions(updated_at);";

pub struct SqliteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteRegistry {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open subscription database {:?}", path.as_ref()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL journal")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize push_subscriptions schema")?;

        info!("SqliteRegistry opened at {:?}", path.as_ref());
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn unavailable(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::Unavailable(e.to_string())
}

#[async_trait]
impl SubscriptionRegistry for SqliteRegistry {
    async fn upsert(
        &self,
        endpoint: &str,
        payload: SubscriptionPayload,
    ) -> Result<SubscriptionRecord, RegistryError> {
        if endpoint.trim().is_empty() {
            return Err(RegistryError::InvalidEndpoint);
        }

        let payload_json = serde_json::to_string(payload.as_value()).map_err(unavailable)?;
        let now = Utc::now();
        let now_ms = now.timestamp_millis();

        let conn = self.conn.lock().await;
        let created_ms: i64 = conn
            .query_row(
                "INSERT INTO push_subscriptions (endpoint, payload, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(endpoint) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
                 RETURNING created_at",
                params![endpoint, payload_json, now_ms],
                |row| row.get(0),
            )
            .map_err(unavailable)?;
        debug!("Upserted subscription row");

        Ok(SubscriptionRecord {
            endpoint: endpoint.to_string(),
            payload,
            created_at: from_millis(created_ms).map_err(unavailable)?,
            updated_at: from_millis(now_ms).map_err(unavailable)?,
        })
    }

    async fn remove(&self, endpoint: &str) -> Result<bool, RegistryError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM push_subscriptions WHERE endpoint = ?1",
                params![endpoint],
            )
            .map_err(unavailable)?;
        Ok(deleted > 0)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<SubscriptionRecord>, RegistryError> {
        let order_by = match filter.order {
            ListOrder::Registration => "rowid ASC",
            ListOrder::RecentFirst => "updated_at DESC, rowid DESC",
        };
        let sql = if filter.endpoint.is_some() {
            format!(
                "SELECT endpoint, payload, created_at, updated_at
                 FROM push_subscriptions WHERE endpoint = ?1 ORDER BY {order_by}"
            )
        } else {
            format!(
                "SELECT endpoint, payload, created_at, updated_at
                 FROM push_subscriptions ORDER BY {order_by}"
            )
        };

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(unavailable)?;

        let rows = match &filter.endpoint {
            Some(endpoint) => stmt.query_map(params![endpoint], row_to_record),
            None => stmt.query_map([], row_to_record),
        }
        .map_err(unavailable)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(unavailable)
    }

    async fn count(&self) -> Result<usize, RegistryError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM push_subscriptions", [], |row| row.get(0))
            .map_err(unavailable)?;
        Ok(count as usize)
    }
}

// ---------------------------------------------------------------------------
// Row deserialization helpers
// ---------------------------------------------------------------------------

fn from_millis(ms: i64) -> Result<DateTime<Utc>, String> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| format!("timestamp out of range: {ms}"))
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SubscriptionRecord> {
    let endpoint: String = row.get(0)?;
    let payload_json: String = row.get(1)?;
    let created_ms: i64 = row.get(2)?;
    let updated_ms: i64 = row.get(3)?;

    let payload: serde_json::Value = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?;
    let created_at =
        from_millis(created_ms).map_err(rusqlite::Error::InvalidParameterName)?;
    let updated_at =
        from_millis(updated_ms).map_err(rusqlite::Error::InvalidParameterName)?;

    Ok(SubscriptionRecord {
        endpoint,
        payload: SubscriptionPayload::new(payload),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    fn store() -> SqliteRegistry {
        SqliteRegistry::in_memory().expect("in-memory db")
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        contract::upsert_is_idempotent(&store()).await;
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload() {
        contract::upsert_replaces_payload(&store()).await;
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_endpoint() {
        contract::upsert_rejects_empty_endpoint(&store()).await;
    }

    #[tokio::test]
    async fn test_remove_missing() {
        contract::remove_missing_is_not_an_error(&store()).await;
    }

    #[tokio::test]
    async fn test_list_orders() {
        contract::list_orders(&store()).await;
    }

    #[tokio::test]
    async fn test_payload_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("pushcast-reg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("subs.db");
        let _ = std::fs::remove_file(&path);

        {
            let registry = SqliteRegistry::open(&path).unwrap();
            registry
                .upsert("https://push/a", contract::payload("https://push/a", "kept"))
                .await
                .unwrap();
        }

        let registry = SqliteRegistry::open(&path).unwrap();
        let records = registry.list(&ListFilter::all()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload.as_value()["keys"]["auth"], "kept");

        drop(registry);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
