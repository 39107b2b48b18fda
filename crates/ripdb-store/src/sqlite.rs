//! SQLite implementation of the stream and key-value traits.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ripdb_core::{ChannelId, MessageId};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::now_millis;
use crate::traits::{KeyValueStore, StreamEntry, StreamStore, Wrapped};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. Appends to a stream run inside a
/// transaction so concurrent appends never share an id.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {e}")))?
    }
}

fn to_message_id(raw: i64) -> Result<MessageId> {
    u64::try_from(raw)
        .map(MessageId)
        .map_err(|_| StoreError::InvalidData(format!("negative message id {raw}")))
}

fn to_sql_id(id: MessageId) -> Result<i64> {
    i64::try_from(id.value())
        .map_err(|_| StoreError::InvalidData(format!("message id {id} out of range")))
}

#[async_trait]
impl StreamStore for SqliteStore {
    async fn append(&self, stream: &ChannelId, payload: &str) -> Result<MessageId> {
        let stream = stream.as_str().to_owned();
        let payload = payload.to_owned();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let next: i64 = tx.query_row(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM stream_entries WHERE stream = ?1",
                params![stream],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO stream_entries (stream, id, payload, appended_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![stream, next, payload, now_millis()],
            )?;

            tx.commit()?;
            to_message_id(next)
        })
        .await
    }

    async fn range(&self, stream: &ChannelId, after: Option<MessageId>) -> Result<Vec<StreamEntry>> {
        let stream = stream.as_str().to_owned();
        let after = after.map(to_sql_id).transpose()?.unwrap_or(0);

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM stream_entries
                 WHERE stream = ?1 AND id > ?2
                 ORDER BY id",
            )?;

            let rows = stmt
                .query_map(params![stream, after], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, payload)| {
                    Ok(StreamEntry {
                        id: to_message_id(id)?,
                        payload,
                    })
                })
                .collect()
        })
        .await
    }

    async fn last_id(&self, stream: &ChannelId) -> Result<Option<MessageId>> {
        let stream = stream.as_str().to_owned();

        self.blocking(move |conn| {
            let max: Option<i64> = conn.query_row(
                "SELECT MAX(id) FROM stream_entries WHERE stream = ?1",
                params![stream],
                |row| row.get(0),
            )?;
            max.map(to_message_id).transpose()
        })
        .await
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn set(&self, key: &str, value: Value) -> Result<Wrapped<Value>> {
        let encoded = serde_json::to_string(&value)?;
        let wrapped = Wrapped {
            key: key.to_owned(),
            data: value,
            stored_at: now_millis(),
        };
        let key = wrapped.key.clone();
        let stored_at = wrapped.stored_at;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, stored_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
                params![key, encoded, stored_at],
            )?;
            Ok(())
        })
        .await?;

        Ok(wrapped)
    }

    async fn purge(&self, key: &str) -> Result<bool> {
        let key = key.to_owned();

        self.blocking(move |conn| {
            let removed = conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Wrapped<Value>> {
        let key = key.to_owned();

        self.blocking(move |conn| {
            let row: Option<(String, i64)> = conn
                .query_row(
                    "SELECT value, stored_at FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let (value, stored_at) = row.ok_or_else(|| StoreError::NotFound(key.clone()))?;
            Ok(Wrapped {
                data: serde_json::from_str(&value)?,
                key,
                stored_at,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_range() {
        let store = SqliteStore::open_memory().unwrap();
        let s = ChannelId::named("s");

        assert_eq!(store.append(&s, "a").await.unwrap(), MessageId(1));
        assert_eq!(store.append(&s, "b").await.unwrap(), MessageId(2));
        assert_eq!(store.append(&ChannelId::named("t"), "x").await.unwrap(), MessageId(1));

        let tail = store.range(&s, Some(MessageId(1))).await.unwrap();
        assert_eq!(
            tail,
            vec![StreamEntry {
                id: MessageId(2),
                payload: "b".into()
            }]
        );
        assert_eq!(store.last_id(&s).await.unwrap(), Some(MessageId(2)));
        assert_eq!(store.last_id(&ChannelId::named("none")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_kv_overwrite_and_purge() {
        let store = SqliteStore::open_memory().unwrap();

        store.set("k", json!({"v": 1})).await.unwrap();
        store.set("k", json!({"v": 2})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().data, json!({"v": 2}));

        assert!(store.purge("k").await.unwrap());
        assert!(store.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_ids() {
        let store = SqliteStore::open_memory().unwrap();
        let s = ChannelId::named("s");

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                store.append(&s, &i.to_string()).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        let expected: Vec<_> = (1..=16).map(MessageId).collect();
        assert_eq!(ids, expected);
    }
}
