//! SQLite storage backend.
//!
//! Objects are stored directly in a SQLite database, one row per key.
//! This backend is useful for single-node deployments where all data
//! should live in a single file and survive restarts.
//!
//! Because `rusqlite::Connection` is `!Send`, we wrap it in a
//! `std::sync::Mutex` behind an `Arc` and use `tokio::task::spawn_blocking`
//! for every database operation.

use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::backend::{
    compute_etag, try_group_listing, ListOptions, ListResult, ObjectMeta, ObjectStore, PutOptions,
    StoredObject,
};

const META_COLUMNS: &str = "key, size, content_type, etag, uploaded_ms";

/// SQLite-backed object store.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) a SQLite database at `db_path` and initialise
    /// the objects table.
    ///
    /// Configures WAL journal mode and a 5-second busy timeout.
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA busy_timeout=5000;\
             PRAGMA synchronous=NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (\
                 key          TEXT PRIMARY KEY,\
                 data         BLOB NOT NULL,\
                 size         INTEGER NOT NULL,\
                 content_type TEXT,\
                 etag         TEXT NOT NULL,\
                 uploaded_ms  INTEGER NOT NULL\
             );",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Mutex poisoned: {e}"))?;
            f(&conn)
        })
        .await?
    }
}

fn millis_since_epoch(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Map a row selected with [`META_COLUMNS`] to an [`ObjectMeta`].
fn meta_from_row(row: &Row<'_>) -> rusqlite::Result<ObjectMeta> {
    let size: i64 = row.get(1)?;
    let uploaded_ms: i64 = row.get(4)?;
    Ok(ObjectMeta {
        key: row.get(0)?,
        size: size.max(0) as u64,
        content_type: row.get(2)?,
        etag: row.get(3)?,
        uploaded: UNIX_EPOCH + Duration::from_millis(uploaded_ms.max(0) as u64),
    })
}

// ── ObjectStore implementation ─────────────────────────────────────────

impl ObjectStore for SqliteBackend {
    fn head(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<ObjectMeta>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.with_conn(move |conn| {
                let meta = conn
                    .query_row(
                        &format!("SELECT {META_COLUMNS} FROM objects WHERE key = ?1"),
                        params![key],
                        meta_from_row,
                    )
                    .optional()?;
                Ok(meta)
            })
            .await
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.with_conn(move |conn| {
                let object = conn
                    .query_row(
                        &format!("SELECT {META_COLUMNS}, data FROM objects WHERE key = ?1"),
                        params![key],
                        |row| {
                            let meta = meta_from_row(row)?;
                            let data: Vec<u8> = row.get(5)?;
                            Ok(StoredObject {
                                body: Bytes::from(data),
                                meta,
                            })
                        },
                    )
                    .optional()?;
                Ok(object)
            })
            .await
        })
    }

    fn put(
        &self,
        key: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ObjectMeta>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let meta = ObjectMeta {
                key,
                size: body.len() as u64,
                uploaded: SystemTime::now(),
                etag: compute_etag(&body),
                content_type: options.content_type,
            };
            let row = meta.clone();
            self.with_conn(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO objects \
                     (key, data, size, content_type, etag, uploaded_ms) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        row.key,
                        body.as_ref(),
                        row.size as i64,
                        row.content_type,
                        row.etag,
                        millis_since_epoch(row.uploaded),
                    ],
                )?;
                Ok(())
            })
            .await?;
            Ok(meta)
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.with_conn(move |conn| {
                conn.execute("DELETE FROM objects WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
        })
    }

    fn list(
        &self,
        options: ListOptions,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListResult>> + Send + '_>> {
        Box::pin(async move {
            self.with_conn(move |conn| {
                // The primary key index serves `key >= prefix` in order; rows
                // are read only until they leave the prefix or the limit is
                // reached.
                let mut stmt = conn.prepare(&format!(
                    "SELECT {META_COLUMNS} FROM objects WHERE key >= ?1 ORDER BY key"
                ))?;
                let prefix = options.prefix.clone();
                let rows = stmt
                    .query_map(params![prefix], meta_from_row)?
                    .take_while(|row| match row {
                        Ok(meta) => meta.key.starts_with(&prefix),
                        Err(_) => true,
                    });
                Ok(try_group_listing(rows, &options)?)
            })
            .await
        })
    }
}
