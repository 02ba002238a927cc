//! Durable origin → target message id mapping.
//!
//! Every operation opens its own SQLite connection, does its work in a short
//! transaction and closes it again. A single async gate serialises the
//! open-use-close spans so at most one store operation runs at a time.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::{
    domain::{IdMapping, MessageId},
    Error, Result,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS id_mapping (
    origin_id INTEGER PRIMARY KEY,
    target_id INTEGER NOT NULL
)";

pub struct IdStore {
    path: PathBuf,
    gate: Mutex<()>,
}

impl IdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist one pair. `None` means the outbound call produced no message.
    pub async fn insert_one(
        &self,
        origin_id: MessageId,
        target_id: Option<MessageId>,
    ) -> Result<()> {
        let Some(target_id) = target_id else {
            return Ok(());
        };
        self.insert_many(&[IdMapping {
            origin_id,
            target_id,
        }])
        .await
    }

    /// Persist all pairs in one transaction.
    pub async fn insert_many(&self, pairs: &[IdMapping]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let pairs = pairs.to_vec();
        let ignored = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let mut ignored = Vec::new();
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO id_mapping (origin_id, target_id) VALUES (?1, ?2)",
                    )?;
                    for pair in &pairs {
                        let changed = stmt.execute(params![pair.origin_id.0, pair.target_id.0])?;
                        if changed == 0 {
                            ignored.push(pair.origin_id);
                        }
                    }
                }
                tx.commit()?;
                Ok(ignored)
            })
            .await?;

        for origin_id in ignored {
            tracing::warn!(origin_id = origin_id.0, "mapping already exists, keeping the first one");
        }
        Ok(())
    }

    pub async fn lookup(&self, origin_id: MessageId) -> Result<MessageId> {
        let target = self
            .with_conn(move |conn| {
                let target = conn
                    .query_row(
                        "SELECT target_id FROM id_mapping WHERE origin_id = ?1",
                        params![origin_id.0],
                        |row| row.get::<_, i32>(0),
                    )
                    .optional()?;
                Ok(target)
            })
            .await?;

        target
            .map(MessageId)
            .ok_or(Error::NotFound { origin_id })
    }

    pub async fn len(&self) -> Result<usize> {
        let count = self
            .with_conn(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM id_mapping", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let _gate = self.gate.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA)?;
            let out = op(&mut conn);
            if let Err((_, e)) = conn.close() {
                tracing::warn!(path = %path.display(), "failed to close store: {e}");
            }
            out
        })
        .await?
    }
}
