//! Database repository for the store tree.
//!
//! Uses transactions so a write batch and its revision bump commit together.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};

use crate::errors::RemoteWriteError;
use crate::models::Snapshot;
use crate::store::{PathError, StorePath, WriteBatch};

/// Database repository for all tree operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Read the subtree at `path` together with the revision it belongs to.
    pub async fn read_subtree(&self, path: &StorePath) -> Result<Snapshot, sqlx::Error> {
        let (lower, upper) = subtree_bounds(path);

        // One read transaction so the revision matches the rows.
        let mut tx = self.pool.begin().await?;

        let meta = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;

        let rows = sqlx::query(
            "SELECT path, value FROM nodes WHERE path = ? OR (path >= ? AND path < ?) ORDER BY path",
        )
        .bind(path.as_str())
        .bind(&lower)
        .bind(&upper)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let leaves = rows
            .iter()
            .map(|row| (row.get::<String, _>("path"), row.get::<String, _>("value")));

        Ok(Snapshot {
            revision_id: meta.get("revision_id"),
            payload: assemble(path.as_str(), leaves),
        })
    }

    /// Apply a write batch atomically and return the new revision.
    pub async fn apply_batch(&self, batch: &WriteBatch) -> Result<i64, RemoteWriteError> {
        batch.validate()?;

        let mut tx = self.pool.begin().await?;

        for (path, value) in batch.iter() {
            let (lower, upper) = subtree_bounds(path);
            sqlx::query("DELETE FROM nodes WHERE path = ? OR (path >= ? AND path < ?)")
                .bind(path.as_str())
                .bind(&lower)
                .bind(&upper)
                .execute(&mut *tx)
                .await?;

            // A scalar stored above this path would shadow the new children.
            for ancestor in path.ancestors() {
                sqlx::query("DELETE FROM nodes WHERE path = ?")
                    .bind(ancestor)
                    .execute(&mut *tx)
                    .await?;
            }

            let mut leaves = Vec::new();
            flatten(path, value, &mut leaves)?;
            for (leaf_path, leaf_value) in leaves {
                sqlx::query("INSERT INTO nodes (path, value) VALUES (?, ?)")
                    .bind(leaf_path.as_str())
                    .bind(&leaf_value)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        // Increment revision once for the entire batch
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.get("revision_id"))
    }
}

// Helper functions for tree conversion

/// Range covering every path strictly below `path` (`'0'` follows `'/'`).
fn subtree_bounds(path: &StorePath) -> (String, String) {
    (format!("{}/", path), format!("{}0", path))
}

/// Split a value into scalar leaves. `null` and empty containers produce none.
fn flatten(
    path: &StorePath,
    value: &Value,
    out: &mut Vec<(StorePath, String)>,
) -> Result<(), PathError> {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&path.child(key)?, child, out)?;
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                flatten(&path.child(&idx.to_string())?, child, out)?;
            }
        }
        scalar => out.push((path.clone(), scalar.to_string())),
    }
    Ok(())
}

/// Rebuild the nested value under `root` from its sorted leaves.
fn assemble(root: &str, leaves: impl Iterator<Item = (String, String)>) -> Option<Value> {
    let mut tree: Option<Value> = None;

    'leaves: for (path, raw) in leaves {
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Skipping unreadable leaf {}: {}", path, e);
                continue;
            }
        };

        if path == root {
            return Some(value);
        }

        let relative = &path[root.len() + 1..];
        let segments: Vec<&str> = relative.split('/').collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut node = tree.get_or_insert_with(|| Value::Object(Map::new()));
        for segment in parents {
            node = match node {
                Value::Object(map) => map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => continue 'leaves,
            };
        }
        if let Value::Object(map) = node {
            map.insert(last.to_string(), value);
        }
    }

    tree
}
