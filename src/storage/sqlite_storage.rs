use crate::{
    domain::{Card, EntityId, List, PendingAction, PendingOp, QueueId},
    error::{KanbanError, Result},
    storage::VersionStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS lists (
        id TEXT PRIMARY KEY NOT NULL,
        data TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS cards (
        id TEXT PRIMARY KEY NOT NULL,
        data TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sync_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        op TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
";

fn db_error(err: rusqlite::Error) -> KanbanError {
    KanbanError::StorageError(format!("sqlite: {err}"))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

/// SQLite-based storage backend.
///
/// Entities are stored as JSON documents keyed by id. All statements run on
/// tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(database_path).map_err(db_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| KanbanError::StorageError(format!("connection lock poisoned: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| KanbanError::StorageError(format!("sqlite task failed: {e}")))?
    }

    fn upsert(conn: &Connection, table: &'static str, id: &EntityId, data: &str) -> Result<()> {
        let sql = format!("INSERT OR REPLACE INTO {table} (id, data) VALUES (?1, ?2)");
        conn.execute(&sql, params![id.as_str(), data])
            .map_err(db_error)?;
        Ok(())
    }

    fn load_all<T: DeserializeOwned>(conn: &Connection, table: &'static str) -> Result<Vec<T>> {
        let sql = format!("SELECT data FROM {table} ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_error)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(from_json(&raw.map_err(db_error)?)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl VersionStore for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.call(|conn| conn.execute_batch(SCHEMA).map_err(db_error))
            .await
    }

    async fn save_list(&self, list: &List) -> Result<()> {
        let id = list.id.clone();
        let data = to_json(list)?;
        self.call(move |conn| Self::upsert(conn, "lists", &id, &data))
            .await
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        let id = card.id.clone();
        let data = to_json(card)?;
        self.call(move |conn| Self::upsert(conn, "cards", &id, &data))
            .await
    }

    async fn get_all_lists(&self) -> Result<Vec<List>> {
        self.call(|conn| Self::load_all(conn, "lists")).await
    }

    async fn get_all_cards(&self) -> Result<Vec<Card>> {
        self.call(|conn| Self::load_all(conn, "cards")).await
    }

    async fn delete_list(&self, id: &EntityId) -> Result<()> {
        let id = id.clone();
        self.call(move |conn| {
            conn.execute("DELETE FROM lists WHERE id = ?1", params![id.as_str()])
                .map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn delete_card(&self, id: &EntityId) -> Result<()> {
        let id = id.clone();
        self.call(move |conn| {
            conn.execute("DELETE FROM cards WHERE id = ?1", params![id.as_str()])
                .map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn save_all_data(&self, lists: &[List], cards: &[Card]) -> Result<()> {
        let lists = lists
            .iter()
            .map(|l| Ok((l.id.clone(), to_json(l)?)))
            .collect::<Result<Vec<_>>>()?;
        let cards = cards
            .iter()
            .map(|c| Ok((c.id.clone(), to_json(c)?)))
            .collect::<Result<Vec<_>>>()?;

        self.call(move |conn| {
            let tx = conn.transaction().map_err(db_error)?;
            tx.execute("DELETE FROM lists", []).map_err(db_error)?;
            tx.execute("DELETE FROM cards", []).map_err(db_error)?;
            for (id, data) in &lists {
                Self::upsert(&tx, "lists", id, data)?;
            }
            for (id, data) in &cards {
                Self::upsert(&tx, "cards", id, data)?;
            }
            tx.commit().map_err(db_error)
        })
        .await
    }

    async fn clear_all_data(&self) -> Result<()> {
        self.call(|conn| {
            let tx = conn.transaction().map_err(db_error)?;
            tx.execute_batch("DELETE FROM lists; DELETE FROM cards; DELETE FROM sync_queue;")
                .map_err(db_error)?;
            tx.commit().map_err(db_error)
        })
        .await
    }

    async fn add_to_sync_queue(&self, op: PendingOp) -> Result<QueueId> {
        let data = to_json(&op)?;
        let timestamp = Utc::now().to_rfc3339();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO sync_queue (op, timestamp) VALUES (?1, ?2)",
                params![data, timestamp],
            )
            .map_err(db_error)?;
            let rowid = conn.last_insert_rowid();
            u64::try_from(rowid)
                .map(QueueId)
                .map_err(|_| KanbanError::StorageError(format!("negative queue id {rowid}")))
        })
        .await
    }

    async fn get_sync_queue(&self) -> Result<Vec<PendingAction>> {
        self.call(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, op, timestamp FROM sync_queue ORDER BY id")
                .map_err(db_error)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(db_error)?;

            let mut queue = Vec::new();
            for row in rows {
                let (id, op, timestamp) = row.map_err(db_error)?;
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| KanbanError::StorageError(format!("bad queue timestamp: {e}")))?
                    .with_timezone(&Utc);
                queue.push(PendingAction {
                    id: QueueId(id as u64),
                    op: from_json(&op)?,
                    timestamp,
                });
            }
            Ok(queue)
        })
        .await
    }

    async fn remove_from_sync_queue(&self, id: QueueId) -> Result<()> {
        self.call(move |conn| {
            conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id.0 as i64])
                .map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn clear_sync_queue(&self) -> Result<()> {
        self.call(|conn| {
            conn.execute("DELETE FROM sync_queue", []).map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn is_initialized(&self) -> bool {
        self.call(|conn| {
            conn.query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'sync_queue'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(db_error)
        })
        .await
        .map(|found| found.is_some())
        .unwrap_or(false)
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListUpdate;
    use tempfile::TempDir;

    fn list(id: &str) -> List {
        let mut list = List::new(id.to_uppercase(), 0);
        list.id = EntityId::from(id);
        list
    }

    async fn storage() -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.initialize().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(!storage.is_initialized().await);
        storage.initialize().await.unwrap();
        storage.initialize().await.unwrap();
        assert!(storage.is_initialized().await);
    }

    #[tokio::test]
    async fn test_lists_sorted_by_id() {
        let storage = storage().await;
        storage.save_list(&list("b")).await.unwrap();
        storage.save_list(&list("a")).await.unwrap();

        let ids: Vec<_> = storage
            .get_all_lists()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![EntityId::from("a"), EntityId::from("b")]);
    }

    #[tokio::test]
    async fn test_save_all_data_replaces_contents() {
        let storage = storage().await;
        storage.save_list(&list("old")).await.unwrap();

        let card = Card::new(EntityId::from("new"), "Card", 0);
        storage
            .save_all_data(&[list("new")], std::slice::from_ref(&card))
            .await
            .unwrap();

        let lists = storage.get_all_lists().await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].id.as_str(), "new");
        assert_eq!(storage.get_all_cards().await.unwrap(), vec![card]);
    }

    #[tokio::test]
    async fn test_queue_keys_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("board.db");

        let first = {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.initialize().await.unwrap();
            storage
                .add_to_sync_queue(PendingOp::UpdateList {
                    id: "l1".into(),
                    updates: ListUpdate::title("Done"),
                })
                .await
                .unwrap()
        };

        let storage = SqliteStorage::open(&path).unwrap();
        let queue = storage.get_sync_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, first);
        assert_eq!(queue[0].op.kind(), "UPDATE_LIST");

        storage.clear_sync_queue().await.unwrap();
        let next = storage
            .add_to_sync_queue(PendingOp::DeleteList { id: "l1".into() })
            .await
            .unwrap();
        assert!(next > first);
    }
}
