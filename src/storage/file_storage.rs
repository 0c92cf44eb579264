use crate::{
    config::KanbanConfig,
    domain::{Card, EntityId, List, PendingAction, PendingOp, QueueId},
    error::Result,
    storage::VersionStore,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::debug;

/// Lists and cards keyed by id, stored together so a replace is one rename
#[derive(Debug, Default, Serialize, Deserialize)]
struct BoardDocument {
    #[serde(default)]
    lists: BTreeMap<EntityId, List>,
    #[serde(default)]
    cards: BTreeMap<EntityId, Card>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueDocument {
    #[serde(default)]
    last_id: u64,
    #[serde(default)]
    actions: Vec<PendingAction>,
}

/// File-based storage implementation.
///
/// Each collection lives in one JSON document that is rewritten through a
/// temporary file and renamed into place.
pub struct FileStorage {
    root_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub const DATA_DIR: &'static str = ".kanban";
    const BOARD_FILE: &'static str = "board.json";
    const QUEUE_FILE: &'static str = "sync_queue.json";

    /// Creates a FileStorage under `<project_root>/.kanban`
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self::at(project_root.as_ref().join(Self::DATA_DIR))
    }

    /// Creates a FileStorage rooted directly at `data_dir`
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_path: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a FileStorage in the configured data directory
    pub fn from_config(config: &KanbanConfig) -> Self {
        Self::at(&config.data_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    fn queue_file(&self) -> PathBuf {
        self.root_path.join(Self::QUEUE_FILE)
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn read_document<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        if !path.exists() {
            return Ok(T::default());
        }
        let contents = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write_document<T: Serialize>(&self, path: &Path, document: &T) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let json = serde_json::to_string_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "wrote document");
        Ok(())
    }

    async fn update_board<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BoardDocument) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.board_file();
        let mut document: BoardDocument = self.read_document(&path).await?;
        mutate(&mut document);
        self.write_document(&path, &document).await
    }

    async fn update_queue<F, T>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut QueueDocument) -> T + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.queue_file();
        let mut document: QueueDocument = self.read_document(&path).await?;
        let out = mutate(&mut document);
        self.write_document(&path, &document).await?;
        Ok(out)
    }
}

#[async_trait]
impl VersionStore for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        if !self.board_file().exists() {
            self.write_document(&self.board_file(), &BoardDocument::default())
                .await?;
        }
        if !self.queue_file().exists() {
            self.write_document(&self.queue_file(), &QueueDocument::default())
                .await?;
        }

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Interrupted writes\n*.tmp\n").await?;
        }

        Ok(())
    }

    async fn save_list(&self, list: &List) -> Result<()> {
        let list = list.clone();
        self.update_board(move |doc| {
            doc.lists.insert(list.id.clone(), list);
        })
        .await
    }

    async fn save_card(&self, card: &Card) -> Result<()> {
        let card = card.clone();
        self.update_board(move |doc| {
            doc.cards.insert(card.id.clone(), card);
        })
        .await
    }

    async fn get_all_lists(&self) -> Result<Vec<List>> {
        let document: BoardDocument = self.read_document(&self.board_file()).await?;
        Ok(document.lists.into_values().collect())
    }

    async fn get_all_cards(&self) -> Result<Vec<Card>> {
        let document: BoardDocument = self.read_document(&self.board_file()).await?;
        Ok(document.cards.into_values().collect())
    }

    async fn delete_list(&self, id: &EntityId) -> Result<()> {
        let id = id.clone();
        self.update_board(move |doc| {
            doc.lists.remove(&id);
        })
        .await
    }

    async fn delete_card(&self, id: &EntityId) -> Result<()> {
        let id = id.clone();
        self.update_board(move |doc| {
            doc.cards.remove(&id);
        })
        .await
    }

    async fn save_all_data(&self, lists: &[List], cards: &[Card]) -> Result<()> {
        let document = BoardDocument {
            lists: lists.iter().map(|l| (l.id.clone(), l.clone())).collect(),
            cards: cards.iter().map(|c| (c.id.clone(), c.clone())).collect(),
        };
        let _guard = self.write_lock.lock().await;
        self.write_document(&self.board_file(), &document).await
    }

    async fn clear_all_data(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_document(&self.board_file(), &BoardDocument::default())
            .await?;
        // keep the id counter so cleared keys are never handed out again
        let path = self.queue_file();
        let mut queue: QueueDocument = self.read_document(&path).await?;
        queue.actions.clear();
        self.write_document(&path, &queue).await
    }

    async fn add_to_sync_queue(&self, op: PendingOp) -> Result<QueueId> {
        self.update_queue(move |doc| {
            doc.last_id += 1;
            let id = QueueId(doc.last_id);
            doc.actions.push(PendingAction {
                id,
                op,
                timestamp: Utc::now(),
            });
            id
        })
        .await
    }

    async fn get_sync_queue(&self) -> Result<Vec<PendingAction>> {
        let document: QueueDocument = self.read_document(&self.queue_file()).await?;
        Ok(document.actions)
    }

    async fn remove_from_sync_queue(&self, id: QueueId) -> Result<()> {
        self.update_queue(move |doc| doc.actions.retain(|a| a.id != id))
            .await
    }

    async fn clear_sync_queue(&self) -> Result<()> {
        self.update_queue(|doc| doc.actions.clear()).await
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.board_file().exists()
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("root_path", &self.root_path)
            .finish()
    }
}
