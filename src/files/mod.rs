mod download;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use axum::{Router, routing::get};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tokio::{fs::File, sync::RwLock};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ChatError, ChatResult},
    rooms::RoomId,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/files/{file_id}", get(download::download))
        .route("/api/files/{file_id}", get(download::download))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub file_id: FileId,
    pub room_id: RoomId,
    pub original_name: String,
    pub media_type: String,
    pub stored_location: PathBuf,
    pub size: usize,
}

pub struct FileStore {
    dir: PathBuf,
    max_bytes: usize,
    records: RwLock<HashMap<FileId, FileRecord>>,
}

impl FileStore {
    pub async fn open(dir: impl Into<PathBuf>, max_bytes: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            max_bytes,
            records: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn store(
        &self,
        room_id: RoomId,
        payload: &str,
        name: &str,
        media_type: &str,
    ) -> ChatResult<FileRecord> {
        let encoded = strip_data_url(payload);
        let estimate = encoded.len() / 4 * 3;
        if estimate > self.max_bytes.saturating_add(2) {
            return Err(ChatError::Oversized {
                size: estimate,
                limit: self.max_bytes,
            });
        }

        let bytes = STANDARD.decode(encoded)?;
        if bytes.len() > self.max_bytes {
            return Err(ChatError::Oversized {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let file_id = FileId::generate();
        let stored_name = match extension_of(name) {
            Some(ext) => format!("{file_id}.{ext}"),
            None => file_id.to_string(),
        };
        let stored_location = self.dir.join(stored_name);

        if let Err(err) = tokio::fs::write(&stored_location, &bytes).await {
            let _ = tokio::fs::remove_file(&stored_location).await;
            tracing::warn!(file = %file_id, error = %err, "Failed to write upload");
            return Err(err.into());
        }

        let record = FileRecord {
            file_id,
            room_id,
            original_name: name.to_owned(),
            media_type: media_type.to_owned(),
            stored_location,
            size: bytes.len(),
        };
        self.records.write().await.insert(file_id, record.clone());

        tracing::info!(file = %file_id, room = %room_id, size = record.size, "Stored upload");
        Ok(record)
    }

    pub async fn retrieve(&self, file_id: FileId) -> ChatResult<(FileRecord, File)> {
        let record = self
            .records
            .read()
            .await
            .get(&file_id)
            .cloned()
            .ok_or_else(|| ChatError::FileNotFound(file_id.to_string()))?;

        match File::open(&record.stored_location).await {
            Ok(file) => Ok((record, file)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(file = %file_id, "Upload missing from disk");
                Err(ChatError::FileNotFound(file_id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

}

fn strip_data_url(payload: &str) -> &str {
    let payload = payload.trim();
    if payload.starts_with("data:") {
        if let Some(idx) = payload.find(";base64,") {
            return &payload[idx + ";base64,".len()..];
        }
    }
    payload
}

fn extension_of(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    let keep = !stem.is_empty()
        && (1..=16).contains(&ext.len())
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    keep.then_some(ext)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    async fn contents(store: &FileStore, file_id: FileId) -> (FileRecord, Vec<u8>) {
        let (record, mut file) = store.retrieve(file_id).await.unwrap();
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await.unwrap();
        (record, bytes)
    }

    async fn store(max_bytes: usize) -> (FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("uploads"), max_bytes).await.unwrap();
        (store, dir)
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:text/plain;base64,YWJj"), "YWJj");
        assert_eq!(strip_data_url("YWJj"), "YWJj");
        assert_eq!(strip_data_url("data:,plain"), "data:,plain");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.txt"), Some("txt"));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("evil.../../x"), None);
        assert_eq!(extension_of("a.averyveryverylongextension"), None);
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let (store, _dir) = store(1024).await;
        let room = RoomId::generate();

        let record = store
            .store(room, "data:text/plain;base64,YWJj", "a.txt", "text/plain")
            .await
            .unwrap();

        assert_eq!(record.size, 3);
        assert_eq!(record.room_id, room);
        assert_eq!(record.original_name, "a.txt");
        assert!(record.stored_location.starts_with(store.dir()));
        assert_eq!(record.stored_location.extension().unwrap(), "txt");

        let (found, bytes) = contents(&store, record.file_id).await;
        assert_eq!(found, record);
        assert_eq!(bytes, b"abc");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (store, _dir) = store(1024).await;
        let room = RoomId::generate();

        let a = store.store(room, "YWJj", "same.txt", "text/plain").await.unwrap();
        let b = store.store(room, "YWJj", "same.txt", "text/plain").await.unwrap();

        assert_ne!(a.file_id, b.file_id);
        assert_ne!(a.stored_location, b.stored_location);
    }

    #[tokio::test]
    async fn test_oversized_rejected() {
        let (store, _dir) = store(2).await;

        let result = store.store(RoomId::generate(), "YWJj", "a.txt", "text/plain").await;

        assert!(matches!(result, Err(ChatError::Oversized { size: 3, limit: 2 })));
        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_rejected_before_decoding() {
        let (store, _dir) = store(10).await;
        // not valid base64, but far too long to be worth decoding
        let payload = "!".repeat(4096);

        let result = store.store(RoomId::generate(), &payload, "a.bin", "").await;

        assert!(matches!(result, Err(ChatError::Oversized { .. })));
    }

    #[tokio::test]
    async fn test_unbounded_limit_does_not_overflow() {
        let (store, _dir) = store(usize::MAX).await;

        let record = store.store(RoomId::generate(), "YWJj", "a.txt", "").await.unwrap();

        assert_eq!(contents(&store, record.file_id).await.1, b"abc");
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let (store, _dir) = store(1024).await;

        let result = store.store(RoomId::generate(), "not base64!", "a.txt", "").await;

        assert!(matches!(result, Err(ChatError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_retrieve_unknown() {
        let (store, _dir) = store(1024).await;

        assert!(matches!(
            store.retrieve(FileId::generate()).await,
            Err(ChatError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieve_deleted_from_disk() {
        let (store, _dir) = store(1024).await;
        let record = store.store(RoomId::generate(), "YWJj", "a.txt", "").await.unwrap();
        tokio::fs::remove_file(&record.stored_location).await.unwrap();

        assert!(matches!(
            store.retrieve(record.file_id).await,
            Err(ChatError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_write_failure_reports_io() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let store = FileStore::open(&uploads, 1024).await.unwrap();
        tokio::fs::remove_dir(&uploads).await.unwrap();

        let result = store.store(RoomId::generate(), "YWJj", "a.txt", "").await;

        assert!(matches!(result, Err(ChatError::Io(_))));
    }
}
