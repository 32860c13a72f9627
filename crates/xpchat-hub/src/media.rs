use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use xpchat_types::ChatError;
use xpchat_types::collab::{MediaStore, media_path, validate_image};
use xpchat_types::models::{Identity, MediaFile, RoomRef};

/// URL scheme of objects kept by [`MemoryMediaStore`].
pub const MEMORY_URL_PREFIX: &str = "mem://";

/// Image store that keeps uploads in memory, keyed by storage path.
#[derive(Clone, Default)]
pub struct MemoryMediaStore {
    objects: Arc<RwLock<HashMap<String, (String, Bytes)>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and bytes stored under `url`.
    pub async fn get(&self, url: &str) -> Option<(String, Bytes)> {
        let path = url.strip_prefix(MEMORY_URL_PREFIX)?;
        self.objects.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(
        &self,
        room: &RoomRef,
        uploader: &Identity,
        file: MediaFile,
    ) -> Result<String, ChatError> {
        validate_image(&file, true)?;

        let path = media_path(room, uploader, &file, Utc::now().timestamp_millis());
        info!("Stored {} bytes at {path}", file.size());
        self.objects
            .write()
            .await
            .insert(path.clone(), (file.mime, file.data));
        Ok(format!("{MEMORY_URL_PREFIX}{path}"))
    }
}
