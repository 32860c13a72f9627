use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use tracing::info;

use xpchat_types::ChatError;
use xpchat_types::api::UploadResponse;
use xpchat_types::collab::{MediaStore, media_path, validate_image};
use xpchat_types::models::{Identity, MediaFile, RoomRef};

use crate::endpoint::EndpointClient;

/// Uploads chat images to an HTTP storage endpoint.
///
/// The raw bytes are POSTed with the image content type and the storage path
/// as `?path=`; the endpoint answers `{ "url": ... }`.
#[derive(Debug, Clone)]
pub struct HttpMediaStore {
    endpoint: EndpointClient,
}

impl HttpMediaStore {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        Ok(Self {
            endpoint: EndpointClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(
        &self,
        room: &RoomRef,
        uploader: &Identity,
        file: MediaFile,
    ) -> Result<String, ChatError> {
        validate_image(&file, true)?;
        let path = media_path(room, uploader, &file, Utc::now().timestamp_millis());
        info!("Uploading {} ({} bytes) to {}", file.name, file.size(), path);

        let builder = self
            .endpoint
            .client()
            .post(self.endpoint.url())
            .query(&[("path", path.as_str())])
            .header(CONTENT_TYPE, file.mime.as_str())
            .body(file.data);
        let reply: UploadResponse = self.endpoint.call(builder).await?;
        Ok(reply.url)
    }
}
