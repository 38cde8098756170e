//! Media service: cover image and avatar hosting

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{
    config::MediaConfig,
    error::{AppError, AppResult},
};

/// A stored image: the public URL plus the host-side identifier used
/// for later deletion.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

/// Talks to the image host over HTTP. Uploads are fatal on failure;
/// deletions are best-effort and only logged.
#[derive(Clone)]
pub struct MediaService {
    client: reqwest::Client,
    config: MediaConfig,
}

impl MediaService {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Upload an image and return its URL and public ID
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> AppResult<StoredImage> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new()
            .text("folder", self.config.folder.clone())
            .part("file", part);

        let mut request = self
            .client
            .post(format!("{}/upload", self.config.base_url))
            .multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Image upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "Image host returned status {}",
                response.status()
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid image host response: {}", e)))?;

        Ok(StoredImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// Delete a previously stored image by its URL. Failures are
    /// logged and swallowed so stale images never block the caller.
    pub async fn delete_by_url(&self, url: &str) {
        let Some(public_id) = self.public_id_from_url(url) else {
            tracing::warn!(url, "Could not derive public id from image URL");
            return;
        };

        let mut request = self
            .client
            .delete(format!("{}/destroy", self.config.base_url))
            .query(&[("public_id", public_id.as_str())]);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let result = request.send().await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(public_id, status = %response.status(), "Image deletion rejected");
            }
            Err(e) => {
                tracing::warn!(public_id, error = %e, "Image deletion request failed");
            }
        }
    }

    /// Derive the host-side public ID from a stored URL: the folder
    /// name plus the filename without its extension.
    fn public_id_from_url(&self, url: &str) -> Option<String> {
        let filename = url.rsplit('/').next()?;
        let stem = filename.split('.').next()?;
        if stem.is_empty() {
            return None;
        }
        Some(format!("{}/{}", self.config.folder, stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MediaService {
        MediaService::new(MediaConfig {
            base_url: "https://media.example.com/api".to_string(),
            api_key: Some("test".to_string()),
            folder: "library-books".to_string(),
        })
    }

    #[test]
    fn public_id_strips_extension_and_prefixes_folder() {
        let svc = service();
        assert_eq!(
            svc.public_id_from_url("https://media.example.com/f/library-books/abc123.jpg"),
            Some("library-books/abc123".to_string())
        );
    }

    #[test]
    fn public_id_rejects_empty_stem() {
        let svc = service();
        assert_eq!(svc.public_id_from_url("https://media.example.com/f/"), None);
    }
}
