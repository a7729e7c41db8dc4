//! Bucket-addressed object storage over REST.
//!
//! Objects are read from `{base}/storage/v1/object/{bucket}/{path}` with a
//! bearer token; public URLs use `{base}/storage/v1/object/public/{bucket}/{path}`.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use super::{encode_storage_path, AssetStore};
use crate::capability::HttpTimeouts;
use crate::error::StorageError;

pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    bucket: String,
    token: SecretString,
}

impl HttpObjectStore {
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        token: SecretString,
        timeouts: HttpTimeouts,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()
            .map_err(|e| StorageError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            token,
        })
    }

    fn object_url(&self, storage_path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_storage_path(storage_path)
        )
    }
}

#[async_trait]
impl AssetStore for HttpObjectStore {
    async fn download(&self, storage_path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.object_url(storage_path))
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StorageError::NotFound(storage_path.to_string())),
            status => {
                return Err(StorageError::UnexpectedStatus {
                    status: status.as_u16(),
                    path: storage_path.to_string(),
                })
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Http(e.to_string()))?;
        debug!("Downloaded {} bytes from bucket {}", bytes.len(), self.bucket);
        Ok(bytes.to_vec())
    }

    fn public_url(&self, storage_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_storage_path(storage_path)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let store = HttpObjectStore::new(
            "https://project.example.co/",
            "creatives",
            SecretString::from("service-key"),
            HttpTimeouts::default(),
        )
        .unwrap();

        assert_eq!(
            store.object_url("c1/ad.png"),
            "https://project.example.co/storage/v1/object/creatives/c1/ad.png"
        );
        assert_eq!(
            store.public_url("c1/my clip.mp4"),
            "https://project.example.co/storage/v1/object/public/creatives/c1/my%20clip.mp4"
        );
    }
}
