//! Access to the bytes of uploaded creatives.

pub mod filesystem;
pub mod http;

use async_trait::async_trait;

use crate::error::StorageError;

pub use filesystem::FilesystemStore;
pub use http::HttpObjectStore;

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn download(&self, storage_path: &str) -> Result<Vec<u8>, StorageError>;

    /// URL an external service can fetch the object from.
    fn public_url(&self, storage_path: &str) -> String;
}

/// Percent-encodes each segment of a storage path, keeping the slashes.
pub(crate) fn encode_storage_path(storage_path: &str) -> String {
    storage_path
        .trim_start_matches('/')
        .split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
