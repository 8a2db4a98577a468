use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::RequestError;

const IMAGE_DIR: &str = "recipes/images";
const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Writes uploaded recipe images under the media root and hands back their public reference.
#[derive(Debug, Clone)]
pub struct ImageStore {
    media_root: PathBuf,
}

impl ImageStore {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    /// Accepts `data:image/<ext>;base64,<payload>` and returns `/media/recipes/images/<uuid>.<ext>`.
    pub async fn save(&self, data_uri: &str) -> Result<String, RequestError> {
        let (extension, bytes) = decode_data_uri(data_uri)?;
        let file_name = format!("{}.{extension}", Uuid::new_v4());
        let directory = self.media_root.join(IMAGE_DIR);

        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            error!(error = %e, path = %directory.display(), "could not create image directory");
            RequestError::ServerError
        })?;
        let path = directory.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "could not write image");
            RequestError::ServerError
        })?;

        info!(path = %path.display(), "stored image");
        Ok(format!("/media/{IMAGE_DIR}/{file_name}"))
    }

    /// Deletes a file previously returned by [`ImageStore::save`]. Failures are only logged.
    pub async fn discard(&self, reference: &str) {
        let Some(file_name) = reference
            .strip_prefix(&format!("/media/{IMAGE_DIR}/"))
            .filter(|name| !name.contains(['/', '\\']) && !name.starts_with('.'))
        else {
            warn!(reference, "not a stored image reference");
            return;
        };
        let path = self.media_root.join(IMAGE_DIR).join(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(path = %path.display(), "discarded image"),
            Err(e) => warn!(error = %e, path = %path.display(), "could not discard image"),
        }
    }
}

fn decode_data_uri(data_uri: &str) -> Result<(String, Vec<u8>), RequestError> {
    let invalid = || RequestError::validation("image must be a base64 data URI");

    let rest = data_uri.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (extension, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let extension = extension.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(RequestError::validation(format!(
            "unsupported image type {extension}"
        )));
    }
    let bytes = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    Ok((extension, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[tokio::test]
    async fn stores_decoded_bytes_under_media_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let reference = store.save(PIXEL).await.unwrap();
        assert!(reference.starts_with("/media/recipes/images/"));
        assert!(reference.ends_with(".png"));

        let relative = reference.trim_start_matches("/media/");
        let written = std::fs::read(dir.path().join(relative)).unwrap();
        assert_eq!(&written[1..4], b"PNG");
    }

    #[tokio::test]
    async fn discard_removes_only_stored_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let reference = store.save(PIXEL).await.unwrap();
        let path = dir.path().join(reference.trim_start_matches("/media/"));
        assert!(path.exists());

        store.discard(&reference).await;
        assert!(!path.exists());

        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, b"keep").unwrap();
        store.discard("/media/recipes/images/../../keep.txt").await;
        assert!(outside.exists());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(decode_data_uri("not a data uri").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
        assert!(decode_data_uri("data:image/svg+xml;base64,PHN2Zz4=").is_err());
    }
}
