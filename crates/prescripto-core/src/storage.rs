//! Attachment storage for test result reports and images.
//!
//! An [`ObjectStore`] takes uploaded bytes and returns the URL the file will
//! be served from. [`LocalObjectStore`] writes files under a root directory,
//! named by the SHA-256 of their contents, so re-uploading the same file
//! yields the same URL.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Folder for test report files.
pub const REPORT_FOLDER: &str = "test-reports";
/// Folder for test images.
pub const IMAGE_FOLDER: &str = "test-images";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Uploaded file '{0}' is empty")]
    Empty(String),

    #[error("File '{name}' rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An uploaded file, held in memory until it is stored.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Lowercased extension of the original file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
    }

    fn is_image(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.starts_with("image/"),
            None => matches!(
                self.extension().as_deref(),
                Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "tif" | "tiff")
            ),
        }
    }
}

/// Somewhere attachments can be stored and later fetched by URL.
pub trait ObjectStore: Send + Sync {
    /// Store `file` under `folder` and return its public URL.
    fn put(&self, folder: &str, file: &Attachment) -> Result<String, UploadError>;
}

/// Store files on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    /// `public_base` is the URL prefix the `root` directory is served under.
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, folder: &str, file: &Attachment) -> Result<String, UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Empty(file.file_name.clone()));
        }
        if folder == IMAGE_FOLDER && !file.is_image() {
            return Err(UploadError::Rejected {
                name: file.file_name.clone(),
                reason: "not an image".into(),
            });
        }

        let digest = hex::encode(Sha256::digest(&file.bytes));
        let object_name = match file.extension() {
            Some(ext) => format!("{}.{}", digest, ext),
            None => digest,
        };

        let dir = self.root.join(folder);
        fs::create_dir_all(&dir)?;
        let path = dir.join(&object_name);
        if !path.exists() {
            fs::write(&path, &file.bytes)?;
        }
        debug!(path = %path.display(), size = file.bytes.len(), "Stored attachment");

        Ok(format!("{}/{}/{}", self.public_base, folder, object_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:4000/files/");
        (dir, store)
    }

    #[test]
    fn test_put_report() {
        let (dir, store) = store();
        let file = Attachment::new("CBC Report.PDF", Some("application/pdf".into()), b"%PDF-1.4".to_vec());

        let url = store.put(REPORT_FOLDER, &file).unwrap();
        let digest = hex::encode(Sha256::digest(b"%PDF-1.4"));
        assert_eq!(
            url,
            format!("http://localhost:4000/files/test-reports/{}.pdf", digest)
        );

        let on_disk = fs::read(dir.path().join(REPORT_FOLDER).join(format!("{}.pdf", digest))).unwrap();
        assert_eq!(on_disk, b"%PDF-1.4");
    }

    #[test]
    fn test_same_content_same_url() {
        let (_dir, store) = store();
        let a = Attachment::new("a.png", Some("image/png".into()), vec![1, 2, 3]);
        let b = Attachment::new("b.png", Some("image/png".into()), vec![1, 2, 3]);
        assert_eq!(store.put(IMAGE_FOLDER, &a).unwrap(), store.put(IMAGE_FOLDER, &b).unwrap());
    }

    #[test]
    fn test_empty_rejected() {
        let (_dir, store) = store();
        let file = Attachment::new("empty.pdf", None, vec![]);
        assert!(matches!(store.put(REPORT_FOLDER, &file), Err(UploadError::Empty(_))));
    }

    #[test]
    fn test_non_image_rejected_from_image_folder() {
        let (_dir, store) = store();
        let file = Attachment::new("notes.txt", Some("text/plain".into()), b"hi".to_vec());
        assert!(matches!(
            store.put(IMAGE_FOLDER, &file),
            Err(UploadError::Rejected { .. })
        ));

        // No content type: fall back to the extension
        let guessed = Attachment::new("scan.JPG", None, b"jpeg".to_vec());
        assert!(store.put(IMAGE_FOLDER, &guessed).is_ok());
    }

    #[test]
    fn test_extension() {
        assert_eq!(Attachment::new("x.tar.GZ", None, vec![]).extension().as_deref(), Some("gz"));
        assert_eq!(Attachment::new("noext", None, vec![]).extension(), None);
        assert_eq!(Attachment::new("bad.p/f", None, vec![]).extension(), None);
    }
}
