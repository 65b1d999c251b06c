/// Profile-image staging
///
/// Uploaded images take two hops: `stage` writes the bytes into a temporary
/// area when a form is staged, and `promote` copies them into permanent
/// storage when the flow commits. `discard` removes the temporary file on
/// cancel or after a successful promotion. Files are keyed by their original
/// filename in both areas; concurrent staging of the same name by two
/// sessions is not guarded.
///
/// Promoting or discarding a name that is no longer in the temporary area is
/// an error — the staged file vanishing out from under a flow is something
/// the user has to hear about, not something to paper over.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Upload staging errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// The named file is not in the temporary area
    #[error("Staged file not found: {0}")]
    Missing(String),

    /// Filesystem failure
    #[error("Upload storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Staging and permanent storage for uploaded images
#[derive(Debug, Clone)]
pub struct ImageStore {
    tmp_dir: PathBuf,
    upload_dir: PathBuf,
}

impl ImageStore {
    pub fn new(tmp_dir: PathBuf, upload_dir: PathBuf) -> Self {
        Self {
            tmp_dir,
            upload_dir,
        }
    }

    /// Creates both directories if they do not exist yet
    pub async fn ensure_dirs(&self) -> Result<(), UploadError> {
        fs::create_dir_all(&self.tmp_dir).await?;
        fs::create_dir_all(&self.upload_dir).await?;
        Ok(())
    }

    /// Writes uploaded bytes into the temporary area, keyed by filename
    ///
    /// Returns the staged name. The name is flattened to its final path
    /// component so a crafted filename cannot escape the staging directory.
    pub async fn stage(&self, filename: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let name = sanitize_filename(filename);
        fs::write(self.tmp_path(&name), bytes).await?;
        Ok(name)
    }

    /// Copies a staged file into permanent storage under the same name
    ///
    /// The caller records the permanent reference on the owning entity.
    pub async fn promote(&self, name: &str) -> Result<(), UploadError> {
        let src = self.tmp_path(name);
        if !path_exists(&src).await {
            return Err(UploadError::Missing(name.to_string()));
        }

        let bytes = fs::read(&src).await?;
        fs::write(self.upload_path(name), bytes).await?;
        Ok(())
    }

    /// Removes a file from the temporary area
    pub async fn discard(&self, name: &str) -> Result<(), UploadError> {
        let path = self.tmp_path(name);
        if !path_exists(&path).await {
            return Err(UploadError::Missing(name.to_string()));
        }

        fs::remove_file(path).await?;
        Ok(())
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.tmp_dir.join(name)
    }

    fn upload_path(&self, name: &str) -> PathBuf {
        self.upload_dir.join(name)
    }
}

async fn path_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

/// Reduces a browser-supplied filename to its final path component
fn sanitize_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// The permanent reference recorded on an entity for a promoted image
pub fn permanent_reference(name: &str) -> String {
    format!("upload/{name}")
}

/// The staging-area reference echoed on the confirm page
pub fn staged_reference(name: &str) -> String {
    format!("tmp/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ImageStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ImageStore::new(dir.path().join("tmp"), dir.path().join("upload"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_stage_then_promote_then_discard() {
        let (_guard, store) = store();
        store.ensure_dirs().await.unwrap();

        let name = store.stage("avatar.png", b"image-bytes").await.unwrap();
        assert_eq!(name, "avatar.png");

        store.promote(&name).await.unwrap();
        let promoted = fs::read(store.upload_path(&name)).await.unwrap();
        assert_eq!(promoted, b"image-bytes");

        store.discard(&name).await.unwrap();
        assert!(!path_exists(&store.tmp_path(&name)).await);
        // The promoted copy survives the discard.
        assert!(path_exists(&store.upload_path(&name)).await);
    }

    #[tokio::test]
    async fn test_promote_missing_file_is_an_error() {
        let (_guard, store) = store();
        store.ensure_dirs().await.unwrap();

        let err = store.promote("nowhere.png").await.unwrap_err();
        assert!(matches!(err, UploadError::Missing(_)));
    }

    #[tokio::test]
    async fn test_discard_missing_file_is_an_error() {
        let (_guard, store) = store();
        store.ensure_dirs().await.unwrap();

        let err = store.discard("nowhere.png").await.unwrap_err();
        assert!(matches!(err, UploadError::Missing(_)));
    }

    #[tokio::test]
    async fn test_restaging_replaces_bytes() {
        let (_guard, store) = store();
        store.ensure_dirs().await.unwrap();

        store.stage("avatar.png", b"first").await.unwrap();
        store.stage("avatar.png", b"second").await.unwrap();

        let staged = fs::read(store.tmp_path("avatar.png")).await.unwrap();
        assert_eq!(staged, b"second");
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("avatar.png"), "avatar.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("dir/pic.jpg"), "pic.jpg");
    }

    #[test]
    fn test_references() {
        assert_eq!(permanent_reference("a.png"), "upload/a.png");
        assert_eq!(staged_reference("a.png"), "tmp/a.png");
    }
}
