//! Storage for rendered page images on disk.

use std::path::{Path, PathBuf};

/// Construct the relative storage path for a page image.
///
/// Pages are grouped per issue: `{issue_id}/page-{NNNN}.{extension}`.
pub fn page_image_path(issue_id: &str, page_number: i32, extension: &str) -> String {
    format!("{}/page-{:04}.{}", issue_id, page_number, extension)
}

/// Page images rooted at one directory. Paths handed out and accepted are
/// relative to that root.
#[derive(Debug, Clone)]
pub struct PageImageStore {
    root: PathBuf,
}

impl PageImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a page image and return its relative path.
    ///
    /// Re-ingesting the same page overwrites the file in place.
    pub async fn save(
        &self,
        issue_id: &str,
        page_number: i32,
        extension: &str,
        content: &[u8],
    ) -> std::io::Result<String> {
        let relative = page_image_path(issue_id, page_number, extension);
        let full = self.root.join(&relative);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(relative)
    }

    /// Delete a stored image. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.root.join(relative)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Absolute location of a stored relative path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}
