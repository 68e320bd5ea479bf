//! Page store module
//!
//! Persists each page as `<data_dir>/<title>.txt`. There is no locking:
//! concurrent saves to the same title race and the last writer wins.

mod page;

pub use page::{Page, Title};

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Extension of every backing file
const PAGE_EXTENSION: &str = "txt";

/// Permission bits for newly created page files (owner read/write)
#[cfg(unix)]
const PAGE_FILE_MODE: u32 = 0o600;

/// Page store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("page '{title}' not found")]
    NotFound { title: Title },

    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// File-backed page store
#[derive(Debug, Clone)]
pub struct PageStore {
    data_dir: PathBuf,
}

impl PageStore {
    /// Open a store rooted at `data_dir`, creating the directory if missing
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|source| StoreError::Io {
            op: "create",
            path: data_dir.clone(),
            source,
        })?;
        Ok(Self { data_dir })
    }

    /// Backing file for a title
    pub fn path_for(&self, title: &Title) -> PathBuf {
        self.data_dir
            .join(format!("{}.{PAGE_EXTENSION}", title.as_str()))
    }

    /// Read a page from its backing file
    pub async fn load(&self, title: &Title) -> Result<Page, StoreError> {
        let path = self.path_for(title);
        match fs::read(&path).await {
            Ok(body) => Ok(Page::new(title.clone(), body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                title: title.clone(),
            }),
            Err(source) => Err(StoreError::Io {
                op: "read",
                path,
                source,
            }),
        }
    }

    /// Write a page to its backing file, creating or truncating it
    pub async fn save(&self, page: &Page) -> Result<(), StoreError> {
        let path = self.path_for(&page.title);
        write_file(&path, &page.body)
            .await
            .map_err(|(op, source)| StoreError::Io { op, path, source })
    }
}

/// Write `body` to `path`, tagging a failure with the step that failed
async fn write_file(path: &Path, body: &[u8]) -> Result<(), (&'static str, io::Error)> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(PAGE_FILE_MODE);

    let mut file = options.open(path).await.map_err(|e| ("open", e))?;
    file.write_all(body).await.map_err(|e| ("write", e))?;
    file.flush().await.map_err(|e| ("write", e))
}
