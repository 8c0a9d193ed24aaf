mod index;
mod mutate;
mod reconcile;
mod staging;
mod walker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{Album, Track};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::index::IndexStore;

pub use index::Snapshot;
pub use mutate::NewAlbum;
pub use reconcile::{build_tracks, normalize_file_name, reconcile, OrderedFile};
pub use staging::{StagedFile, StagingArea};
pub use walker::{scan_album, scan_library};

/// An album collection rooted at one directory. Cloning is cheap; every clone
/// shares the same index.
#[derive(Clone)]
pub struct Library {
    root: PathBuf,
    staging: StagingArea,
    index: Arc<IndexStore>,
}

impl Library {
    /// Creates a library with an empty index. Call [`Library::rebuild`] to
    /// populate it.
    pub fn new(root: PathBuf, staging_dir: PathBuf) -> Self {
        Self {
            root,
            staging: StagingArea::new(staging_dir),
            index: Arc::new(IndexStore::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Rescans the whole root and publishes the result as one snapshot.
    pub async fn rebuild(&self) -> Result<Arc<Snapshot>, LibraryError> {
        self.index.rebuild(self.root.clone()).await
    }

    /// Requests a rebuild without waiting for it. Readers arriving after
    /// this call see its result.
    pub fn spawn_rebuild(&self) -> JoinHandle<Result<Arc<Snapshot>, LibraryError>> {
        self.index.schedule(self.root.clone())
    }

    /// The snapshot after every rebuild already requested has finished.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.index.ready().await
    }

    /// The snapshot published right now, even if a rebuild is in flight.
    pub fn current(&self) -> Arc<Snapshot> {
        self.index.current()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.index.is_rebuilding()
    }

    pub async fn list_albums(&self) -> Vec<Album> {
        self.snapshot().await.albums().to_vec()
    }

    pub async fn get_album(&self, album_id: &str) -> Option<Album> {
        self.snapshot().await.album(album_id).cloned()
    }

    pub async fn get_track(&self, track_id: &str) -> Option<Track> {
        self.snapshot().await.track(track_id).cloned()
    }

    pub async fn stats(&self) -> LibraryStats {
        self.snapshot().await.stats()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub albums: usize,
    pub tracks: usize,
}

#[derive(Debug)]
pub enum LibraryError {
    NotFound(String),
    InvalidInput(String),
    Conflict(String),
    Io(std::io::Error),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::NotFound(message) => write!(f, "not found: {}", message),
            LibraryError::InvalidInput(message) => write!(f, "invalid input: {}", message),
            LibraryError::Conflict(message) => write!(f, "conflict: {}", message),
            LibraryError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}
