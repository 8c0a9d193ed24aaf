use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::{Album, Track};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::walker::scan_library;
use crate::{LibraryError, LibraryStats};

/// The complete result of one walker pass. Never mutated after it is built.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    albums: Vec<Album>,
    album_positions: HashMap<String, usize>,
    track_positions: HashMap<String, (usize, usize)>,
}

impl Snapshot {
    pub fn from_albums(albums: Vec<Album>, version: u64) -> Self {
        let mut album_positions = HashMap::with_capacity(albums.len());
        let mut track_positions = HashMap::new();
        for (album_idx, album) in albums.iter().enumerate() {
            album_positions.insert(album.id.clone(), album_idx);
            for (track_idx, track) in album.tracks.iter().enumerate() {
                if track_positions
                    .insert(track.id.clone(), (album_idx, track_idx))
                    .is_some()
                {
                    warn!("Duplicate track id {} in album {}", track.id, album.id);
                }
            }
        }
        Self {
            version,
            albums,
            album_positions,
            track_positions,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn album(&self, album_id: &str) -> Option<&Album> {
        let idx = *self.album_positions.get(album_id)?;
        self.albums.get(idx)
    }

    pub fn track(&self, track_id: &str) -> Option<&Track> {
        let (album_idx, track_idx) = *self.track_positions.get(track_id)?;
        self.albums.get(album_idx)?.tracks.get(track_idx)
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            albums: self.albums.len(),
            tracks: self.track_positions.len(),
        }
    }
}

/// Holds the published snapshot and serialises rebuilds.
///
/// Every rebuild request takes a ticket. Rebuilds run one at a time under
/// `scan_lock`; a rebuild that starts scanning records the newest ticket
/// issued so far, and publishing it completes every ticket up to that one.
/// A request whose ticket was already covered by a scan that started after
/// it returns without scanning again. Publication order therefore matches
/// scan start order, and the last scan started is the one left visible.
pub(crate) struct IndexStore {
    current: RwLock<Arc<Snapshot>>,
    requested: AtomicU64,
    completed: watch::Sender<u64>,
    scan_lock: Mutex<()>,
}

impl IndexStore {
    pub(crate) fn new() -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
            requested: AtomicU64::new(0),
            completed,
            scan_lock: Mutex::new(()),
        }
    }

    /// The published snapshot, without waiting for pending rebuilds.
    pub(crate) fn current(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub(crate) fn is_rebuilding(&self) -> bool {
        self.requested.load(Ordering::SeqCst) > *self.completed.borrow()
    }

    /// Waits for every rebuild requested before this call, then returns the
    /// published snapshot.
    pub(crate) async fn ready(&self) -> Arc<Snapshot> {
        let target = self.requested.load(Ordering::SeqCst);
        let mut done = self.completed.subscribe();
        let _ = done.wait_for(|completed| *completed >= target).await;
        self.current()
    }

    /// Takes a ticket now and runs the rebuild on its own task, so readers
    /// arriving after this call wait for it and the scan still publishes if
    /// the caller goes away.
    pub(crate) fn schedule(
        self: &Arc<Self>,
        root: PathBuf,
    ) -> JoinHandle<Result<Arc<Snapshot>, LibraryError>> {
        let ticket = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let store = Arc::clone(self);
        tokio::spawn(async move { store.run_rebuild(root, ticket).await })
    }

    /// Requests a rebuild and waits for a snapshot that reflects the
    /// filesystem as it was when the request was made.
    pub(crate) async fn rebuild(
        self: &Arc<Self>,
        root: PathBuf,
    ) -> Result<Arc<Snapshot>, LibraryError> {
        self.schedule(root)
            .await
            .map_err(|err| LibraryError::Io(std::io::Error::other(err.to_string())))?
    }

    async fn run_rebuild(&self, root: PathBuf, ticket: u64) -> Result<Arc<Snapshot>, LibraryError> {
        let _guard = self.scan_lock.lock().await;
        let covered = *self.completed.borrow() >= ticket;
        if covered {
            return Ok(self.current());
        }

        let target = self.requested.load(Ordering::SeqCst);
        let scan_root = root.clone();
        let scanned = tokio::task::spawn_blocking(move || {
            if let Err(err) = std::fs::create_dir_all(&scan_root) {
                warn!("Failed to create library root {}: {}", scan_root.display(), err);
            }
            scan_library(&scan_root)
        })
        .await;

        let result = match scanned {
            Ok(albums) => {
                let snapshot = Arc::new(Snapshot::from_albums(albums, target));
                *self.current.write() = Arc::clone(&snapshot);
                let stats = snapshot.stats();
                info!(
                    "Library index v{} ready: {} albums, {} tracks",
                    target, stats.albums, stats.tracks
                );
                Ok(snapshot)
            }
            Err(err) => {
                warn!("Library scan of {} failed: {}", root.display(), err);
                Err(LibraryError::Io(std::io::Error::other(err.to_string())))
            }
        };
        // Readers must never wait forever, so the tickets are released even
        // when the scan task died; they keep seeing the previous snapshot.
        self.completed.send_replace(target);
        result
    }
}
