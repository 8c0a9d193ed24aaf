use tracing::{info, warn};

use crate::state::AppState;
use crate::watch::configure_watcher;

/// Schedules the first index build and starts the watcher once it is
/// published. Requests arriving meanwhile wait for this build.
pub fn start_index(state: AppState) {
    info!("Indexing library at {}", state.library.root().display());
    let pending = state.library.spawn_rebuild();
    tokio::spawn(async move {
        match pending.await {
            Ok(Ok(snapshot)) => {
                let stats = snapshot.stats();
                info!(
                    "Library ready: {} albums, {} tracks",
                    stats.albums, stats.tracks
                );
            }
            Ok(Err(err)) => warn!("Initial library scan failed: {}", err),
            Err(err) => warn!("Initial library scan join error: {}", err),
        }
        configure_watcher(&state);
    });
}
