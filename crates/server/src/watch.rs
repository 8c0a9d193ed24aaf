use std::path::{Path, PathBuf};
use std::time::Duration;

use library::Library;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::state::AppState;

pub fn configure_watcher(state: &AppState) {
    if !state.config.watch_music {
        info!("Watcher disabled (watch_music=false)");
        *state.watcher.write() = None;
        return;
    }

    let watch_debounce = Duration::from_secs(state.config.watch_debounce_secs.max(1));
    let root = state.library.root().to_path_buf();
    match setup_watcher(state.library.clone(), watch_debounce) {
        Ok(watcher) => {
            info!(
                "Watching {} for changes (debounce {}s)",
                root.display(),
                watch_debounce.as_secs()
            );
            *state.watcher.write() = Some(watcher);
        }
        Err(err) => {
            warn!("Failed to start watcher: {}", err);
            *state.watcher.write() = None;
        }
    }
}

fn setup_watcher(
    library: Library,
    debounce: Duration,
) -> Result<RecommendedWatcher, Box<dyn std::error::Error>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )?;

    watcher.watch(library.root(), RecursiveMode::Recursive)?;

    tokio::spawn(async move {
        watch_loop(library, rx, debounce).await;
    });

    Ok(watcher)
}

async fn watch_loop(library: Library, mut rx: UnboundedReceiver<Event>, debounce: Duration) {
    let staging: PathBuf = library.staging().dir().to_path_buf();
    loop {
        let event = match rx.recv().await {
            Some(event) => event,
            None => break,
        };
        if !is_relevant_event(&event, &staging) {
            continue;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {
                    match library.rebuild().await {
                        Ok(snapshot) => {
                            let stats = snapshot.stats();
                            info!(
                                "Auto-scan complete: {} albums, {} tracks",
                                stats.albums, stats.tracks
                            );
                        }
                        Err(err) => warn!("Auto-rescan failed: {}", err),
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    if maybe_event.is_none() {
                        return;
                    }
                }
            }
        }
    }
}

/// Create, modify and remove events count unless every path they touch is
/// inside the staging area.
fn is_relevant_event(event: &Event, staging: &Path) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }
    event.paths.is_empty() || event.paths.iter().any(|path| !path.starts_with(staging))
}
