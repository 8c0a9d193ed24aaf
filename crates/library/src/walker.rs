use std::fs;
use std::io;
use std::path::Path;

use common::{is_audio_file, Album, COVER_CANDIDATES, SIDECAR_FILE_NAME};
use metadata::read_description;
use tracing::{debug, error, warn};
use walkdir::{DirEntry, WalkDir};

use crate::reconcile::{build_tracks, reconcile};

/// One full pass over the immediate subfolders of `root`, in name order.
/// Hidden folders (the staging area among them) are never albums. Folders
/// that cannot be read are skipped; an unreadable root yields no albums.
pub fn scan_library(root: &Path) -> Vec<Album> {
    let mut albums = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                error!("Failed to read library root {}: {}", root.display(), err);
                return Vec::new();
            }
            Err(err) => {
                warn!("Skipping unreadable library entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(album_id) = entry.file_name().to_str() else {
            warn!("Skipping album folder with non UTF-8 name: {:?}", entry.path());
            continue;
        };
        match scan_album(album_id, entry.path()) {
            Ok(Some(album)) => albums.push(album),
            Ok(None) => debug!("No tracks in {}; not an album", entry.path().display()),
            Err(err) => warn!("Unable to read album folder {}: {}", entry.path().display(), err),
        }
    }

    albums
}

/// Builds the record for one album folder, or `None` when it holds no
/// recognised audio files.
pub fn scan_album(album_id: &str, album_dir: &Path) -> io::Result<Option<Album>> {
    let mut file_names = Vec::new();
    for entry in fs::read_dir(album_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => file_names.push(name),
            Err(name) => warn!("Ignoring non UTF-8 file name {:?} in {}", name, album_dir.display()),
        }
    }

    let audio_files: Vec<String> = file_names
        .iter()
        .filter(|name| is_audio_file(Path::new(name.as_str())))
        .cloned()
        .collect();
    if audio_files.is_empty() {
        return Ok(None);
    }

    let description = read_description(&album_dir.join(SIDECAR_FILE_NAME));
    let ordered = reconcile(&audio_files, &description.tracks);
    let tracks = build_tracks(album_id, album_dir, &ordered);
    let cover_file_name = find_cover(&file_names);

    Ok(Some(Album {
        id: album_id.to_string(),
        title: description
            .title
            .clone()
            .unwrap_or_else(|| album_id.to_string()),
        description: description.description.clone(),
        folder_path: album_dir.to_path_buf(),
        cover_path: cover_file_name.as_ref().map(|name| album_dir.join(name)),
        cover_file_name,
        tracks,
    }))
}

fn find_cover(file_names: &[String]) -> Option<String> {
    COVER_CANDIDATES.iter().find_map(|candidate| {
        file_names
            .iter()
            .find(|name| name.to_lowercase() == *candidate)
            .cloned()
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
