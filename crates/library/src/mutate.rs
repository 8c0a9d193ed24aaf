use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use common::{sanitize_name, Album, AUDIO_EXTENSIONS, COVER_EXTENSIONS, SIDECAR_FILE_NAME};
use metadata::write_description;
use tracing::{error, info, warn};

use crate::staging::StagedFile;
use crate::{Library, LibraryError};

/// Everything needed to create an album. Staged files not consumed by the
/// pipeline are removed when this value is dropped.
#[derive(Debug, Default)]
pub struct NewAlbum {
    pub name: String,
    pub description: Option<String>,
    pub cover: Option<StagedFile>,
    pub tracks: Vec<StagedFile>,
}

impl Library {
    /// Creates a new album folder from staged uploads and returns the album
    /// as indexed by the rebuild that follows. Nothing is written unless all
    /// input checks pass, and a failure after the folder exists removes it.
    pub async fn create_album(&self, upload: NewAlbum) -> Result<Album, LibraryError> {
        let NewAlbum {
            name,
            description,
            cover,
            tracks,
        } = upload;

        let title = name.trim();
        if title.is_empty() {
            return Err(LibraryError::InvalidInput("Album name is required".to_string()));
        }
        let album_id = sanitize_name(title);
        if album_id.is_empty() {
            return Err(LibraryError::InvalidInput("Album name is invalid".to_string()));
        }
        if tracks.is_empty() {
            return Err(LibraryError::InvalidInput(
                "At least one track is required".to_string(),
            ));
        }
        validate_tracks(&tracks)?;
        if let Some(cover) = &cover {
            validate_cover(cover)?;
        }

        tokio::fs::create_dir_all(self.root()).await?;
        let album_dir = self.root().join(&album_id);
        // Exclusive create: of two racing requests for one name, exactly one
        // gets the folder.
        match tokio::fs::create_dir(&album_dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LibraryError::Conflict("Album already exists".to_string()));
            }
            Err(err) => {
                error!("Failed to create album folder {}: {}", album_dir.display(), err);
                return Err(err.into());
            }
        }

        if let Err(err) =
            populate_album(&album_dir, title, description.as_deref(), cover, tracks).await
        {
            error!("Failed to create album {}: {}", album_id, err);
            remove_dir_quietly(&album_dir).await;
            // A rebuild may have indexed the folder while it was being filled.
            self.spawn_rebuild();
            return Err(err.into());
        }

        info!("Created album {}", album_id);
        let snapshot = self.rebuild().await?;
        snapshot
            .album(&album_id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(format!("album {} missing after rescan", album_id)))
    }

    /// Adds staged tracks to an existing album.
    pub async fn append_tracks(
        &self,
        album_id: &str,
        tracks: Vec<StagedFile>,
    ) -> Result<Album, LibraryError> {
        let album_dir = self
            .snapshot()
            .await
            .album(album_id)
            .map(|album| album.folder_path.clone())
            .ok_or_else(|| LibraryError::NotFound("Album not found".to_string()))?;
        if tracks.is_empty() {
            return Err(LibraryError::InvalidInput("No tracks uploaded".to_string()));
        }
        validate_tracks(&tracks)?;

        let mut placed: Vec<PathBuf> = Vec::with_capacity(tracks.len());
        for track in tracks {
            match place_track(&album_dir, track).await {
                Ok(path) => placed.push(path),
                Err(err) => {
                    error!("Failed to add tracks to {}: {}", album_id, err);
                    for path in &placed {
                        remove_file_quietly(path).await;
                    }
                    return Err(err.into());
                }
            }
        }

        info!("Added {} tracks to album {}", placed.len(), album_id);
        let snapshot = self.rebuild().await?;
        snapshot
            .album(album_id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound("Album not found".to_string()))
    }

    /// Deletes one track. Returns the updated album, or `None` when the album
    /// no longer has any tracks and so dropped out of the index.
    pub async fn delete_track(
        &self,
        album_id: &str,
        track_id: &str,
    ) -> Result<Option<Album>, LibraryError> {
        let file_path = self
            .snapshot()
            .await
            .track(track_id)
            .filter(|track| track.album_id == album_id)
            .map(|track| track.file_path.clone())
            .ok_or_else(|| LibraryError::NotFound("Track not found".to_string()))?;

        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                error!("Failed to delete track {}: {}", file_path.display(), err);
                return Err(err.into());
            }
        }

        let snapshot = self.rebuild().await?;
        Ok(snapshot.album(album_id).cloned())
    }

    pub async fn delete_album(&self, album_id: &str) -> Result<(), LibraryError> {
        let folder_path = self
            .snapshot()
            .await
            .album(album_id)
            .map(|album| album.folder_path.clone())
            .ok_or_else(|| LibraryError::NotFound("Album not found".to_string()))?;

        match tokio::fs::remove_dir_all(&folder_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                error!("Failed to delete album {}: {}", folder_path.display(), err);
                return Err(err.into());
            }
        }

        info!("Deleted album {}", album_id);
        self.rebuild().await?;
        Ok(())
    }
}

fn validate_tracks(tracks: &[StagedFile]) -> Result<(), LibraryError> {
    for track in tracks {
        let ext = track.extension().unwrap_or_default();
        if !AUDIO_EXTENSIONS.contains(&ext.trim_start_matches('.')) {
            return Err(LibraryError::InvalidInput(format!(
                "Unsupported file type: {}",
                if ext.is_empty() { track.original_name() } else { ext.as_str() }
            )));
        }
    }
    Ok(())
}

fn validate_cover(cover: &StagedFile) -> Result<(), LibraryError> {
    let ext = cover.extension().unwrap_or_default();
    if COVER_EXTENSIONS.contains(&ext.trim_start_matches('.')) {
        Ok(())
    } else {
        Err(LibraryError::InvalidInput(
            "Unsupported cover file type".to_string(),
        ))
    }
}

async fn populate_album(
    album_dir: &Path,
    title: &str,
    description: Option<&str>,
    cover: Option<StagedFile>,
    tracks: Vec<StagedFile>,
) -> io::Result<()> {
    if let Some(cover) = cover {
        place_cover(album_dir, cover).await?;
    }
    for track in tracks {
        place_track(album_dir, track).await?;
    }

    let sidecar = album_dir.join(SIDECAR_FILE_NAME);
    let title = title.to_string();
    let description = description.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        write_description(&sidecar, &title, description.as_deref())
    })
    .await
    .map_err(io::Error::other)?
}

/// Moves a cover into place as `cover.<ext>`, with `.jpeg` stored as `.jpg`.
async fn place_cover(album_dir: &Path, mut cover: StagedFile) -> io::Result<PathBuf> {
    let ext = match cover.extension().as_deref() {
        Some(".jpeg") => ".jpg".to_string(),
        Some(ext) => ext.to_string(),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cover has no extension",
            ))
        }
    };
    let target = album_dir.join(format!("cover{}", ext));
    match tokio::fs::remove_file(&target).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    cover.place_at(&target).await?;
    Ok(target)
}

async fn place_track(album_dir: &Path, mut track: StagedFile) -> io::Result<PathBuf> {
    let ext = track.extension().unwrap_or_default();
    let base = match sanitize_name(&track.stem()) {
        base if base.is_empty() => "file".to_string(),
        base => base,
    };
    let stamp = unix_millis();
    let mut attempt = 0;
    loop {
        let target = album_dir.join(candidate_name(&base, &ext, stamp, attempt));
        match track.place_at(&target).await {
            Ok(()) => return Ok(target),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => return Err(err),
        }
    }
}

/// `<base><ext>` first, then timestamped variants for names already taken.
fn candidate_name(base: &str, ext: &str, stamp: u128, attempt: u32) -> String {
    match attempt {
        0 => format!("{}{}", base, ext),
        1 => format!("{}-{}{}", base, stamp, ext),
        n => format!("{}-{}-{}{}", base, stamp, n - 1, ext),
    }
}

async fn remove_dir_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            warn!("Failed to cleanup {}: {}", path.display(), err);
        }
    }
}

async fn remove_file_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            warn!("Failed to cleanup {}: {}", path.display(), err);
        }
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StagingArea;
    use tempfile::tempdir;

    #[test]
    fn candidates_start_with_the_plain_name() {
        assert_eq!(candidate_name("song", ".mp3", 42, 0), "song.mp3");
        assert_eq!(candidate_name("song", ".mp3", 42, 1), "song-42.mp3");
        assert_eq!(candidate_name("song", ".mp3", 42, 2), "song-42-1.mp3");
        assert_eq!(candidate_name("song", ".mp3", 42, 3), "song-42-2.mp3");
    }

    #[tokio::test]
    async fn colliding_track_takes_the_next_free_name() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        std::fs::write(dir.path().join("song.mp3"), b"old").unwrap();

        let track = staging.stage_bytes("song.mp3", b"new").await.unwrap();
        let placed = place_track(dir.path(), track).await.unwrap();
        let name = placed.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("song-"), "{}", name);
        assert!(name.ends_with(".mp3"), "{}", name);
        assert_eq!(std::fs::read(&placed).unwrap(), b"new");
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn cover_is_stored_under_canonical_name() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        let cover = staging.stage_bytes("Front.JPEG", b"img").await.unwrap();
        let placed = place_cover(dir.path(), cover).await.unwrap();
        assert_eq!(placed, dir.path().join("cover.jpg"));
        assert_eq!(std::fs::read(&placed).unwrap(), b"img");
    }

    #[tokio::test]
    async fn track_names_are_sanitized() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        let track = staging.stage_bytes("My  Song?.MP3", b"a").await.unwrap();
        let placed = place_track(dir.path(), track).await.unwrap();
        assert_eq!(placed, dir.path().join("My_Song.mp3"));

        let nameless = staging.stage_bytes("???.flac", b"b").await.unwrap();
        let placed = place_track(dir.path(), nameless).await.unwrap();
        assert_eq!(placed, dir.path().join("file.flac"));
    }

    #[tokio::test]
    async fn unsupported_extensions_are_rejected() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().to_path_buf());
        let tracks = vec![staging.stage_bytes("notes.txt", b"x").await.unwrap()];
        assert!(matches!(
            validate_tracks(&tracks),
            Err(LibraryError::InvalidInput(message)) if message.contains(".txt")
        ));
        let cover = staging.stage_bytes("cover.gif", b"x").await.unwrap();
        assert!(matches!(
            validate_cover(&cover),
            Err(LibraryError::InvalidInput(_))
        ));
    }
}
