use std::path::Path;

use axum::extract::multipart::{Field, Multipart, MultipartError};
use common::{is_audio_file, is_cover_file};
use library::{LibraryError, NewAlbum, StagedFile, StagingArea};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

/// Fields of an album upload. Files are already in the staging area and are
/// removed again if this value is dropped without being placed.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cover: Option<StagedFile>,
    pub tracks: Vec<StagedFile>,
}

impl UploadForm {
    pub fn into_new_album(self) -> NewAlbum {
        NewAlbum {
            name: self.name.unwrap_or_default(),
            description: self.description,
            cover: self.cover,
            tracks: self.tracks,
        }
    }
}

/// Reads a multipart body into the staging area. Every file field is checked
/// against the extension whitelist before any of its bytes are written.
pub async fn read_upload(
    staging: &StagingArea,
    mut multipart: Multipart,
    max_tracks: usize,
) -> Result<UploadForm, LibraryError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => form.name = Some(field.text().await.map_err(malformed)?),
            "description" => form.description = Some(field.text().await.map_err(malformed)?),
            "cover" => {
                if form.cover.is_some() {
                    return Err(LibraryError::InvalidInput(
                        "Only one cover image is allowed".to_string(),
                    ));
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                if !is_cover_file(Path::new(&file_name)) {
                    return Err(LibraryError::InvalidInput(
                        "Unsupported cover file type".to_string(),
                    ));
                }
                form.cover = Some(stage_field(staging, &file_name, field).await?);
            }
            "tracks" | "tracks[]" => {
                if form.tracks.len() >= max_tracks {
                    return Err(LibraryError::InvalidInput(format!(
                        "Too many tracks (max {})",
                        max_tracks
                    )));
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                if !is_audio_file(Path::new(&file_name)) {
                    return Err(LibraryError::InvalidInput(format!(
                        "Unsupported file type: {}",
                        file_name
                    )));
                }
                form.tracks.push(stage_field(staging, &file_name, field).await?);
            }
            other => debug!("Ignoring upload field {:?}", other),
        }
    }
    Ok(form)
}

async fn stage_field(
    staging: &StagingArea,
    file_name: &str,
    mut field: Field<'_>,
) -> Result<StagedFile, LibraryError> {
    let staged = staging.reserve(file_name).await.map_err(|err| {
        error!("Failed to stage upload {}: {}", file_name, err);
        LibraryError::Io(err)
    })?;
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(staged.path())
        .await?;
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(staged)
}

fn malformed(err: MultipartError) -> LibraryError {
    LibraryError::InvalidInput(format!("Malformed upload: {}", err.body_text()))
}
