use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use tracing::warn;

use crate::state::{
    AlbumDetail, AlbumListResponse, AlbumResponse, AlbumSummary, AppState, JsonResult,
    LibraryStatusResponse,
};
use crate::utils::{json_error, json_error_response, library_error};

pub async fn list_albums(State(state): State<AppState>) -> Json<AlbumListResponse> {
    let snapshot = state.library.snapshot().await;
    Json(AlbumListResponse {
        albums: snapshot.albums().iter().map(AlbumSummary::from).collect(),
    })
}

pub async fn get_album(
    State(state): State<AppState>,
    AxumPath(album_id): AxumPath<String>,
) -> JsonResult<AlbumResponse> {
    let snapshot = state.library.snapshot().await;
    match snapshot.album(&album_id) {
        Some(album) => Ok(Json(AlbumResponse {
            album: AlbumDetail::from(album),
        })),
        None => Err(json_error(StatusCode::NOT_FOUND, "Album not found")),
    }
}

/// Reports the published index without waiting for a rebuild in flight.
pub async fn library_status(State(state): State<AppState>) -> Json<LibraryStatusResponse> {
    let snapshot = state.library.current();
    let stats = snapshot.stats();
    let status = if state.library.is_rebuilding() {
        "scanning"
    } else {
        "ready"
    };
    Json(LibraryStatusResponse {
        status,
        version: snapshot.version(),
        albums: stats.albums,
        tracks: stats.tracks,
    })
}

pub async fn rescan(State(state): State<AppState>) -> JsonResult<AlbumListResponse> {
    let snapshot = state.library.rebuild().await.map_err(library_error)?;
    Ok(Json(AlbumListResponse {
        albums: snapshot.albums().iter().map(AlbumSummary::from).collect(),
    }))
}

/// Serves an album's indexed cover. Any other file name in the folder is a 404.
pub async fn get_cover(
    State(state): State<AppState>,
    AxumPath((album_id, file_name)): AxumPath<(String, String)>,
) -> Response {
    let album = match state.library.get_album(&album_id).await {
        Some(album) => album,
        None => return json_error_response(StatusCode::NOT_FOUND, "Album not found"),
    };
    let cover_path = match (&album.cover_file_name, &album.cover_path) {
        (Some(name), Some(path)) if *name == file_name => path.clone(),
        _ => return json_error_response(StatusCode::NOT_FOUND, "Cover not found"),
    };

    match tokio::fs::read(&cover_path).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&cover_path)
                .first_or_octet_stream()
                .to_string();
            cover_response(data, &mime)
        }
        Err(err) => {
            warn!("Failed to read cover {}: {}", cover_path.display(), err);
            json_error_response(StatusCode::NOT_FOUND, "Cover not found")
        }
    }
}

fn cover_response(data: Vec<u8>, mime: &str) -> Response {
    let mut response = Response::new(Body::from(data));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime).unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
