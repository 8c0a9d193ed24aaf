use axum::{
    extract::{Multipart, Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::state::{AlbumDetail, AlbumResponse, AppState, ErrorResponse, JsonResult, MessageResponse};
use crate::upload::read_upload;
use crate::utils::{json_error, library_error};

pub async fn create_album(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AlbumResponse>), (StatusCode, Json<ErrorResponse>)> {
    let form = read_upload(
        state.library.staging(),
        multipart,
        state.config.max_upload_tracks,
    )
    .await
    .map_err(library_error)?;
    let album = state
        .library
        .create_album(form.into_new_album())
        .await
        .map_err(library_error)?;
    Ok((
        StatusCode::CREATED,
        Json(AlbumResponse {
            album: AlbumDetail::from(&album),
        }),
    ))
}

pub async fn append_tracks(
    State(state): State<AppState>,
    AxumPath(album_id): AxumPath<String>,
    multipart: Multipart,
) -> JsonResult<AlbumResponse> {
    if state.library.get_album(&album_id).await.is_none() {
        return Err(json_error(StatusCode::NOT_FOUND, "Album not found"));
    }
    let form = read_upload(
        state.library.staging(),
        multipart,
        state.config.max_upload_tracks,
    )
    .await
    .map_err(library_error)?;
    let album = state
        .library
        .append_tracks(&album_id, form.tracks)
        .await
        .map_err(library_error)?;
    Ok(Json(AlbumResponse {
        album: AlbumDetail::from(&album),
    }))
}

pub async fn delete_track(
    State(state): State<AppState>,
    AxumPath((album_id, track_id)): AxumPath<(String, String)>,
) -> Response {
    match state.library.delete_track(&album_id, &track_id).await {
        Ok(Some(album)) => Json(AlbumResponse {
            album: AlbumDetail::from(&album),
        })
        .into_response(),
        Ok(None) => {
            info!("Album {} removed with its last track", album_id);
            Json(MessageResponse {
                message: "Track deleted, album removed",
            })
            .into_response()
        }
        Err(err) => library_error(err).into_response(),
    }
}

pub async fn delete_album(
    State(state): State<AppState>,
    AxumPath(album_id): AxumPath<String>,
) -> JsonResult<MessageResponse> {
    state
        .library
        .delete_album(&album_id)
        .await
        .map_err(library_error)?;
    Ok(Json(MessageResponse {
        message: "Album deleted",
    }))
}
