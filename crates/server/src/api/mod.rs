pub mod albums;
pub mod uploads;

use axum::{
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use crate::state::{AppState, HealthResponse};
use crate::streaming::stream_track;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/library/status", get(albums::library_status))
        .route("/library/rescan", post(albums::rescan))
        .route("/albums", get(albums::list_albums).post(uploads::create_album))
        .route(
            "/albums/:album_id",
            get(albums::get_album).delete(uploads::delete_album),
        )
        .route("/albums/:album_id/tracks", post(uploads::append_tracks))
        .route(
            "/albums/:album_id/tracks/:track_id",
            delete(uploads::delete_track),
        )
        .route("/tracks/:track_id/stream", get(stream_track))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
