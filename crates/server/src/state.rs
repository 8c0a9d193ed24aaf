use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use common::{Album, Track};
use library::Library;
use notify::RecommendedWatcher;
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::ServerConfig;
use crate::utils::url_escape;

#[derive(Clone)]
pub struct AppState {
    pub library: Library,
    pub config: Arc<ServerConfig>,
    pub watcher: Arc<RwLock<Option<RecommendedWatcher>>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LibraryStatusResponse {
    pub status: &'static str,
    pub version: u64,
    pub albums: usize,
    pub tracks: usize,
}

#[derive(Debug, Serialize)]
pub struct AlbumListResponse {
    pub albums: Vec<AlbumSummary>,
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub album: AlbumDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub track_count: usize,
}

impl From<&Album> for AlbumSummary {
    fn from(album: &Album) -> Self {
        Self {
            id: album.id.clone(),
            title: album.title.clone(),
            description: album.description.clone(),
            cover_url: cover_url(album),
            track_count: album.track_count(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDetail {
    #[serde(flatten)]
    pub summary: AlbumSummary,
    pub tracks: Vec<TrackSummary>,
}

impl From<&Album> for AlbumDetail {
    fn from(album: &Album) -> Self {
        Self {
            summary: AlbumSummary::from(album),
            tracks: album.tracks.iter().map(TrackSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub id: String,
    pub album_id: String,
    pub title: String,
    pub order: i64,
    pub duration: Option<f64>,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            album_id: track.album_id.clone(),
            title: track.title.clone(),
            order: track.order,
            duration: track.duration,
        }
    }
}

fn cover_url(album: &Album) -> Option<String> {
    album
        .cover_file_name
        .as_deref()
        .map(|name| format!("/covers/{}/{}", url_escape(&album.id), url_escape(name)))
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
