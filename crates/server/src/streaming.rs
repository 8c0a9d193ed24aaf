use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use common::audio_mime;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::range::parse_range_header;
use crate::state::AppState;
use crate::utils::json_error_response;

pub async fn stream_track(
    State(state): State<AppState>,
    AxumPath(track_id): AxumPath<String>,
    headers: HeaderMap,
) -> Response {
    let track = match state.library.get_track(&track_id).await {
        Some(track) => track,
        None => return json_error_response(StatusCode::NOT_FOUND, "Track not found"),
    };
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    serve_file(&track.file_path, range).await
}

/// Streams `path` in full or, when `range` parses, the requested span. The
/// file handle lives inside the body stream and closes when the client stops
/// reading.
pub async fn serve_file(path: &Path, range: Option<&str>) -> Response {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return json_error_response(StatusCode::NOT_FOUND, "Track file missing"),
    };
    let size = metadata.len();
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            error!("Failed to open {}: {}", path.display(), err);
            return json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let content_type = HeaderValue::from_static(audio_mime(path));
    let range = range.and_then(|value| parse_range_header(value, size));
    let Some(range) = range else {
        let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
        insert_common_headers(&mut response, content_type, size);
        return response;
    };

    if let Err(err) = file.seek(SeekFrom::Start(range.start)).await {
        error!("Failed to seek {}: {}", path.display(), err);
        return json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }
    debug!(
        "Serving bytes {}-{}/{} of {}",
        range.start,
        range.end,
        size,
        path.display()
    );
    let length = range.content_length();
    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    insert_common_headers(&mut response, content_type, length);
    if let Ok(value) =
        HeaderValue::from_str(&format!("bytes {}-{}/{}", range.start, range.end, size))
    {
        response.headers_mut().insert(header::CONTENT_RANGE, value);
    }
    response
}

fn insert_common_headers(response: &mut Response, content_type: HeaderValue, length: u64) {
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}
