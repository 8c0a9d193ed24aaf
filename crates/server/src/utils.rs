use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use library::LibraryError;
use tracing::error;

use crate::state::ErrorResponse;

pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn json_error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_error(status, message).into_response()
}

/// Maps a library failure to its HTTP status. IO details stay in the log.
pub fn library_error(err: LibraryError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        LibraryError::NotFound(message) => json_error(StatusCode::NOT_FOUND, message),
        LibraryError::InvalidInput(message) => json_error(StatusCode::BAD_REQUEST, message),
        LibraryError::Conflict(message) => json_error(StatusCode::CONFLICT, message),
        LibraryError::Io(err) => {
            error!("Library io failure: {}", err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

pub fn url_escape(input: &str) -> String {
    let mut out = String::new();
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'~' => out.push(*byte as char),
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_reserved_bytes() {
        assert_eq!(url_escape("cover.jpg"), "cover.jpg");
        assert_eq!(url_escape("A B/C"), "A%20B%2FC");
        assert_eq!(url_escape("é"), "%C3%A9");
    }

    #[test]
    fn library_errors_map_to_statuses() {
        let cases = [
            (LibraryError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LibraryError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (LibraryError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                LibraryError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(library_error(err).0, status);
        }
        let (_, Json(body)) = library_error(LibraryError::Io(std::io::Error::other("secret")));
        assert!(!body.error.contains("secret"));
    }
}
