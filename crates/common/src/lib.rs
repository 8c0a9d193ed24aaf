use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Audio extensions the library treats as tracks. This table is the only
/// place that decides whether a file is a track.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

/// Extensions accepted for uploaded cover images.
pub const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Cover file names checked in each album folder, in priority order.
pub const COVER_CANDIDATES: &[&str] = &[
    "cover.jpg",
    "cover.jpeg",
    "cover.png",
    "folder.jpg",
    "folder.png",
];

/// Name of the per-album sidecar description file.
pub const SIDECAR_FILE_NAME: &str = "album.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub folder_path: PathBuf,
    pub cover_file_name: Option<String>,
    pub cover_path: Option<PathBuf>,
    pub tracks: Vec<Track>,
}

impl Album {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub album_id: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub title: String,
    pub order: i64,
    /// Seconds, only when the sidecar supplies it.
    pub duration: Option<f64>,
}

pub fn stable_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

/// Track ids hash `album_id/file_name`. Neither part can contain `/`, so
/// distinct (album, file) pairs never share an input.
pub fn track_id(album_id: &str, file_name: &str) -> String {
    stable_id(&format!("{}/{}", album_id, file_name))
}

pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

pub fn is_audio_file(path: &Path) -> bool {
    extension_lowercase(path)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn is_cover_file(path: &Path) -> bool {
    extension_lowercase(path)
        .map(|ext| COVER_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn audio_mime(path: &Path) -> &'static str {
    match extension_lowercase(path).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Turns a display name into a folder-safe identifier. The name is NFKC
/// normalised first, so compatibility forms such as fullwidth letters map to
/// the same identifier as their plain spelling. Path delimiters,
/// reserved punctuation and control characters are then dropped, whitespace runs
/// collapse to `_`, and leading dots are removed so the result can never be
/// `.`/`..` or a hidden folder. Returns an empty string when nothing usable
/// is left.
pub fn sanitize_name(value: &str) -> String {
    let normalized: String = value.nfkc().collect();
    let mut out = String::with_capacity(normalized.len());
    let mut in_space = false;
    for ch in normalized.trim().chars() {
        if ch.is_control() || matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            continue;
        }
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        out.push(ch);
    }
    out.trim_start_matches('.').to_string()
}

pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string())
}
