use std::fs;
use std::io;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

/// Keys that name the file a sidecar track entry refers to, in priority order.
const FILE_KEYS: &[&str] = &["file", "filename", "path", "name"];

/// Keys that carry a track's display title, in priority order.
const TITLE_KEYS: &[&str] = &["title", "displayName", "name", "label"];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlbumDescription {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tracks: Vec<TrackEntry>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackEntry {
    pub file: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub order: Option<i64>,
}

#[derive(Debug)]
pub enum DescriptionError {
    Io(io::Error),
    Json(serde_json::Error),
    NotAnObject,
}

impl std::fmt::Display for DescriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionError::Io(err) => write!(f, "io error: {}", err),
            DescriptionError::Json(err) => write!(f, "json error: {}", err),
            DescriptionError::NotAnObject => write!(f, "top level is not an object"),
        }
    }
}

impl std::error::Error for DescriptionError {}

impl From<io::Error> for DescriptionError {
    fn from(err: io::Error) -> Self {
        DescriptionError::Io(err)
    }
}

impl From<serde_json::Error> for DescriptionError {
    fn from(err: serde_json::Error) -> Self {
        DescriptionError::Json(err)
    }
}

/// Reads an album sidecar. A missing file yields an empty description
/// silently; any other failure is logged and also yields an empty
/// description, so one bad sidecar never stops a scan.
pub fn read_description(path: &Path) -> AlbumDescription {
    match try_read_description(path) {
        Ok(description) => description,
        Err(DescriptionError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            AlbumDescription::default()
        }
        Err(err) => {
            warn!("Failed to parse metadata at {}: {}", path.display(), err);
            AlbumDescription::default()
        }
    }
}

fn try_read_description(path: &Path) -> Result<AlbumDescription, DescriptionError> {
    let contents = fs::read_to_string(path)?;
    parse_description(&contents)
}

pub fn parse_description(contents: &str) -> Result<AlbumDescription, DescriptionError> {
    let value: Value = serde_json::from_str(contents)?;
    let object = value.as_object().ok_or(DescriptionError::NotAnObject)?;

    let tracks = object
        .get("tracks")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_object)
                .map(parse_track_entry)
                .collect()
        })
        .unwrap_or_default();

    Ok(AlbumDescription {
        title: trimmed_string(object.get("title")),
        description: trimmed_string(object.get("description")),
        tracks,
    })
}

fn parse_track_entry(entry: &Map<String, Value>) -> TrackEntry {
    TrackEntry {
        file: first_string(entry, FILE_KEYS),
        title: first_string(entry, TITLE_KEYS),
        duration: entry.get("duration").and_then(Value::as_f64),
        order: entry.get("order").and_then(integral),
    }
}

fn first_string(entry: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| entry.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn trimmed_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// Orders must be whole numbers; `3.0` is accepted, `2.5` is ignored.
fn integral(value: &Value) -> Option<i64> {
    if let Some(order) = value.as_i64() {
        return Some(order);
    }
    let order = value.as_f64()?;
    if order.fract() == 0.0 && order >= i64::MIN as f64 && order <= i64::MAX as f64 {
        Some(order as i64)
    } else {
        None
    }
}

/// Writes the minimal sidecar produced when an album is created: only the
/// title and, when present, the description.
pub fn write_description(
    path: &Path,
    title: &str,
    description: Option<&str>,
) -> io::Result<()> {
    let mut object = Map::new();
    let title = title.trim();
    if !title.is_empty() {
        object.insert("title".to_string(), Value::String(title.to_string()));
    }
    if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
        object.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }
    let contents = serde_json::to_string_pretty(&Value::Object(object))
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty_description() {
        let dir = tempdir().unwrap();
        let description = read_description(&dir.path().join("album.json"));
        assert_eq!(description, AlbumDescription::default());
    }

    #[test]
    fn malformed_json_is_empty_description() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("album.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_description(&path), AlbumDescription::default());
    }

    #[test]
    fn non_object_top_level_is_rejected() {
        assert!(matches!(
            parse_description("[1, 2, 3]"),
            Err(DescriptionError::NotAnObject)
        ));
        assert!(matches!(
            parse_description("\"just text\""),
            Err(DescriptionError::NotAnObject)
        ));
    }

    #[test]
    fn file_and_title_aliases_resolve_in_priority_order() {
        let parsed = parse_description(
            r#"{
                "tracks": [
                    {"filename": "a.mp3", "displayName": "Alpha"},
                    {"path": "b.mp3", "label": "Beta"},
                    {"name": "c.mp3"},
                    {"file": "", "filename": "d.mp3", "title": "Delta", "name": "ignored"}
                ]
            }"#,
        )
        .unwrap();
        let files: Vec<_> = parsed.tracks.iter().map(|t| t.file.as_deref()).collect();
        let titles: Vec<_> = parsed.tracks.iter().map(|t| t.title.as_deref()).collect();
        assert_eq!(
            files,
            vec![Some("a.mp3"), Some("b.mp3"), Some("c.mp3"), Some("d.mp3")]
        );
        // `name` doubles as a title alias, matching the file reference.
        assert_eq!(
            titles,
            vec![Some("Alpha"), Some("Beta"), Some("c.mp3"), Some("Delta")]
        );
    }

    #[test]
    fn numeric_fields_require_numbers() {
        let parsed = parse_description(
            r#"{"tracks": [
                {"file": "a.mp3", "duration": 181.5, "order": 7},
                {"file": "b.mp3", "duration": "3:01", "order": "2"},
                {"file": "c.mp3", "order": 3.0},
                {"file": "d.mp3", "order": 2.5}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.tracks[0].duration, Some(181.5));
        assert_eq!(parsed.tracks[0].order, Some(7));
        assert_eq!(parsed.tracks[1].duration, None);
        assert_eq!(parsed.tracks[1].order, None);
        assert_eq!(parsed.tracks[2].order, Some(3));
        assert_eq!(parsed.tracks[3].order, None);
    }

    #[test]
    fn blank_title_and_non_array_tracks_are_ignored() {
        let parsed =
            parse_description(r#"{"title": "   ", "description": 5, "tracks": "a.mp3"}"#).unwrap();
        assert_eq!(parsed, AlbumDescription::default());
    }

    #[test]
    fn non_object_track_entries_are_skipped() {
        let parsed =
            parse_description(r#"{"tracks": ["a.mp3", 4, null, {"file": "b.mp3"}]}"#).unwrap();
        assert_eq!(parsed.tracks.len(), 1);
        assert_eq!(parsed.tracks[0].file.as_deref(), Some("b.mp3"));
    }

    #[test]
    fn written_sidecar_contains_only_title_and_description() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("album.json");
        write_description(&path, "  Night Drive ", Some("  ")).unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"title": "Night Drive"}));

        write_description(&path, "Night Drive", Some(" Synths ")).unwrap();
        let parsed = read_description(&path);
        assert_eq!(parsed.title.as_deref(), Some("Night Drive"));
        assert_eq!(parsed.description.as_deref(), Some("Synths"));
        assert!(parsed.tracks.is_empty());
    }
}
