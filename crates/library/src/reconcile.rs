use std::collections::{HashMap, HashSet};
use std::path::Path;

use common::{file_stem, track_id, Track};
use metadata::TrackEntry;

/// One file in its final position, with the sidecar entry bound to it if any.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedFile<'a> {
    pub file_name: String,
    pub entry: Option<&'a TrackEntry>,
}

pub fn normalize_file_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Orders the audio files of one album. Sidecar entries come first, in
/// sidecar order, each bound to the file it names (case and surrounding
/// whitespace ignored, each file used at most once). Files no entry claimed
/// follow in lexicographic order.
pub fn reconcile<'a>(audio_files: &[String], entries: &'a [TrackEntry]) -> Vec<OrderedFile<'a>> {
    let by_normalized: HashMap<String, &str> = audio_files
        .iter()
        .map(|name| (normalize_file_name(name), name.as_str()))
        .collect();

    let mut ordered = Vec::with_capacity(audio_files.len());
    let mut used: HashSet<&str> = HashSet::new();

    for entry in entries {
        let Some(reference) = entry.file.as_deref() else {
            continue;
        };
        let lookup = normalize_file_name(reference);
        if lookup.is_empty() {
            continue;
        }
        if let Some(&actual) = by_normalized.get(&lookup) {
            if used.insert(actual) {
                ordered.push(OrderedFile {
                    file_name: actual.to_string(),
                    entry: Some(entry),
                });
            }
        }
    }

    let mut remaining: Vec<&String> = audio_files
        .iter()
        .filter(|name| !used.contains(name.as_str()))
        .collect();
    remaining.sort();
    ordered.extend(remaining.into_iter().map(|name| OrderedFile {
        file_name: name.clone(),
        entry: None,
    }));

    ordered
}

/// Builds track records for an ordered file list. Positions count from 1
/// unless the bound entry carries an explicit order, which is used as-is.
pub fn build_tracks(album_id: &str, album_dir: &Path, ordered: &[OrderedFile<'_>]) -> Vec<Track> {
    ordered
        .iter()
        .enumerate()
        .map(|(index, file)| {
            let title = file
                .entry
                .and_then(|entry| entry.title.clone())
                .unwrap_or_else(|| file_stem(&file.file_name));
            Track {
                id: track_id(album_id, &file.file_name),
                album_id: album_id.to_string(),
                file_name: file.file_name.clone(),
                file_path: album_dir.join(&file.file_name),
                title,
                order: file
                    .entry
                    .and_then(|entry| entry.order)
                    .unwrap_or(index as i64 + 1),
                duration: file.entry.and_then(|entry| entry.duration),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn entry(file: &str) -> TrackEntry {
        TrackEntry {
            file: Some(file.to_string()),
            ..TrackEntry::default()
        }
    }

    fn names(ordered: &[OrderedFile<'_>]) -> Vec<String> {
        ordered.iter().map(|file| file.file_name.clone()).collect()
    }

    #[test]
    fn sidecar_order_wins() {
        let entries = vec![entry("b.mp3"), entry("a.mp3")];
        let ordered = reconcile(&files(&["a.mp3", "b.mp3"]), &entries);
        assert_eq!(names(&ordered), vec!["b.mp3", "a.mp3"]);
    }

    #[test]
    fn no_sidecar_sorts_alphabetically() {
        let ordered = reconcile(&files(&["c.mp3", "a.mp3", "b.mp3"]), &[]);
        assert_eq!(names(&ordered), vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert!(ordered.iter().all(|file| file.entry.is_none()));
    }

    #[test]
    fn matched_tracks_precede_unmatched() {
        let entries = vec![entry("x.mp3")];
        let ordered = reconcile(&files(&["z.mp3", "y.mp3", "x.mp3"]), &entries);
        assert_eq!(names(&ordered), vec!["x.mp3", "y.mp3", "z.mp3"]);
        assert!(ordered[0].entry.is_some());
        assert!(ordered[1].entry.is_none());
        assert!(ordered[2].entry.is_none());
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        let entries = vec![entry(" Track.MP3 ")];
        let ordered = reconcile(&files(&["track.mp3"]), &entries);
        assert_eq!(names(&ordered), vec!["track.mp3"]);
        assert!(ordered[0].entry.is_some());
    }

    #[test]
    fn duplicate_entries_bind_once() {
        let mut second = entry("A.mp3");
        second.title = Some("Second".to_string());
        let mut first = entry("a.mp3");
        first.title = Some("First".to_string());
        let entries = vec![first, second, entry("b.mp3")];
        let ordered = reconcile(&files(&["a.mp3", "b.mp3"]), &entries);
        assert_eq!(names(&ordered), vec!["a.mp3", "b.mp3"]);
        assert_eq!(
            ordered[0].entry.and_then(|e| e.title.as_deref()),
            Some("First")
        );
    }

    #[test]
    fn unresolvable_entries_are_skipped() {
        let entries = vec![
            TrackEntry::default(),
            entry("   "),
            entry("missing.mp3"),
            entry("b.mp3"),
        ];
        let ordered = reconcile(&files(&["a.mp3", "b.mp3"]), &entries);
        assert_eq!(names(&ordered), vec!["b.mp3", "a.mp3"]);
    }

    #[test]
    fn positions_are_sequential_unless_overridden() {
        let mut titled = entry("b.mp3");
        titled.title = Some("Bee".to_string());
        titled.order = Some(10);
        titled.duration = Some(200.0);
        let entries = vec![titled, entry("c.mp3")];
        let ordered = reconcile(&files(&["a.mp3", "b.mp3", "c.mp3"]), &entries);
        let tracks = build_tracks("album", Path::new("/music/album"), &ordered);

        let summary: Vec<(&str, &str, i64, Option<f64>)> = tracks
            .iter()
            .map(|t| (t.file_name.as_str(), t.title.as_str(), t.order, t.duration))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("b.mp3", "Bee", 10, Some(200.0)),
                ("c.mp3", "c", 2, None),
                ("a.mp3", "a", 3, None),
            ]
        );
        assert_eq!(tracks[0].file_path, Path::new("/music/album/b.mp3"));
        assert!(tracks.iter().all(|t| t.album_id == "album"));
    }

    #[test]
    fn override_ties_are_kept_verbatim() {
        let mut first = entry("a.mp3");
        first.order = Some(1);
        let mut second = entry("b.mp3");
        second.order = Some(1);
        let entries = vec![first, second];
        let ordered = reconcile(&files(&["a.mp3", "b.mp3"]), &entries);
        let tracks = build_tracks("album", Path::new("/music/album"), &ordered);
        assert_eq!(tracks[0].order, 1);
        assert_eq!(tracks[1].order, 1);
        assert_ne!(tracks[0].id, tracks[1].id);
    }
}
