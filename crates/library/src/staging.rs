use std::io;
use std::path::{Path, PathBuf};

use common::extension_lowercase;
use tracing::{debug, warn};
use uuid::Uuid;

/// Holding directory for uploads that have not been placed in an album yet.
#[derive(Clone, Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserves a fresh, empty staged file for an upload named
    /// `original_name`. The caller writes the content to [`StagedFile::path`].
    pub async fn reserve(&self, original_name: &str) -> io::Result<StagedFile> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Uuid::new_v4().simple().to_string());
        tokio::fs::File::create(&path).await?;
        Ok(StagedFile {
            path,
            original_name: original_name.to_string(),
            placed: false,
        })
    }

    /// Deletes staged files left behind by an earlier process. Only names
    /// this area generates are touched. Returns how many were removed.
    pub async fn purge(&self) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let generated = name
                .to_str()
                .map(|name| Uuid::try_parse(name).is_ok())
                .unwrap_or(false);
            if generated && entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn stage_bytes(&self, original_name: &str, data: &[u8]) -> io::Result<StagedFile> {
        let staged = self.reserve(original_name).await?;
        tokio::fs::write(staged.path(), data).await?;
        Ok(staged)
    }
}

/// An upload sitting in the staging area. Dropping it deletes the staged
/// content unless it was moved into an album folder first.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    original_name: String,
    placed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Lowercased extension of the client-supplied name, with a leading dot.
    pub fn extension(&self) -> Option<String> {
        let file_name = Path::new(&self.original_name).file_name()?;
        extension_lowercase(Path::new(file_name)).map(|ext| format!(".{}", ext))
    }

    /// The client-supplied name without its extension or any directory part.
    pub fn stem(&self) -> String {
        Path::new(&self.original_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Places the staged content at `target` without replacing anything
    /// already there. Fails with `AlreadyExists` when the name is taken, in
    /// which case the staged file is left untouched.
    pub(crate) async fn place_at(&mut self, target: &Path) -> io::Result<()> {
        match tokio::fs::hard_link(&self.path, target).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Err(err),
            Err(err) => {
                debug!(
                    "Link of {} failed ({}); copying instead",
                    self.path.display(),
                    err
                );
                copy_into_place(&self.path, target).await?;
            }
        }
        self.release().await;
        Ok(())
    }

    /// Removes the staged path once its content lives elsewhere. When the
    /// removal fails the file stays owned, and `Drop` tries again.
    async fn release(&mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => self.placed = true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => self.placed = true,
            Err(err) => warn!("Failed to remove staged file {}: {}", self.path.display(), err),
        }
    }
}

/// Copies `source` to a hidden `.part` file beside `target` and then claims
/// `target` for it. A partial copy never carries the target's name.
async fn copy_into_place(source: &Path, target: &Path) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let part = dir.join(format!(".{}.part", Uuid::new_v4().simple()));
    let result = match tokio::fs::copy(source, &part).await {
        Ok(_) => claim_with(&part, target).await,
        Err(err) => Err(err),
    };
    match tokio::fs::remove_file(&part).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove partial copy {}: {}", part.display(), err),
    }
    result
}

async fn claim_with(part: &Path, target: &Path) -> io::Result<()> {
    match tokio::fs::hard_link(part, target).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(err),
        Err(err) => {
            // No links on this filesystem: reserve the name, then rename over it.
            debug!("Link into {} failed ({}); renaming", target.display(), err);
            tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target)
                .await?;
            if let Err(err) = tokio::fs::rename(part, target).await {
                if let Err(cleanup) = tokio::fs::remove_file(target).await {
                    warn!("Failed to cleanup {}: {}", target.display(), cleanup);
                }
                return Err(err);
            }
            Ok(())
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.placed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to cleanup staged file {}: {}", self.path.display(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn dropped_upload_is_removed() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        let staged = staging.stage_bytes("song.mp3", b"data").await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn placed_upload_survives_drop() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        let mut staged = staging.stage_bytes("song.mp3", b"data").await.unwrap();
        let target = dir.path().join("song.mp3");
        let staged_path = staged.path().to_path_buf();
        staged.place_at(&target).await.unwrap();
        assert!(!staged_path.exists());
        drop(staged);
        assert_eq!(std::fs::read(&target).unwrap(), b"data");
    }

    #[tokio::test]
    async fn placing_never_replaces_an_existing_file() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        let mut staged = staging.stage_bytes("song.mp3", b"new").await.unwrap();
        let target = dir.path().join("song.mp3");
        std::fs::write(&target, b"old").unwrap();

        let err = staged.place_at(&target).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"new");

        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn copies_land_under_the_target_name_only_when_complete() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Album");
        std::fs::create_dir(&album).unwrap();
        let source = dir.path().join("source");
        std::fs::write(&source, b"audio").unwrap();

        let target = album.join("song.mp3");
        copy_into_place(&source, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"audio");

        let err = copy_into_place(&source, &target).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let missing = dir.path().join("gone");
        let other = album.join("other.mp3");
        assert!(copy_into_place(&missing, &other).await.is_err());
        assert!(!other.exists());

        let names: Vec<String> = std::fs::read_dir(&album)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["song.mp3".to_string()]);
    }

    #[tokio::test]
    async fn failed_release_leaves_cleanup_to_drop() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        let mut staged = staging.reserve("song.mp3").await.unwrap();
        let path = staged.path().to_path_buf();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        staged.release().await;
        assert!(!staged.placed);

        std::fs::remove_dir(&path).unwrap();
        std::fs::write(&path, b"left").unwrap();
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn purge_only_removes_staged_names() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join(".staging"));
        assert_eq!(staging.purge().await.unwrap(), 0);

        let staged = staging.stage_bytes("a.mp3", b"a").await.unwrap();
        let leftover = staged.path().to_path_buf();
        std::mem::forget(staged);
        std::fs::write(staging.dir().join("keep.txt"), b"k").unwrap();

        assert_eq!(staging.purge().await.unwrap(), 1);
        assert!(!leftover.exists());
        assert!(staging.dir().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn names_come_from_the_client_file_name() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().to_path_buf());
        let staged = staging.reserve("../evil/Track One.MP3").await.unwrap();
        assert_eq!(staged.extension().as_deref(), Some(".mp3"));
        assert_eq!(staged.stem(), "Track One");
        assert!(staged.path().starts_with(dir.path()));

        let bare = staging.reserve("README").await.unwrap();
        assert_eq!(bare.extension(), None);
    }
}
