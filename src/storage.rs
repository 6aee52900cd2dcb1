//! On-disk audio: synthesized replies, archived uploads and scratch copies.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::AppError;

const MAX_REFERENCE_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct AudioStore {
    audio_dir: PathBuf,
    uploads_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl AudioStore {
    pub fn new(audio_dir: PathBuf, uploads_dir: PathBuf, scratch_dir: PathBuf) -> Self {
        Self {
            audio_dir,
            uploads_dir,
            scratch_dir,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<(), AppError> {
        for dir in [&self.audio_dir, &self.uploads_dir, &self.scratch_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Store a synthesized reply and return the reference clients fetch it by.
    pub async fn save_response(&self, wav: &[u8]) -> Result<String, AppError> {
        let name = unique_name("response_audio");
        write_atomically(&self.audio_dir, &name, wav).await?;
        Ok(name)
    }

    /// Keep the caller's original clip alongside its interaction row.
    pub async fn archive_upload(&self, audio: &[u8]) -> Result<String, AppError> {
        let name = unique_name("user_audio");
        write_atomically(&self.uploads_dir, &name, audio).await?;
        Ok(self.uploads_dir.join(name).to_string_lossy().into_owned())
    }

    /// Copy an upload into a uniquely named scratch file. The file is removed
    /// when the handle is closed or dropped. `audio` is shared, not copied.
    pub async fn stage_scratch(&self, audio: Bytes) -> Result<NamedTempFile, AppError> {
        let dir = self.scratch_dir.clone();
        tokio::task::spawn_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("upload_")
                .suffix(".wav")
                .tempfile_in(dir)?;
            file.write_all(&audio)?;
            file.flush()?;
            Ok::<_, AppError>(file)
        })
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?
    }

    pub async fn read_audio(&self, reference: &str) -> Result<Vec<u8>, AppError> {
        if !is_valid_reference(reference) {
            return Err(AppError::AudioNotFound(reference.to_string()));
        }

        match tokio::fs::read(self.audio_dir.join(reference)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::AudioNotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn unique_name(prefix: &str) -> String {
    format!("{prefix}_{}.wav", Uuid::new_v4().simple())
}

/// Plain `.wav` file names only; no separators, no hidden files.
fn is_valid_reference(reference: &str) -> bool {
    reference.len() <= MAX_REFERENCE_LEN
        && reference.ends_with(".wav")
        && !reference.starts_with('.')
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// Readers never observe a half-written file.
async fn write_atomically(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), AppError> {
    let partial = dir.join(format!("{name}.part"));
    tokio::fs::write(&partial, bytes).await?;
    if let Err(e) = tokio::fs::rename(&partial, dir.join(name)).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store(root: &Path) -> AudioStore {
        AudioStore::new(
            root.join("audio_files"),
            root.join("uploads"),
            root.join("scratch"),
        )
    }

    #[tokio::test]
    async fn saved_replies_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        let name = store.save_response(b"RIFF fake").await.unwrap();
        assert!(name.starts_with("response_audio_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(store.read_audio(&name).await.unwrap(), b"RIFF fake");
        assert!(!store.audio_dir().join(format!("{name}.part")).exists());
    }

    #[tokio::test]
    async fn concurrent_saves_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        let saves: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save_response(b"wav").await.unwrap() })
            })
            .collect();
        let mut names = HashSet::new();
        for save in saves {
            names.insert(save.await.unwrap());
        }
        assert_eq!(names.len(), 32);
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        assert!(matches!(
            store.read_audio("does-not-exist.wav").await,
            Err(AppError::AudioNotFound(_))
        ));
    }

    #[tokio::test]
    async fn traversal_attempts_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();
        std::fs::write(dir.path().join("secret.wav"), b"nope").unwrap();

        for reference in ["../secret.wav", "..", "/etc/passwd", ".hidden.wav", "a/b.wav", "notes.txt"] {
            assert!(
                matches!(store.read_audio(reference).await, Err(AppError::AudioNotFound(_))),
                "{reference} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn scratch_files_vanish_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        let scratch = store.stage_scratch(Bytes::from_static(b"clip")).await.unwrap();
        let path = scratch.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"clip");

        scratch.close().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staging_shares_the_upload_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        let upload = Bytes::from(vec![7u8; 64 * 1024]);
        let staged = upload.clone();
        assert_eq!(staged.as_ptr(), upload.as_ptr());

        let scratch = store.stage_scratch(staged).await.unwrap();
        assert_eq!(std::fs::read(scratch.path()).unwrap(), upload.as_ref());
        scratch.close().unwrap();
    }

    #[tokio::test]
    async fn archived_uploads_live_in_the_uploads_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        let path = store.archive_upload(b"clip").await.unwrap();
        assert!(path.starts_with(&*dir.path().join("uploads").to_string_lossy()));
        assert_eq!(std::fs::read(&path).unwrap(), b"clip");
    }
}
