//! Durable filesystem artifact store (§4.1).
//!
//! Maps `(user_slug, recording_id)` to canonical paths with a predictable
//! layout: `{root}/user_{slug:06d}/{video|processed_audio|transcriptions/{id}|thumbnails|temp}/...`.
//! Callers outside this module must never construct these paths by hand —
//! every path handed to a repository or executor is obtained here so that
//! tenant isolation on the filesystem is enforced in one place.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn user_root(&self, slug: u32) -> PathBuf {
        self.root.join(format!("user_{slug:06}"))
    }

    pub fn recording_video_dir(&self, slug: u32) -> PathBuf {
        self.user_root(slug).join("video")
    }

    pub fn recording_video(&self, slug: u32, recording_id: i64) -> PathBuf {
        self.recording_video_dir(slug)
            .join(format!("{recording_id}.mp4"))
    }

    pub fn processed_video(&self, slug: u32, recording_id: i64) -> PathBuf {
        self.recording_video_dir(slug)
            .join(format!("{recording_id}.processed.mp4"))
    }

    pub fn recording_audio_dir(&self, slug: u32) -> PathBuf {
        self.user_root(slug).join("processed_audio")
    }

    pub fn recording_audio(&self, slug: u32, recording_id: i64) -> PathBuf {
        self.recording_audio_dir(slug)
            .join(format!("{recording_id}.m4a"))
    }

    pub fn transcription_dir(&self, slug: u32, recording_id: i64) -> PathBuf {
        self.user_root(slug)
            .join("transcriptions")
            .join(recording_id.to_string())
    }

    pub fn user_thumbnails_dir(&self, slug: u32) -> PathBuf {
        self.user_root(slug).join("thumbnails")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Validate that `path` lies within `slug`'s user root. Any path handed
    /// in from outside this module (e.g. deserialized from a manual
    /// override) must pass this check before use.
    pub fn validate_owned(&self, slug: u32, path: &Path) -> Result<()> {
        let root = self.user_root(slug);
        let root = root.canonicalize().unwrap_or(root);
        let candidate = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if candidate.starts_with(&root) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "path {} is not owned by user root {}",
                path.display(),
                root.display()
            )))
        }
    }

    pub async fn ensure_dirs(&self, slug: u32, recording_id: i64) -> Result<()> {
        for dir in [
            self.recording_video_dir(slug),
            self.recording_audio_dir(slug),
            self.transcription_dir(slug, recording_id),
            self.user_thumbnails_dir(slug),
            self.temp_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Sum of file sizes under the user's root (§4.1).
    pub async fn calc_user_storage_bytes(&self, slug: u32) -> Result<u64> {
        let root = self.user_root(slug);
        if !root.exists() {
            return Ok(0);
        }
        let mut total = 0u64;
        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    /// Remove large media files (video, audio) for a recording. Returns
    /// bytes freed. Transcription artifacts are left untouched (invariant 3
    /// in §3).
    pub async fn remove_media_files(&self, slug: u32, recording_id: i64) -> Result<u64> {
        let mut freed = 0u64;
        for path in [
            self.recording_video(slug, recording_id),
            self.processed_video(slug, recording_id),
            self.recording_audio(slug, recording_id),
        ] {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                freed += meta.len();
                let _ = tokio::fs::remove_file(&path).await;
            }
        }
        Ok(freed)
    }

    pub async fn remove_transcription_dir(&self, slug: u32, recording_id: i64) -> Result<()> {
        let dir = self.transcription_dir(slug, recording_id);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_predictable() {
        let store = ArtifactStore::new("/data");
        assert_eq!(
            store.recording_video(7, 42),
            PathBuf::from("/data/user_000007/video/42.mp4")
        );
        assert_eq!(
            store.transcription_dir(7, 42),
            PathBuf::from("/data/user_000007/transcriptions/42")
        );
    }
}
