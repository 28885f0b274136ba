use crate::error::{Error, Result};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const NARRATION_FILE_STEM: &str = "narration";
const GENERATED_IMAGE_FILE: &str = "generated.png";
const PLACEHOLDER_IMAGE_FILE: &str = "black_frame.png";
const SESSION_FILE: &str = "session.json";

/// How narration/video slot files are named.
///
/// `Fixed` keeps the legacy behavior of the single shared slot: every run
/// overwrites the previous artifact. `PerSession` suffixes the session id so
/// two sessions cannot clobber each other's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactNaming {
    #[default]
    Fixed,
    PerSession,
}

/// The four on-disk storage areas the pipeline writes into.
#[derive(Debug, Clone)]
pub struct StorageAreas {
    root: PathBuf,
    pub videos: PathBuf,
    pub images: PathBuf,
    pub audios: PathBuf,
    pub subtitles: PathBuf,
}

impl StorageAreas {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            videos: root.join("videos"),
            images: root.join("images"),
            audios: root.join("audios"),
            subtitles: root.join("subtitles"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.videos, &self.images, &self.audios, &self.subtitles] {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        Ok(())
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }

    /// Target file for standard-voice narration.
    pub fn narration_slot(&self, naming: ArtifactNaming, session_id: &str) -> PathBuf {
        match naming {
            ArtifactNaming::Fixed => self.audios.join(format!("{}.mp3", NARRATION_FILE_STEM)),
            ArtifactNaming::PerSession => self
                .audios
                .join(format!("{}-{}.mp3", NARRATION_FILE_STEM, session_id)),
        }
    }

    /// Target file for cloned-voice narration, scoped by clone name so it
    /// never collides with the standard slot.
    pub fn cloned_narration_slot(&self, clone_name: &str) -> PathBuf {
        self.audios.join(format!("{}.mp3", slug(clone_name)))
    }

    pub fn generated_image_slot(&self) -> PathBuf {
        self.images.join(GENERATED_IMAGE_FILE)
    }

    pub fn placeholder_image(&self) -> PathBuf {
        self.images.join(PLACEHOLDER_IMAGE_FILE)
    }

    /// Video output name is derived from the audio file's stem, so re-running
    /// with the same narration slot overwrites the previous video.
    pub fn video_output_for(&self, audio: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        self.videos.join(format!("{}.mp4", stem))
    }

    /// Copy user-supplied files into the images area, preserving file names.
    pub fn import_images(&self, sources: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut imported = Vec::with_capacity(sources.len());
        for src in sources {
            let name = src
                .file_name()
                .ok_or_else(|| Error::Validation(format!("not a file: {}", src.display())))?;
            let dest = self.images.join(name);
            fs::copy(src, &dest).map_err(|e| Error::io(src, e))?;
            imported.push(dest);
        }
        Ok(imported)
    }
}

/// File-name-safe version of a user-supplied name.
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() {
        "clone".to_string()
    } else {
        out
    }
}

pub fn new_session_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_naming_is_a_single_slot() {
        let areas = StorageAreas::new("db/storage");
        let a = areas.narration_slot(ArtifactNaming::Fixed, "aaaa1111");
        let b = areas.narration_slot(ArtifactNaming::Fixed, "bbbb2222");
        assert_eq!(a, b);
        assert!(a.ends_with("audios/narration.mp3"));
    }

    #[test]
    fn per_session_naming_separates_sessions() {
        let areas = StorageAreas::new("db/storage");
        let a = areas.narration_slot(ArtifactNaming::PerSession, "aaaa1111");
        let b = areas.narration_slot(ArtifactNaming::PerSession, "bbbb2222");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("aaaa1111"));
    }

    #[test]
    fn video_name_follows_audio_stem() {
        let areas = StorageAreas::new("db/storage");
        let out = areas.video_output_for(Path::new("db/storage/audios/narration.mp3"));
        assert!(out.ends_with("videos/narration.mp4"));
    }

    #[test]
    fn cloned_slot_does_not_collide_with_standard_slot() {
        let areas = StorageAreas::new("db/storage");
        let cloned = areas.cloned_narration_slot("My Narrator!");
        assert!(cloned.ends_with("audios/my-narrator.mp3"));
        assert_ne!(cloned, areas.narration_slot(ArtifactNaming::Fixed, "x"));
    }

    #[test]
    fn slug_handles_degenerate_names() {
        assert_eq!(slug("My Narrator!"), "my-narrator");
        assert_eq!(slug("!!!"), "clone");
        assert_eq!(slug("A  B"), "a-b");
    }

    #[test]
    fn session_ids_are_unique_enough() {
        let a = new_session_id();
        let b = new_session_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn import_copies_into_images_area() {
        let tmp = tempfile::tempdir().unwrap();
        let areas = StorageAreas::new(tmp.path().join("storage"));
        areas.ensure().unwrap();

        let src = tmp.path().join("photo.png");
        fs::write(&src, b"png bytes").unwrap();

        let imported = areas.import_images(&[src]).unwrap();
        assert_eq!(imported.len(), 1);
        assert!(imported[0].ends_with("images/photo.png"));
        assert_eq!(fs::read(&imported[0]).unwrap(), b"png bytes");
    }
}
