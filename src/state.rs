use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline stages in order. Each stage owns exactly one live artifact;
/// stale artifacts do not count toward the reached stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    StoryReady,
    AudioReady,
    VideoReady,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoArtifact {
    pub path: PathBuf,
}

/// Session state handed into and returned from every pipeline stage.
///
/// Re-running a stage replaces its artifact and flags everything downstream
/// as stale; the files stay on disk, only the flags travel with the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub session_id: String,
    pub story: Option<Story>,
    pub audio: Option<AudioArtifact>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
    pub video: Option<VideoArtifact>,
    #[serde(default)]
    pub audio_stale: bool,
    #[serde(default)]
    pub video_stale: bool,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            session_id: storage::new_session_id(),
            story: None,
            audio: None,
            images: Vec::new(),
            video: None,
            audio_stale: false,
            video_stale: false,
        }
    }

    pub fn stage(&self) -> Stage {
        if self.video.is_some() && !self.video_stale {
            Stage::VideoReady
        } else if self.audio.is_some() && !self.audio_stale {
            Stage::AudioReady
        } else if self.story.is_some() {
            Stage::StoryReady
        } else {
            Stage::Idle
        }
    }

    /// Called when the story artifact is replaced.
    pub fn invalidate_downstream_of_story(&mut self) {
        self.audio_stale = self.audio.is_some();
        self.video_stale = self.video.is_some();
    }

    /// Called when the audio artifact is replaced.
    pub fn invalidate_downstream_of_audio(&mut self) {
        self.audio_stale = false;
        self.video_stale = self.video.is_some();
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
