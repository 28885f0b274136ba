use crate::error::{Error, Result};
use crate::media::MediaProbe;
use crate::state::{PipelineState, Story};
use crate::storage::StorageAreas;
use crate::story::{StoryRequest, StoryService};
use crate::video::VideoService;
use crate::voice::VoiceService;
use std::fs;
use std::path::{Path, PathBuf};

/// Longest sample accepted for voice cloning. Checked here, before the
/// cloning API is ever contacted.
pub const MAX_CLONE_SAMPLE_SECONDS: f64 = 120.0;

/// Sequences the three generation stages. Every stage function takes the
/// session state by value and hands back the updated state; the caller
/// decides when to persist it. Stages run strictly in order within a
/// session and each one replaces its single owned artifact.
pub struct Pipeline {
    story: StoryService,
    voice: VoiceService,
    video: VideoService,
    probe: Box<dyn MediaProbe>,
    storage: StorageAreas,
}

impl Pipeline {
    pub fn new(
        story: StoryService,
        voice: VoiceService,
        video: VideoService,
        probe: Box<dyn MediaProbe>,
        storage: StorageAreas,
    ) -> Self {
        Self {
            story,
            voice,
            video,
            probe,
            storage,
        }
    }

    // --- Session persistence ---

    pub fn load_or_new_session(&self) -> PipelineState {
        let path = self.storage.session_file();
        if path.exists() {
            match fs::read_to_string(&path)
                .map_err(|e| Error::io(&path, e))
                .and_then(|content| Ok(serde_json::from_str(&content)?))
            {
                Ok(state) => return state,
                Err(e) => log::warn!("could not restore session, starting fresh: {}", e),
            }
        }
        PipelineState::new()
    }

    pub fn save_session(&self, state: &PipelineState) -> Result<()> {
        let path = self.storage.session_file();
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).map_err(|e| Error::io(&path, e))
    }

    // --- Story stage ---

    /// Bypass edge: the user supplies the story text directly instead of
    /// generating one.
    pub fn supply_story(&self, mut state: PipelineState, text: &str) -> Result<PipelineState> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("none") {
            return Err(Error::Validation(
                "paste a story first, or generate one from an idea".into(),
            ));
        }
        state.story = Some(Story {
            text: text.to_string(),
        });
        state.invalidate_downstream_of_story();
        Ok(state)
    }

    pub async fn generate_story(
        &self,
        mut state: PipelineState,
        request: &StoryRequest,
    ) -> Result<PipelineState> {
        let story = self.story.generate_story(request).await?;
        state.story = Some(story);
        state.invalidate_downstream_of_story();
        Ok(state)
    }

    // --- Voice stage ---

    pub async fn synthesize_narration(
        &self,
        mut state: PipelineState,
        voice_id: &str,
        model_id: &str,
    ) -> Result<PipelineState> {
        let story = require_story(&state)?;
        let audio = self
            .voice
            .generate_standard_audio(&story.text, voice_id, model_id, &state.session_id)
            .await?;
        state.audio = Some(audio);
        state.invalidate_downstream_of_audio();
        Ok(state)
    }

    pub async fn synthesize_cloned_narration(
        &self,
        mut state: PipelineState,
        clone_name: &str,
        clone_description: &str,
        samples: &[PathBuf],
        model_id: &str,
    ) -> Result<PipelineState> {
        let story = require_story(&state)?;
        if samples.is_empty() {
            return Err(Error::Validation(
                "provide at least one sample audio file to clone a voice".into(),
            ));
        }
        for sample in samples {
            let duration = self.probe.duration_seconds(sample).await?;
            if duration > MAX_CLONE_SAMPLE_SECONDS {
                return Err(Error::Validation(format!(
                    "sample {} is {:.0}s long; voice samples must be at most {:.0} seconds",
                    sample.display(),
                    duration,
                    MAX_CLONE_SAMPLE_SECONDS
                )));
            }
        }

        let audio = self
            .voice
            .generate_cloned_audio(&story.text, clone_name, clone_description, samples, model_id)
            .await?;
        state.audio = Some(audio);
        state.invalidate_downstream_of_audio();
        Ok(state)
    }

    pub async fn list_voices(&self) -> Result<Vec<crate::voice::VoiceInfo>> {
        self.voice.list_voices().await
    }

    // --- Image handling ---

    pub fn import_images(
        &self,
        mut state: PipelineState,
        sources: &[PathBuf],
    ) -> Result<PipelineState> {
        if sources.is_empty() {
            return Err(Error::Validation("no image files given".into()));
        }
        state.images = self.video.import_images(sources)?;
        Ok(state)
    }

    pub async fn generate_image(
        &self,
        mut state: PipelineState,
        prompt: &str,
    ) -> Result<PipelineState> {
        let path = self.video.generate_image(prompt).await?;
        state.images = vec![path];
        Ok(state)
    }

    // --- Video stage ---

    pub async fn assemble_static_video(
        &self,
        mut state: PipelineState,
        image: Option<&Path>,
    ) -> Result<PipelineState> {
        let audio = require_audio(&state)?;
        let video = self.video.create_static_video(audio, image).await?;
        state.video = Some(video);
        state.video_stale = false;
        Ok(state)
    }

    pub async fn assemble_slideshow(&self, mut state: PipelineState) -> Result<PipelineState> {
        let audio = require_audio(&state)?;
        if state.images.is_empty() {
            return Err(Error::Validation(
                "upload or generate at least one image first".into(),
            ));
        }
        let video = self.video.create_slideshow_video(&state.images, audio).await?;
        state.video = Some(video);
        state.video_stale = false;
        Ok(state)
    }

    pub fn generate_subtitles(&self, state: &PipelineState) -> Result<PathBuf> {
        let audio = require_audio(state)?;
        self.video.generate_subtitles(audio)
    }
}

fn require_story(state: &PipelineState) -> Result<&Story> {
    state
        .story
        .as_ref()
        .filter(|s| !s.text.trim().is_empty())
        .ok_or_else(|| Error::Validation("generate or paste a story first".into()))
}

fn require_audio(state: &PipelineState) -> Result<&crate::state::AudioArtifact> {
    let audio = state
        .audio
        .as_ref()
        .ok_or_else(|| Error::Validation("synthesize the narration first".into()))?;
    if state.audio_stale {
        log::warn!("narration predates the current story; consider re-synthesizing");
    }
    Ok(audio)
}
