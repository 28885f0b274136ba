use crate::config::VoiceConfig;
use crate::error::{Error, Result};
use crate::media::MediaProbe;
use crate::state::AudioArtifact;
use crate::storage::{ArtifactNaming, StorageAreas};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceInfo>,
}

#[derive(Deserialize)]
struct CloneResponse {
    voice_id: String,
}

#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str, model_id: &str) -> Result<Vec<u8>>;

    /// Available voices in whatever order the API returns them.
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>>;

    /// Registers a voice profile from sample files and returns its id.
    async fn clone_voice(
        &self,
        name: &str,
        description: &str,
        samples: &[PathBuf],
    ) -> Result<String>;
}

// --- ElevenLabs client ---

#[derive(Debug)]
pub struct ElevenLabsClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    /// Fails immediately when no key is available; synthesis is never
    /// attempted with a missing credential.
    pub fn new(api_key: Option<String>, base_url: &str) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            Error::Configuration(
                "no voice API key. Set voice.api_key in config.yml or ELEVENLABS_API_KEY.".into(),
            )
        })?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl SpeechApi for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str, model_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        let body = serde_json::json!({
            "text": text,
            "model_id": model_id,
        });

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream("voice", e))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            log::error!("voice synthesis failed: {}", error_text);
            return Err(Error::upstream("voice", error_text));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::upstream("voice", e))?;
        Ok(bytes.to_vec())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        let url = format!("{}/v1/voices", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::upstream("voice", e))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            log::error!("listing voices failed: {}", error_text);
            return Err(Error::upstream("voice", error_text));
        }

        let parsed: VoicesResponse = resp.json().await.map_err(|e| Error::upstream("voice", e))?;
        Ok(parsed.voices)
    }

    async fn clone_voice(
        &self,
        name: &str,
        description: &str,
        samples: &[PathBuf],
    ) -> Result<String> {
        let url = format!("{}/v1/voices/add", self.base_url);

        let mut form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .text("description", description.to_string());
        for path in samples {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| Error::io(path, e))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "sample.mp3".to_string());
            form = form.part(
                "files",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );
        }

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::upstream("voice", e))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            log::error!("voice cloning failed: {}", error_text);
            return Err(Error::upstream("voice", error_text));
        }

        let parsed: CloneResponse = resp.json().await.map_err(|e| Error::upstream("voice", e))?;
        Ok(parsed.voice_id)
    }
}

// --- Voice service ---

pub struct VoiceService {
    api: Box<dyn SpeechApi>,
    probe: Box<dyn MediaProbe>,
    storage: StorageAreas,
    naming: ArtifactNaming,
}

impl VoiceService {
    pub fn new(
        api: Box<dyn SpeechApi>,
        probe: Box<dyn MediaProbe>,
        storage: StorageAreas,
        naming: ArtifactNaming,
    ) -> Self {
        Self {
            api,
            probe,
            storage,
            naming,
        }
    }

    /// Builds the service over the real ElevenLabs client. An explicit key
    /// argument overrides the configured/environment one; without any key
    /// this fails at construction.
    pub fn from_config(
        config: &VoiceConfig,
        api_key: Option<String>,
        probe: Box<dyn MediaProbe>,
        storage: StorageAreas,
        naming: ArtifactNaming,
    ) -> Result<Self> {
        let key = api_key.or_else(|| config.resolve_api_key());
        let client = ElevenLabsClient::new(key, &config.base_url)?;
        Ok(Self::new(Box::new(client), probe, storage, naming))
    }

    /// Narrates `text` with a stock voice into the narration slot,
    /// overwriting whatever was there.
    pub async fn generate_standard_audio(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
        session_id: &str,
    ) -> Result<AudioArtifact> {
        let text = non_empty(text)?;
        let audio = self.api.synthesize(text, voice_id, model_id).await?;
        let path = self.storage.narration_slot(self.naming, session_id);
        self.write_artifact(&path, &audio).await
    }

    /// Registers a cloned voice from the sample files, then narrates with
    /// it. Sample length limits are the caller's responsibility and must be
    /// checked before this is invoked.
    pub async fn generate_cloned_audio(
        &self,
        text: &str,
        clone_name: &str,
        clone_description: &str,
        samples: &[PathBuf],
        model_id: &str,
    ) -> Result<AudioArtifact> {
        let text = non_empty(text)?;
        if samples.is_empty() {
            return Err(Error::Validation(
                "provide at least one sample audio file to clone a voice".into(),
            ));
        }

        let voice_id = self
            .api
            .clone_voice(clone_name, clone_description, samples)
            .await?;
        log::info!("cloned voice {:?} registered as {}", clone_name, voice_id);

        let audio = self.api.synthesize(text, &voice_id, model_id).await?;
        let path = self.storage.cloned_narration_slot(clone_name);
        self.write_artifact(&path, &audio).await
    }

    pub async fn list_voices(&self) -> Result<Vec<VoiceInfo>> {
        self.api.list_voices().await
    }

    async fn write_artifact(&self, path: &Path, audio: &[u8]) -> Result<AudioArtifact> {
        fs::write(path, audio).map_err(|e| Error::io(path, e))?;
        let duration_seconds = self.probe.duration_seconds(path).await?;
        log::info!(
            "narration written to {} ({:.1}s)",
            path.display(),
            duration_seconds
        );
        Ok(AudioArtifact {
            path: path.to_path_buf(),
            duration_seconds,
        })
    }
}

fn non_empty(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(
            "there is no story text to narrate yet".into(),
        ));
    }
    Ok(trimmed)
}
