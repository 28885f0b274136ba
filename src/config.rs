use crate::error::{Error, Result};
use crate::media::ResolutionPreset;
use crate::storage::ArtifactNaming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_storage")]
    pub storage_folder: String,

    #[serde(default)]
    pub artifact_naming: ArtifactNaming,

    #[serde(default)]
    pub resolution: ResolutionPreset,

    pub llm: LlmConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub image: ImageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "openai" or "ollama"
    pub openai: Option<OpenAiConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OpenAiConfig {
    /// Falls back to OPENAI_API_KEY when unset.
    pub api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct VoiceConfig {
    /// Falls back to ELEVENLABS_API_KEY when unset.
    pub api_key: Option<String>,
    #[serde(default = "default_voice_base_url")]
    pub base_url: String,
    pub default_voice: Option<String>,
    #[serde(default = "default_voice_model")]
    pub default_model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ImageConfig {
    /// Falls back to OPENAI_API_KEY when unset. Unlike the story and voice
    /// credentials, this one is only checked once image generation is used.
    pub api_key: Option<String>,
    #[serde(default = "default_image_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_model")]
    pub model: String,
}

fn default_storage() -> String {
    "db/storage".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_voice_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_voice_model() -> String {
    "eleven_multilingual_v1".to_string()
}
fn default_image_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_image_model() -> String {
    "dall-e-3".to_string()
}

impl OpenAiConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

impl VoiceConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("ELEVENLABS_API_KEY").ok())
    }
}

impl ImageConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

const CONFIG_FILE: &str = "config.yml";

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            return Err(Error::Configuration(format!(
                "{} not found. Please create one with your LLM and voice settings.",
                CONFIG_FILE
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::Configuration(format!("failed to parse {}: {}", CONFIG_FILE, e)))
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)
            .map_err(|e| Error::Configuration(format!("failed to serialize config: {}", e)))?;
        fs::write(CONFIG_FILE, content).map_err(|e| Error::io(CONFIG_FILE, e))
    }
}
