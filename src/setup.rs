use crate::config::Config;
use crate::voice::VoiceInfo;
use crate::voice::VoiceService;
use anyhow::{anyhow, Result};
use inquire::Select;

/// First-run setup: make sure a default narration voice is picked and saved
/// back to the config so later runs skip the prompt.
pub async fn run_setup(config: &mut Config, voice: &VoiceService) -> Result<()> {
    if config.voice.default_voice.is_some() {
        return Ok(());
    }

    println!("Fetching available voices...");
    let voices = voice.list_voices().await?;
    if voices.is_empty() {
        return Err(anyhow!(
            "no voices available. Check your voice API key and connection."
        ));
    }

    let selected = select_voice("Select the default narration voice:", &voices)?;
    config.voice.default_voice = Some(selected);
    config.save()?;
    println!("Configuration saved.");
    Ok(())
}

pub fn select_voice(prompt: &str, voices: &[VoiceInfo]) -> Result<String> {
    let options: Vec<String> = voices
        .iter()
        .map(|v| {
            format!(
                "{}  {}{}",
                v.voice_id,
                v.name,
                v.category
                    .as_deref()
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default()
            )
        })
        .collect();

    let selection = Select::new(prompt, options).prompt()?;
    let voice_id = selection
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("empty voice selection"))?
        .to_string();
    Ok(voice_id)
}
