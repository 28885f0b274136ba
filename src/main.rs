use anyhow::Result;
use indicatif::ProgressBar;
use inquire::{Select, Text};
use std::path::PathBuf;
use std::time::Duration;

use story2clip::config::Config;
use story2clip::error::Error;
use story2clip::llm;
use story2clip::media::{Ffprobe, FfmpegEncoder};
use story2clip::pipeline::Pipeline;
use story2clip::setup;
use story2clip::state::{PipelineState, Stage};
use story2clip::storage::StorageAreas;
use story2clip::story::{AgeGroup, Genre, Language, StoryRequest, StoryService};
use story2clip::video::{OpenAiImageClient, VideoService};
use story2clip::voice::VoiceService;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM and voice settings.");
            return Err(e.into());
        }
    };

    let storage = StorageAreas::new(&config.storage_folder);
    storage.ensure()?;

    let llm_client = llm::create_llm(&config.llm)?;
    let story = StoryService::new(llm_client);
    let voice = VoiceService::from_config(
        &config.voice,
        None,
        Box::new(Ffprobe),
        storage.clone(),
        config.artifact_naming,
    )?;
    let video = VideoService::new(
        storage.clone(),
        config.resolution,
        Box::new(OpenAiImageClient::from_config(&config.image)),
        Box::new(Ffprobe),
        Box::new(FfmpegEncoder),
    );

    setup::run_setup(&mut config, &voice).await?;

    let pipeline = Pipeline::new(story, voice, video, Box::new(Ffprobe), storage);
    let mut state = pipeline.load_or_new_session();

    println!("Welcome to story2clip! Session {}.", state.session_id);
    run_menu(&pipeline, &config, &mut state).await;
    Ok(())
}

const MENU: [&str; 10] = [
    "Generate a story",
    "Use my own story",
    "Synthesize narration",
    "Clone a voice and narrate",
    "Generate an image",
    "Use my own images",
    "Assemble static video",
    "Assemble slideshow video",
    "Show session status",
    "Quit",
];

/// The UI loop. Every pipeline error is displayed and the menu comes back;
/// each stage stays retryable on its own.
async fn run_menu(pipeline: &Pipeline, config: &Config, state: &mut PipelineState) {
    loop {
        let choice = match Select::new("What next?", MENU.to_vec()).prompt() {
            Ok(c) => c,
            Err(_) => break,
        };

        let result = match choice {
            "Generate a story" => generate_story(pipeline, state).await,
            "Use my own story" => use_own_story(pipeline, state),
            "Synthesize narration" => synthesize(pipeline, config, state).await,
            "Clone a voice and narrate" => clone_and_narrate(pipeline, config, state).await,
            "Generate an image" => generate_image(pipeline, state).await,
            "Use my own images" => use_own_images(pipeline, state),
            "Assemble static video" => assemble_static(pipeline, state).await,
            "Assemble slideshow video" => assemble_slideshow(pipeline, state).await,
            "Show session status" => {
                print_status(state);
                Ok(())
            }
            _ => break,
        };

        match result {
            Ok(()) => {
                if let Err(e) = pipeline.save_session(state) {
                    eprintln!("Warning: could not save session: {}", e);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn generate_story(pipeline: &Pipeline, state: &mut PipelineState) -> Result<(), Error> {
    let idea = prompt_text("Story idea or summary (leave empty to pick options instead):")?;

    let request = if idea.trim().is_empty() {
        let genre = pick("Genre:", &Genre::ALL)?;
        let age_group = pick("Age group:", &AgeGroup::ALL)?;
        let language = pick("Language:", &Language::ALL)?;
        let notes = prompt_text("Additional notes (optional):")?;
        StoryRequest {
            idea: None,
            genre: Some(genre),
            age_group: Some(age_group),
            language: Some(language),
            extra_notes: if notes.trim().is_empty() {
                None
            } else {
                Some(notes)
            },
        }
    } else {
        StoryRequest::from_idea(idea)
    };

    let pb = spinner("Generating story...");
    let result = pipeline.generate_story(state.clone(), &request).await;
    pb.finish_and_clear();

    *state = result?;
    println!("\n{}\n", state.story.as_ref().unwrap().text);
    Ok(())
}

fn use_own_story(pipeline: &Pipeline, state: &mut PipelineState) -> Result<(), Error> {
    let text = prompt_text("Paste your story:")?;
    *state = pipeline.supply_story(state.clone(), &text)?;
    println!("Story accepted ({} words).", count_words(&text));
    Ok(())
}

async fn synthesize(
    pipeline: &Pipeline,
    config: &Config,
    state: &mut PipelineState,
) -> Result<(), Error> {
    let voices = {
        let pb = spinner("Fetching voices...");
        let voices = pipeline.list_voices().await;
        pb.finish_and_clear();
        voices?
    };

    let voice_id = if voices.is_empty() {
        config.voice.default_voice.clone().ok_or_else(|| {
            Error::Validation("no voices available and no default voice configured".into())
        })?
    } else {
        setup::select_voice("Narration voice:", &voices)
            .map_err(|e| Error::Validation(e.to_string()))?
    };

    let pb = spinner("Synthesizing narration...");
    let result = pipeline
        .synthesize_narration(state.clone(), &voice_id, &config.voice.default_model)
        .await;
    pb.finish_and_clear();

    *state = result?;
    let audio = state.audio.as_ref().unwrap();
    println!(
        "Narration ready: {} ({:.1}s)",
        audio.path.display(),
        audio.duration_seconds
    );
    Ok(())
}

async fn clone_and_narrate(
    pipeline: &Pipeline,
    config: &Config,
    state: &mut PipelineState,
) -> Result<(), Error> {
    let name = prompt_text("Name for the cloned voice:")?;
    let description = prompt_text("Short description of the voice:")?;
    let samples = prompt_paths("Sample audio files (comma-separated paths):")?;

    let pb = spinner("Cloning voice and synthesizing...");
    let result = pipeline
        .synthesize_cloned_narration(
            state.clone(),
            &name,
            &description,
            &samples,
            &config.voice.default_model,
        )
        .await;
    pb.finish_and_clear();

    *state = result?;
    let audio = state.audio.as_ref().unwrap();
    println!(
        "Cloned narration ready: {} ({:.1}s)",
        audio.path.display(),
        audio.duration_seconds
    );
    Ok(())
}

async fn generate_image(pipeline: &Pipeline, state: &mut PipelineState) -> Result<(), Error> {
    let prompt = prompt_text("Describe the image:")?;

    let pb = spinner("Generating image...");
    let result = pipeline.generate_image(state.clone(), &prompt).await;
    pb.finish_and_clear();

    *state = result?;
    println!("Image saved: {}", state.images[0].display());
    Ok(())
}

fn use_own_images(pipeline: &Pipeline, state: &mut PipelineState) -> Result<(), Error> {
    let sources = prompt_paths("Image files (comma-separated paths):")?;
    *state = pipeline.import_images(state.clone(), &sources)?;
    println!("Imported {} image(s).", state.images.len());
    Ok(())
}

async fn assemble_static(pipeline: &Pipeline, state: &mut PipelineState) -> Result<(), Error> {
    let image = state.images.first().cloned();

    let pb = spinner("Assembling video...");
    let result = pipeline
        .assemble_static_video(state.clone(), image.as_deref())
        .await;
    pb.finish_and_clear();

    *state = result?;
    println!(
        "Video ready: {}",
        state.video.as_ref().unwrap().path.display()
    );
    Ok(())
}

async fn assemble_slideshow(pipeline: &Pipeline, state: &mut PipelineState) -> Result<(), Error> {
    let pb = spinner("Assembling slideshow...");
    let result = pipeline.assemble_slideshow(state.clone()).await;
    pb.finish_and_clear();

    *state = result?;
    println!(
        "Slideshow ready: {}",
        state.video.as_ref().unwrap().path.display()
    );
    Ok(())
}

fn print_status(state: &PipelineState) {
    println!("Session {}", state.session_id);
    println!(
        "  Stage: {}",
        match state.stage() {
            Stage::Idle => "idle",
            Stage::StoryReady => "story ready",
            Stage::AudioReady => "narration ready",
            Stage::VideoReady => "video ready",
        }
    );
    if let Some(story) = &state.story {
        println!("  Story: {} words", count_words(&story.text));
    }
    if let Some(audio) = &state.audio {
        let marker = if state.audio_stale { " (stale)" } else { "" };
        println!(
            "  Narration: {} ({:.1}s){}",
            audio.path.display(),
            audio.duration_seconds,
            marker
        );
    }
    if !state.images.is_empty() {
        println!("  Images: {}", state.images.len());
    }
    if let Some(video) = &state.video {
        let marker = if state.video_stale { " (stale)" } else { "" };
        println!("  Video: {}{}", video.path.display(), marker);
    }
}

fn prompt_text(message: &str) -> Result<String, Error> {
    Text::new(message)
        .prompt()
        .map_err(|e| Error::Validation(e.to_string()))
}

fn prompt_paths(message: &str) -> Result<Vec<PathBuf>, Error> {
    let raw = prompt_text(message)?;
    let paths: Vec<PathBuf> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect();
    if paths.is_empty() {
        return Err(Error::Validation("no file paths given".into()));
    }
    Ok(paths)
}

fn pick<T: Copy + std::fmt::Display>(message: &str, options: &[T]) -> Result<T, Error> {
    let labels: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    let chosen = Select::new(message, labels)
        .prompt()
        .map_err(|e| Error::Validation(e.to_string()))?;
    options
        .iter()
        .copied()
        .find(|o| o.to_string() == chosen)
        .ok_or_else(|| Error::Validation("invalid selection".into()))
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
