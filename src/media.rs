use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Output resolutions callers can pick by name. Images are resized to the
/// exact preset dimensions, aspect ratio ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPreset {
    #[default]
    VerticalReel,
    Landscape,
    Square,
}

impl ResolutionPreset {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionPreset::VerticalReel => (1080, 1920),
            ResolutionPreset::Landscape => (1920, 1080),
            ResolutionPreset::Square => (1080, 1080),
        }
    }

    fn scale_filter(self) -> String {
        let (w, h) = self.dimensions();
        format!("scale={}:{}", w, h)
    }

    fn size_arg(self) -> String {
        let (w, h) = self.dimensions();
        format!("{}x{}", w, h)
    }
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn duration_seconds(&self, path: &Path) -> Result<f64>;
}

#[async_trait]
pub trait VideoEncoder: Send + Sync {
    async fn encode_static(
        &self,
        image: &Path,
        audio: &Path,
        resolution: ResolutionPreset,
        output: &Path,
    ) -> Result<()>;

    /// `concat_list` is an ffmpeg concat-demuxer manifest listing the images
    /// and their display durations.
    async fn encode_slideshow(
        &self,
        concat_list: &Path,
        audio: &Path,
        resolution: ResolutionPreset,
        output: &Path,
    ) -> Result<()>;

    async fn render_black_frame(&self, resolution: ResolutionPreset, output: &Path) -> Result<()>;
}

// --- Argument builders ---
//
// Kept as plain functions returning the argv so they can be tested without
// spawning ffmpeg.

pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.to_string_lossy().into_owned(),
    ]
}

pub fn static_video_args(
    image: &Path,
    audio: &Path,
    resolution: ResolutionPreset,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.to_string_lossy().into_owned(),
        "-i".into(),
        audio.to_string_lossy().into_owned(),
        "-vf".into(),
        resolution.scale_filter(),
        "-c:v".into(),
        "libx264".into(),
        "-tune".into(),
        "stillimage".into(),
        "-r".into(),
        "24".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        output.to_string_lossy().into_owned(),
    ]
}

pub fn slideshow_args(
    concat_list: &Path,
    audio: &Path,
    resolution: ResolutionPreset,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        concat_list.to_string_lossy().into_owned(),
        "-i".into(),
        audio.to_string_lossy().into_owned(),
        "-vf".into(),
        resolution.scale_filter(),
        "-c:v".into(),
        "libx264".into(),
        "-r".into(),
        "30".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        output.to_string_lossy().into_owned(),
    ]
}

pub fn black_frame_args(resolution: ResolutionPreset, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!("color=c=black:s={}:d=1", resolution.size_arg()),
        "-frames:v".into(),
        "1".into(),
        output.to_string_lossy().into_owned(),
    ]
}

pub fn parse_probe_output(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| Error::upstream("ffprobe", format!("unparseable duration: {:?}", raw.trim())))
}

async fn run_tool(tool: &'static str, args: &[String]) -> Result<String> {
    log::debug!("{} {}", tool, args.join(" "));
    let out = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::upstream(tool, format!("failed to run: {}", e)))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        let tail: String = stderr.lines().rev().take(4).collect::<Vec<_>>().join(" | ");
        log::error!("{} failed: {}", tool, tail);
        return Err(Error::upstream(tool, tail));
    }

    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Probes media durations with ffprobe.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ffprobe;

#[async_trait]
impl MediaProbe for Ffprobe {
    async fn duration_seconds(&self, path: &Path) -> Result<f64> {
        let raw = run_tool("ffprobe", &probe_args(path)).await?;
        parse_probe_output(&raw)
    }
}

/// Encodes videos by shelling out to ffmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegEncoder;

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode_static(
        &self,
        image: &Path,
        audio: &Path,
        resolution: ResolutionPreset,
        output: &Path,
    ) -> Result<()> {
        run_tool("ffmpeg", &static_video_args(image, audio, resolution, output)).await?;
        Ok(())
    }

    async fn encode_slideshow(
        &self,
        concat_list: &Path,
        audio: &Path,
        resolution: ResolutionPreset,
        output: &Path,
    ) -> Result<()> {
        run_tool(
            "ffmpeg",
            &slideshow_args(concat_list, audio, resolution, output),
        )
        .await?;
        Ok(())
    }

    async fn render_black_frame(&self, resolution: ResolutionPreset, output: &Path) -> Result<()> {
        run_tool("ffmpeg", &black_frame_args(resolution, output)).await?;
        Ok(())
    }
}
