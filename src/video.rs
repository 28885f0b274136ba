use crate::config::ImageConfig;
use crate::error::{Error, Result};
use crate::media::{MediaProbe, ResolutionPreset, VideoEncoder};
use crate::state::{AudioArtifact, VideoArtifact};
use crate::storage::StorageAreas;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ImageApi: Send + Sync {
    /// Generates an image and returns the URL it can be downloaded from.
    async fn generate(&self, prompt: &str, size: &str) -> Result<String>;
}

// --- OpenAI images client ---

pub struct OpenAiImageClient {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: String,
}

impl OpenAiImageClient {
    /// The key stays optional at construction: image generation is an
    /// optional pipeline feature and the missing credential only matters
    /// once it is actually used.
    pub fn from_config(config: &ImageConfig) -> Self {
        Self {
            api_key: config.resolve_api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ImageApi for OpenAiImageClient {
    async fn generate(&self, prompt: &str, size: &str) -> Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            Error::Configuration(
                "no image API key. Set image.api_key in config.yml or OPENAI_API_KEY.".into(),
            )
        })?;

        let url = format!("{}/images/generations", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": size,
            "response_format": "url",
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream("image", e))?;

        if !resp.status().is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            log::error!("image generation failed: {}", error_text);
            return Err(Error::upstream("image", error_text));
        }

        let parsed: ImageResponse = resp.json().await.map_err(|e| Error::upstream("image", e))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.url)
            .ok_or_else(|| Error::upstream("image", "response contained no image"))
    }
}

// --- Video service ---

pub struct VideoService {
    storage: StorageAreas,
    resolution: ResolutionPreset,
    image_api: Box<dyn ImageApi>,
    probe: Box<dyn MediaProbe>,
    encoder: Box<dyn VideoEncoder>,
    http: reqwest::Client,
}

impl VideoService {
    pub fn new(
        storage: StorageAreas,
        resolution: ResolutionPreset,
        image_api: Box<dyn ImageApi>,
        probe: Box<dyn MediaProbe>,
        encoder: Box<dyn VideoEncoder>,
    ) -> Self {
        Self {
            storage,
            resolution,
            image_api,
            probe,
            encoder,
            http: reqwest::Client::new(),
        }
    }

    /// One still image held for the full narration. With no image supplied
    /// the reserved placeholder frame is used.
    pub async fn create_static_video(
        &self,
        audio: &AudioArtifact,
        image: Option<&Path>,
    ) -> Result<VideoArtifact> {
        let image = match image {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Validation(format!(
                        "image not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => self.ensure_placeholder().await?,
        };

        let output = self.storage.video_output_for(&audio.path);
        self.encoder
            .encode_static(&image, &audio.path, self.resolution, &output)
            .await?;
        log::info!("static video written to {}", output.display());
        Ok(VideoArtifact { path: output })
    }

    /// A sequence of stills synced to the narration. Each image is shown for
    /// floor(duration / image count) seconds, in input order.
    pub async fn create_slideshow_video(
        &self,
        images: &[PathBuf],
        audio: &AudioArtifact,
    ) -> Result<VideoArtifact> {
        if images.is_empty() {
            return Err(Error::Validation(
                "upload or generate at least one image for a slideshow".into(),
            ));
        }

        let duration = self.probe.duration_seconds(&audio.path).await?;
        let per_image = per_image_seconds(duration, images.len());

        // Concat entries must be absolute: the demuxer resolves relative
        // paths against the manifest's own directory.
        let mut absolute = Vec::with_capacity(images.len());
        for image in images {
            absolute.push(fs::canonicalize(image).map_err(|e| Error::io(image, e))?);
        }

        let output = self.storage.video_output_for(&audio.path);
        let manifest_path = output.with_extension("ffconcat");
        fs::write(&manifest_path, concat_manifest(&absolute, per_image))
            .map_err(|e| Error::io(&manifest_path, e))?;

        let result = self
            .encoder
            .encode_slideshow(&manifest_path, &audio.path, self.resolution, &output)
            .await;
        let _ = fs::remove_file(&manifest_path);
        result?;

        log::info!(
            "slideshow video written to {} ({} images, {}s each)",
            output.display(),
            images.len(),
            per_image
        );
        Ok(VideoArtifact { path: output })
    }

    /// Asks the image API for a visual and stores it in the generated-image
    /// slot; only the most recent generated image survives.
    pub async fn generate_image(&self, prompt: &str) -> Result<PathBuf> {
        if prompt.trim().is_empty() {
            return Err(Error::Validation("describe the image to generate".into()));
        }

        let size = image_size_for(self.resolution);
        let image_url = self.image_api.generate(prompt.trim(), size).await?;
        let parsed = url::Url::parse(&image_url)
            .map_err(|e| Error::upstream("image", format!("bad image URL {:?}: {}", image_url, e)))?;

        let dest = self.storage.generated_image_slot();
        self.download(parsed.as_str(), &dest).await?;
        log::info!("generated image saved to {}", dest.display());
        Ok(dest)
    }

    /// Subtitle generation has no implementation yet; the subtitles storage
    /// area exists but nothing writes to it.
    pub fn generate_subtitles(&self, _audio: &AudioArtifact) -> Result<PathBuf> {
        Err(Error::NotImplemented("subtitle generation"))
    }

    pub fn import_images(&self, sources: &[PathBuf]) -> Result<Vec<PathBuf>> {
        self.storage.import_images(sources)
    }

    async fn ensure_placeholder(&self) -> Result<PathBuf> {
        let path = self.storage.placeholder_image();
        if !path.exists() {
            log::info!("rendering placeholder frame at {}", path.display());
            self.encoder
                .render_black_frame(self.resolution, &path)
                .await?;
        }
        Ok(path)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::upstream("image", e))?;
        if !resp.status().is_success() {
            return Err(Error::upstream(
                "image",
                format!("download failed with status {}", resp.status()),
            ));
        }

        let mut file = fs::File::create(dest).map_err(|e| Error::io(dest, e))?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::upstream("image", e))?;
            file.write_all(&chunk).map_err(|e| Error::io(dest, e))?;
        }
        Ok(())
    }
}

/// Whole seconds each slideshow image is shown for. Floored, no
/// fractional-second carry-over, but never below one second.
pub fn per_image_seconds(audio_duration: f64, image_count: usize) -> u64 {
    let per = (audio_duration / image_count as f64).floor() as u64;
    per.max(1)
}

/// ffmpeg concat-demuxer manifest. The final image is repeated without a
/// duration per the demuxer's convention.
pub fn concat_manifest(images: &[PathBuf], per_image_secs: u64) -> String {
    let mut out = String::from("ffconcat version 1.0\n");
    for image in images {
        out.push_str(&format!("file '{}'\n", image.display()));
        out.push_str(&format!("duration {}\n", per_image_secs));
    }
    if let Some(last) = images.last() {
        out.push_str(&format!("file '{}'\n", last.display()));
    }
    out
}

fn image_size_for(resolution: ResolutionPreset) -> &'static str {
    match resolution {
        ResolutionPreset::VerticalReel => "1024x1792",
        ResolutionPreset::Landscape => "1792x1024",
        ResolutionPreset::Square => "1024x1024",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum EncoderCall {
        Static { image: PathBuf, output: PathBuf },
        Slideshow { manifest: String, output: PathBuf },
        BlackFrame { output: PathBuf },
    }

    struct MockEncoder {
        calls: Arc<Mutex<Vec<EncoderCall>>>,
    }

    impl MockEncoder {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl VideoEncoder for MockEncoder {
        async fn encode_static(
            &self,
            image: &Path,
            _audio: &Path,
            _resolution: ResolutionPreset,
            output: &Path,
        ) -> Result<()> {
            fs::write(output, b"video").unwrap();
            self.calls.lock().unwrap().push(EncoderCall::Static {
                image: image.to_path_buf(),
                output: output.to_path_buf(),
            });
            Ok(())
        }

        async fn encode_slideshow(
            &self,
            concat_list: &Path,
            _audio: &Path,
            _resolution: ResolutionPreset,
            output: &Path,
        ) -> Result<()> {
            let manifest = fs::read_to_string(concat_list).unwrap();
            fs::write(output, b"video").unwrap();
            self.calls.lock().unwrap().push(EncoderCall::Slideshow {
                manifest,
                output: output.to_path_buf(),
            });
            Ok(())
        }

        async fn render_black_frame(
            &self,
            _resolution: ResolutionPreset,
            output: &Path,
        ) -> Result<()> {
            fs::write(output, b"png").unwrap();
            self.calls.lock().unwrap().push(EncoderCall::BlackFrame {
                output: output.to_path_buf(),
            });
            Ok(())
        }
    }

    struct StubProbe(f64);

    #[async_trait]
    impl MediaProbe for StubProbe {
        async fn duration_seconds(&self, _path: &Path) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct MockImageApi;

    #[async_trait]
    impl ImageApi for MockImageApi {
        async fn generate(&self, _prompt: &str, _size: &str) -> Result<String> {
            Ok("not a url at all".to_string())
        }
    }

    fn service_in(
        dir: &Path,
        audio_secs: f64,
    ) -> (VideoService, Arc<Mutex<Vec<EncoderCall>>>, AudioArtifact) {
        let storage = StorageAreas::new(dir);
        storage.ensure().unwrap();

        let audio_path = storage.audios.join("narration.mp3");
        fs::write(&audio_path, b"mp3").unwrap();
        let audio = AudioArtifact {
            path: audio_path,
            duration_seconds: audio_secs,
        };

        let encoder = MockEncoder::new();
        let calls = encoder.calls.clone();
        let service = VideoService::new(
            storage,
            ResolutionPreset::VerticalReel,
            Box::new(MockImageApi),
            Box::new(StubProbe(audio_secs)),
            Box::new(encoder),
        );
        (service, calls, audio)
    }

    #[test]
    fn per_image_duration_is_floored() {
        assert_eq!(per_image_seconds(10.0, 3), 3);
        assert_eq!(per_image_seconds(9.9, 2), 4);
        assert_eq!(per_image_seconds(30.0, 1), 30);
        // Degenerate short-audio case never produces zero-length frames.
        assert_eq!(per_image_seconds(2.0, 5), 1);
    }

    #[test]
    fn manifest_repeats_the_final_image() {
        let images = vec![PathBuf::from("/a.png"), PathBuf::from("/b.png")];
        let manifest = concat_manifest(&images, 4);
        assert_eq!(
            manifest,
            "ffconcat version 1.0\n\
             file '/a.png'\nduration 4\n\
             file '/b.png'\nduration 4\n\
             file '/b.png'\n"
        );
    }

    #[tokio::test]
    async fn static_video_without_image_uses_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, calls, audio) = service_in(tmp.path(), 12.0);

        let video = service.create_static_video(&audio, None).await.unwrap();
        assert!(video.path.ends_with("videos/narration.mp4"));

        let calls = calls.lock().unwrap();
        assert!(matches!(calls[0], EncoderCall::BlackFrame { .. }));
        match &calls[1] {
            EncoderCall::Static { image, .. } => {
                assert!(image.ends_with("images/black_frame.png"))
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn static_video_with_missing_image_is_a_user_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, _, audio) = service_in(tmp.path(), 12.0);

        let err = service
            .create_static_video(&audio, Some(Path::new("nope.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn slideshow_requires_images() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, _, audio) = service_in(tmp.path(), 12.0);

        let err = service
            .create_slideshow_video(&[], &audio)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn slideshow_divides_audio_across_images() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, calls, audio) = service_in(tmp.path(), 10.0);

        let img_a = tmp.path().join("a.png");
        let img_b = tmp.path().join("b.png");
        let img_c = tmp.path().join("c.png");
        for img in [&img_a, &img_b, &img_c] {
            fs::write(img, b"png").unwrap();
        }

        let video = service
            .create_slideshow_video(&[img_a, img_b, img_c], &audio)
            .await
            .unwrap();
        assert!(video.path.ends_with("videos/narration.mp4"));

        let calls = calls.lock().unwrap();
        match &calls[0] {
            EncoderCall::Slideshow { manifest, .. } => {
                // floor(10 / 3) = 3 seconds per image
                assert_eq!(manifest.matches("duration 3").count(), 3);
                assert_eq!(manifest.matches("file '").count(), 4);
            }
            other => panic!("unexpected call: {:?}", other),
        }

        // The manifest is temporary bookkeeping and must be cleaned up.
        assert!(!video.path.with_extension("ffconcat").exists());
    }

    #[tokio::test]
    async fn bad_image_url_is_an_upstream_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, _, _) = service_in(tmp.path(), 10.0);

        let err = service.generate_image("a castle").await.unwrap_err();
        assert!(matches!(err, Error::Upstream { service: "image", .. }));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, _, _) = service_in(tmp.path(), 10.0);

        let err = service.generate_image("   ").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn subtitles_are_visibly_unimplemented() {
        let tmp = tempfile::tempdir().unwrap();
        let (service, _, audio) = service_in(tmp.path(), 10.0);

        let err = service.generate_subtitles(&audio).unwrap_err();
        assert!(matches!(err, Error::NotImplemented(_)));
    }

    #[test]
    fn image_response_parses() {
        let json = r#"{ "created": 1700000000, "data": [ { "url": "https://img.example/x.png" } ] }"#;
        let parsed: ImageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].url, "https://img.example/x.png");
    }
}
