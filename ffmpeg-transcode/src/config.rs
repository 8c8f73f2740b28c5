use ffmpeg_next::format::Pixel;

pub const TARGET_WIDTH_ENV: &str = "VIDSHRINK_TARGET_WIDTH";
pub const TARGET_HEIGHT_ENV: &str = "VIDSHRINK_TARGET_HEIGHT";

/// Immutable settings for a [`Transcoder`](crate::pipeline::Transcoder).
///
/// Everything that used to be baked into the encoder setup lives here so one
/// processor can be configured once and reused across runs.
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    pub target_width: u32,
    pub target_height: u32,
    // constant rate factor handed to the video encoder
    pub crf: u32,
    // bps
    pub audio_bitrate: usize,
    pub encoder_threads: usize,
    // "libx264"
    pub video_codec: String,
    // "ultrafast", "medium", etc.
    pub preset: String,
    // "zerolatency", "film", etc.
    pub tune: String,
    pub pixel_format: Pixel,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            target_width: 1920,
            target_height: 1080,
            crf: 38,
            audio_bitrate: 96_000,
            encoder_threads: 4,
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            tune: "zerolatency".to_string(),
            pixel_format: Pixel::YUV420P,
        }
    }
}

impl TranscodeConfig {
    pub fn with_target(mut self, width: u32, height: u32) -> Self {
        self.target_width = width;
        self.target_height = height;
        self
    }

    pub fn with_crf(mut self, crf: u32) -> Self {
        self.crf = crf;
        self
    }

    pub fn with_encoder_threads(mut self, threads: usize) -> Self {
        self.encoder_threads = threads;
        self
    }

    pub fn with_video_codec(mut self, codec: &str) -> Self {
        self.video_codec = codec.to_string();
        self
    }

    pub fn with_preset(mut self, preset: &str) -> Self {
        self.preset = preset.to_string();
        self
    }

    pub fn with_tune(mut self, tune: &str) -> Self {
        self.tune = tune.to_string();
        self
    }

    /// Applies `VIDSHRINK_TARGET_WIDTH` / `VIDSHRINK_TARGET_HEIGHT` when set
    /// to a positive integer.
    pub fn with_env_target(self) -> Self {
        let width = parse_dimension(std::env::var(TARGET_WIDTH_ENV).ok(), self.target_width);
        let height = parse_dimension(std::env::var(TARGET_HEIGHT_ENV).ok(), self.target_height);
        self.with_target(width, height)
    }

    /// Options passed to the video encoder when it is opened.
    pub fn video_options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut opts = ffmpeg_next::Dictionary::new();
        if !self.preset.is_empty() {
            opts.set("preset", &self.preset);
        }
        if !self.tune.is_empty() {
            opts.set("tune", &self.tune);
        }
        opts.set("crf", &self.crf.to_string());
        opts.set("threads", &self.encoder_threads.to_string());
        opts
    }
}

fn parse_dimension(value: Option<String>, fallback: u32) -> u32 {
    match value.as_deref().map(str::trim).map(str::parse::<u32>) {
        Some(Ok(v)) if v > 0 => v,
        Some(_) => {
            log::warn!("ignoring invalid target dimension {:?}", value);
            fallback
        }
        None => fallback,
    }
}
