use ffmpeg_next::{Rational, codec::Parameters, format::stream};

/// Negotiated description of one input stream. Never changes after probing.
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub(crate) fn new(
        index: usize,
        parameters: Parameters,
        time_base: Rational,
        rate: Rational,
    ) -> Self {
        Self {
            index,
            parameters,
            time_base,
            rate,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        self.parameters.id()
    }

    pub fn is_video(&self) -> bool {
        self.parameters.medium() == ffmpeg_next::media::Type::Video
    }

    pub fn is_audio(&self) -> bool {
        self.parameters.medium() == ffmpeg_next::media::Type::Audio
    }

    pub fn medium_name(&self) -> &'static str {
        match self.parameters.medium() {
            ffmpeg_next::media::Type::Video => "video",
            ffmpeg_next::media::Type::Audio => "audio",
            ffmpeg_next::media::Type::Subtitle => "subtitle",
            ffmpeg_next::media::Type::Data => "data",
            ffmpeg_next::media::Type::Attachment => "attachment",
            ffmpeg_next::media::Type::Unknown => "unknown",
        }
    }

    pub fn width(&self) -> u32 {
        unsafe { (*self.raw()).width.max(0) as u32 }
    }

    pub fn height(&self) -> u32 {
        unsafe { (*self.raw()).height.max(0) as u32 }
    }

    pub fn sample_rate(&self) -> u32 {
        unsafe { (*self.raw()).sample_rate.max(0) as u32 }
    }

    pub fn channels(&self) -> u32 {
        unsafe { (*self.raw()).ch_layout.nb_channels.max(0) as u32 }
    }

    /// Raw codec parameters, for fields ffmpeg-next does not expose.
    pub(crate) fn raw(&self) -> *const ffmpeg_next::ffi::AVCodecParameters {
        self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate: stream.avg_frame_rate(),
        }
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
        }
    }
}

impl std::fmt::Debug for AvStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvStream")
            .field("index", &self.index)
            .field("medium", &self.medium_name())
            .field("codec", &self.codec_id())
            .field("time_base", &self.time_base)
            .field("rate", &self.rate)
            .finish()
    }
}
