use ffmpeg_next::{Dictionary, Rational, codec::Parameters};

use crate::{
    config::TranscodeConfig,
    error::{Result, TranscodeError},
    packet::RawPacket,
    session::{Received, SessionState, classify},
    stream::AvStream,
};

pub enum EncoderType {
    Video(ffmpeg_next::codec::encoder::Video),
    Audio(ffmpeg_next::codec::encoder::Audio),
}

impl EncoderType {
    fn send_eof(&mut self) -> Result<(), ffmpeg_next::Error> {
        match self {
            EncoderType::Video(encoder) => encoder.send_eof(),
            EncoderType::Audio(encoder) => encoder.send_eof(),
        }
    }

    fn receive_packet(
        &mut self,
    ) -> Result<Received<ffmpeg_next::codec::packet::Packet>, ffmpeg_next::Error> {
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        let encode_result = match self {
            EncoderType::Video(encoder) => encoder.receive_packet(&mut packet),
            EncoderType::Audio(encoder) => encoder.receive_packet(&mut packet),
        };
        Ok(match classify(encode_result)? {
            Received::Item(()) => Received::Item(packet),
            Received::NeedsInput => Received::NeedsInput,
            Received::EndOfStream => Received::EndOfStream,
        })
    }

    fn parameters(&self) -> Parameters {
        match self {
            EncoderType::Video(encoder) => Parameters::from(encoder),
            EncoderType::Audio(encoder) => Parameters::from(encoder),
        }
    }
}

/// Output geometry chosen for the video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: Rational,
}

/// Encoder session for one output stream.
pub struct Encoder {
    codec_id: ffmpeg_next::codec::Id,
    name: String,
    inner: EncoderType,
    encoder_time_base: Rational,
    state: SessionState,
    frames_in: u64,
}

impl Encoder {
    /// Opens the configured video encoder (libx264 by default) for frames
    /// coming from `input`, producing `geometry` sized output.
    pub fn video(
        input: &AvStream,
        geometry: VideoGeometry,
        config: &TranscodeConfig,
        global_header: bool,
    ) -> Result<Self> {
        let codec = ffmpeg_next::encoder::find_by_name(&config.video_codec)
            .ok_or_else(|| TranscodeError::EncoderUnavailable(config.video_codec.clone()))?;

        let mut encoder = ffmpeg_next::codec::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| {
                TranscodeError::EncoderUnavailable(format!("{}: {}", config.video_codec, e))
            })?;
        encoder.set_width(geometry.width);
        encoder.set_height(geometry.height);
        encoder.set_aspect_ratio(geometry.aspect_ratio);
        encoder.set_format(config.pixel_format);
        encoder.set_time_base(input.time_base());
        if input.rate().numerator() > 0 && input.rate().denominator() > 0 {
            encoder.set_frame_rate(Some(input.rate()));
        }
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open_with(config.video_options()).map_err(|e| {
            TranscodeError::EncoderUnavailable(format!("open {}: {}", config.video_codec, e))
        })?;
        let encoder_time_base: Rational = unsafe { (*encoder.0.as_ptr()).time_base.into() };

        log::info!(
            "video encoder {} opened: {}x{}, crf {}, preset {}, threads {}",
            config.video_codec,
            geometry.width,
            geometry.height,
            config.crf,
            config.preset,
            config.encoder_threads
        );

        Ok(Self {
            codec_id: codec.id(),
            name: config.video_codec.clone(),
            inner: EncoderType::Video(encoder),
            encoder_time_base,
            state: SessionState::NeedsInput,
            frames_in: 0,
        })
    }

    /// Opens an AAC encoder mirroring the sample rate and channel layout of
    /// `input`.
    pub fn audio(input: &AvStream, config: &TranscodeConfig, global_header: bool) -> Result<Self> {
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::AAC)
            .ok_or_else(|| TranscodeError::EncoderUnavailable("aac".to_string()))?;

        let sample_rate = input.sample_rate() as i32;
        if sample_rate <= 0 {
            return Err(TranscodeError::Probe(format!(
                "audio stream {} has no sample rate",
                input.index()
            )));
        }

        let mut encoder = ffmpeg_next::codec::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(|e| TranscodeError::EncoderUnavailable(format!("aac: {}", e)))?;

        let sample_format = codec
            .audio()
            .ok()
            .and_then(|audio| audio.formats())
            .and_then(|mut formats| formats.next())
            .unwrap_or(ffmpeg_next::format::Sample::F32(
                ffmpeg_next::format::sample::Type::Planar,
            ));
        encoder.set_format(sample_format);
        encoder.set_bit_rate(config.audio_bitrate);
        encoder.set_rate(sample_rate);
        encoder.set_time_base(Rational::new(1, sample_rate));
        unsafe {
            let ret = ffmpeg_next::ffi::av_channel_layout_copy(
                &mut (*encoder.as_mut_ptr()).ch_layout,
                &(*input.raw()).ch_layout,
            );
            if ret < 0 {
                return Err(TranscodeError::EncoderUnavailable(format!(
                    "aac: copy channel layout: {}",
                    ffmpeg_next::Error::from(ret)
                )));
            }
        }
        if global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder
            .open_with(Dictionary::new())
            .map_err(|e| TranscodeError::EncoderUnavailable(format!("open aac: {}", e)))?;
        let encoder_time_base: Rational = unsafe { (*encoder.0.as_ptr()).time_base.into() };

        log::info!(
            "audio encoder aac opened: {} Hz, {} channels, {} bps",
            sample_rate,
            input.channels(),
            config.audio_bitrate
        );

        Ok(Self {
            codec_id: codec.id(),
            name: "aac".to_string(),
            inner: EncoderType::Audio(encoder),
            encoder_time_base,
            state: SessionState::NeedsInput,
            frames_in: 0,
        })
    }

    pub fn send_frame(&mut self, frame: &ffmpeg_next::frame::Video) -> Result<()> {
        if !self.state.accepts_input() {
            return Err(TranscodeError::Encode(format!(
                "{} no longer accepts frames ({:?})",
                self.name, self.state
            )));
        }
        match &mut self.inner {
            EncoderType::Video(encoder) => encoder
                .send_frame(frame)
                .map_err(|e| TranscodeError::encode("send frame", e))?,
            EncoderType::Audio(_) => {
                return Err(TranscodeError::Encode(format!(
                    "{} cannot take video frames",
                    self.name
                )));
            }
        }
        self.state = SessionState::HasOutput;
        self.frames_in += 1;
        Ok(())
    }

    pub fn send_eof(&mut self) -> Result<()> {
        if !self.state.accepts_input() {
            return Ok(());
        }
        self.inner
            .send_eof()
            .map_err(|e| TranscodeError::encode("send eof", e))?;
        self.state = SessionState::Draining;
        Ok(())
    }

    /// Next encoded packet in the encoder time base, or `None` once the
    /// encoder wants more input or has reached end of stream.
    pub fn receive_packet(&mut self) -> Result<Option<RawPacket>> {
        if self.state.is_finished() {
            return Ok(None);
        }
        let received = self
            .inner
            .receive_packet()
            .map_err(|e| TranscodeError::encode("receive packet", e))?;
        self.state = self.state.after_receive(&received);
        match received {
            Received::Item(packet) => Ok(Some(RawPacket::from((packet, self.encoder_time_base)))),
            Received::NeedsInput | Received::EndOfStream => Ok(None),
        }
    }

    /// Drains every packet currently available.
    pub fn packets(&mut self) -> Packets<'_> {
        Packets {
            encoder: self,
            done: false,
        }
    }

    /// Codec parameters of the opened encoder, for the output stream.
    pub fn parameters(&self) -> Parameters {
        self.inner.parameters()
    }

    pub fn codec_id(&self) -> ffmpeg_next::codec::Id {
        self.codec_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time_base(&self) -> Rational {
        self.encoder_time_base
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames_in(&self) -> u64 {
        self.frames_in
    }

    pub fn width(&self) -> u32 {
        match &self.inner {
            EncoderType::Video(e) => e.width(),
            EncoderType::Audio(_) => 0,
        }
    }

    pub fn height(&self) -> u32 {
        match &self.inner {
            EncoderType::Video(e) => e.height(),
            EncoderType::Audio(_) => 0,
        }
    }

    pub fn pixel_format(&self) -> ffmpeg_next::format::Pixel {
        match &self.inner {
            EncoderType::Video(e) => e.format(),
            EncoderType::Audio(_) => ffmpeg_next::format::Pixel::None,
        }
    }
}

/// Lazy, finite view over an encoder's pending packets.
pub struct Packets<'a> {
    encoder: &'a mut Encoder,
    done: bool,
}

impl Iterator for Packets<'_> {
    type Item = Result<RawPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.encoder.receive_packet() {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_stream(width: i32, height: i32) -> AvStream {
        let mut parameters = Parameters::new();
        unsafe {
            let ptr = parameters.as_mut_ptr();
            (*ptr).codec_type = ffmpeg_next::media::Type::Video.into();
            (*ptr).codec_id = ffmpeg_next::codec::Id::H264.into();
            (*ptr).width = width;
            (*ptr).height = height;
        }
        AvStream::new(0, parameters, Rational::new(1, 25), Rational::new(25, 1))
    }

    fn geometry(width: u32, height: u32) -> VideoGeometry {
        VideoGeometry {
            width,
            height,
            aspect_ratio: Rational::new(1, 1),
        }
    }

    #[test]
    fn unknown_video_codec_is_unavailable() {
        crate::init().unwrap();
        let config = TranscodeConfig::default().with_video_codec("no-such-encoder");
        match Encoder::video(&video_stream(64, 48), geometry(64, 48), &config, false) {
            Err(err) => assert_eq!(err.kind(), crate::error::ErrorKind::EncoderUnavailable),
            Ok(_) => panic!("bogus encoder opened"),
        }
    }

    #[test]
    fn flushing_an_idle_encoder_finishes_cleanly() -> anyhow::Result<()> {
        crate::init()?;
        // mpeg4 ships with every libavcodec build, so this runs everywhere
        let config = TranscodeConfig::default()
            .with_video_codec("mpeg4")
            .with_preset("")
            .with_tune("");
        let mut encoder = Encoder::video(&video_stream(64, 48), geometry(64, 48), &config, false)?;
        assert_eq!((encoder.width(), encoder.height()), (64, 48));
        assert_eq!(encoder.state(), SessionState::NeedsInput);

        encoder.send_eof()?;
        assert_eq!(encoder.packets().count(), 0);
        assert!(encoder.state().is_finished());
        assert!(encoder.send_frame(&ffmpeg_next::frame::Video::empty()).is_err());
        Ok(())
    }

    #[test]
    fn every_frame_comes_back_as_a_packet_after_flush() -> anyhow::Result<()> {
        crate::init()?;
        let config = TranscodeConfig::default()
            .with_video_codec("mpeg4")
            .with_preset("")
            .with_tune("");
        let mut encoder = Encoder::video(&video_stream(64, 48), geometry(64, 48), &config, false)?;

        let mut packets = 0;
        for i in 0..5 {
            let mut frame = ffmpeg_next::frame::Video::new(ffmpeg_next::format::Pixel::YUV420P, 64, 48);
            for plane in 0..3 {
                frame.data_mut(plane).fill(16 + i as u8);
            }
            frame.set_pts(Some(i));
            encoder.send_frame(&frame)?;
            for packet in encoder.packets() {
                packet?;
                packets += 1;
            }
        }
        encoder.send_eof()?;
        let time_base = encoder.time_base();
        for packet in encoder.packets() {
            let packet = packet?;
            assert_eq!(packet.time_base(), time_base);
            packets += 1;
        }
        assert_eq!(packets, 5);
        assert_eq!(encoder.frames_in(), 5);
        Ok(())
    }
}
