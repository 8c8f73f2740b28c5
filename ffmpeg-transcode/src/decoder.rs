use ffmpeg_next::Rational;

use crate::{
    error::{Result, TranscodeError},
    packet::RawPacket,
    session::{Received, SessionState, classify},
    stream::AvStream,
};

pub enum DecodedFrame {
    Video(ffmpeg_next::frame::Video),
    Audio(ffmpeg_next::frame::Audio),
}

enum DecoderType {
    Video(ffmpeg_next::codec::decoder::Video),
    Audio(ffmpeg_next::codec::decoder::Audio),
}

impl DecoderType {
    fn send_packet(&mut self, packet: &ffmpeg_next::codec::packet::Packet) -> Result<(), ffmpeg_next::Error> {
        match self {
            DecoderType::Video(video_decoder) => video_decoder.send_packet(packet),
            DecoderType::Audio(audio_decoder) => audio_decoder.send_packet(packet),
        }
    }

    fn send_eof(&mut self) -> Result<(), ffmpeg_next::Error> {
        match self {
            DecoderType::Video(video_decoder) => video_decoder.send_eof(),
            DecoderType::Audio(audio_decoder) => audio_decoder.send_eof(),
        }
    }

    fn receive_frame(&mut self) -> Result<Received<DecodedFrame>, ffmpeg_next::Error> {
        match self {
            DecoderType::Video(video_decoder) => {
                let mut frame = ffmpeg_next::frame::Video::empty();
                let received = classify(video_decoder.receive_frame(&mut frame))?;
                Ok(match received {
                    Received::Item(()) => Received::Item(DecodedFrame::Video(frame)),
                    Received::NeedsInput => Received::NeedsInput,
                    Received::EndOfStream => Received::EndOfStream,
                })
            }
            DecoderType::Audio(audio_decoder) => {
                let mut frame = ffmpeg_next::frame::Audio::empty();
                let received = classify(audio_decoder.receive_frame(&mut frame))?;
                Ok(match received {
                    Received::Item(()) => Received::Item(DecodedFrame::Audio(frame)),
                    Received::NeedsInput => Received::NeedsInput,
                    Received::EndOfStream => Received::EndOfStream,
                })
            }
        }
    }
}

/// Decoder session for one selected input stream.
///
/// Opened once in [`Decoder::new`], closed when dropped.
pub struct Decoder {
    stream: AvStream,
    inner: DecoderType,
    state: SessionState,
}

impl Decoder {
    pub fn new(stream: &AvStream) -> Result<Self> {
        let codec = ffmpeg_next::decoder::find(stream.codec_id()).ok_or(
            TranscodeError::UnsupportedCodec {
                index: stream.index(),
                medium: stream.medium_name(),
                codec: stream.codec_id(),
            },
        )?;

        let mut decoder_ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        unsafe {
            (*decoder_ctx.as_mut_ptr()).time_base = stream.time_base().into();
            (*decoder_ctx.as_mut_ptr()).pkt_timebase = stream.time_base().into();
        }
        decoder_ctx
            .set_parameters(stream.parameters().clone())
            .map_err(|e| TranscodeError::Probe(format!("stream {}: {}", stream.index(), e)))?;

        let opened = decoder_ctx
            .decoder()
            .open_as(codec)
            .map_err(|e| TranscodeError::decode("open decoder", e))?;

        let inner = if stream.is_video() {
            let video_decoder = opened
                .video()
                .map_err(|e| TranscodeError::decode("open video decoder", e))?;

            if video_decoder.format() == ffmpeg_next::format::Pixel::None
                || video_decoder.width() == 0
                || video_decoder.height() == 0
            {
                return Err(TranscodeError::Probe(format!(
                    "missing codec parameters for video stream {}",
                    stream.index()
                )));
            }
            DecoderType::Video(video_decoder)
        } else if stream.is_audio() {
            let audio_decoder = opened
                .audio()
                .map_err(|e| TranscodeError::decode("open audio decoder", e))?;
            DecoderType::Audio(audio_decoder)
        } else {
            return Err(TranscodeError::UnsupportedCodec {
                index: stream.index(),
                medium: stream.medium_name(),
                codec: stream.codec_id(),
            });
        };

        log::debug!(
            "opened {} decoder {} for stream {}",
            stream.medium_name(),
            codec.name(),
            stream.index()
        );

        Ok(Self {
            stream: stream.clone(),
            inner,
            state: SessionState::NeedsInput,
        })
    }

    pub fn send_packet(&mut self, packet: &RawPacket) -> Result<()> {
        if !self.state.accepts_input() {
            return Err(TranscodeError::Decode(format!(
                "decoder for stream {} no longer accepts packets ({:?})",
                self.stream.index(),
                self.state
            )));
        }
        self.inner
            .send_packet(packet.packet())
            .map_err(|e| TranscodeError::decode("send packet", e))?;
        self.state = SessionState::HasOutput;
        Ok(())
    }

    pub fn send_eof(&mut self) -> Result<()> {
        if !self.state.accepts_input() {
            return Ok(());
        }
        self.inner
            .send_eof()
            .map_err(|e| TranscodeError::decode("send eof", e))?;
        self.state = SessionState::Draining;
        Ok(())
    }

    /// Next decoded frame, or `None` once the decoder wants more input or
    /// has reached end of stream.
    pub fn receive_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if self.state.is_finished() {
            return Ok(None);
        }
        let received = self
            .inner
            .receive_frame()
            .map_err(|e| TranscodeError::decode("receive frame", e))?;
        self.state = self.state.after_receive(&received);
        match received {
            Received::Item(frame) => Ok(Some(frame)),
            Received::NeedsInput | Received::EndOfStream => Ok(None),
        }
    }

    /// Drains every frame currently available.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            decoder: self,
            done: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stream_index(&self) -> usize {
        self.stream.index()
    }

    pub fn time_base(&self) -> Rational {
        self.stream.time_base()
    }

    pub fn width(&self) -> u32 {
        match &self.inner {
            DecoderType::Video(d) => d.width(),
            DecoderType::Audio(_) => 0,
        }
    }

    pub fn height(&self) -> u32 {
        match &self.inner {
            DecoderType::Video(d) => d.height(),
            DecoderType::Audio(_) => 0,
        }
    }

    pub fn pixel_format(&self) -> ffmpeg_next::format::Pixel {
        match &self.inner {
            DecoderType::Video(d) => d.format(),
            DecoderType::Audio(_) => ffmpeg_next::format::Pixel::None,
        }
    }

    pub fn aspect_ratio(&self) -> Rational {
        match &self.inner {
            DecoderType::Video(d) => d.aspect_ratio(),
            DecoderType::Audio(_) => Rational::new(0, 1),
        }
    }
}

/// Lazy, finite view over a decoder's pending output. Stops at the first
/// "needs input" or end of stream, and after the first error.
pub struct Frames<'a> {
    decoder: &'a mut Decoder,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.receive_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
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
