//! The transcode pipeline: negotiate input and output, pump packets through
//! decode/scale/encode (video) or copy (audio), flush, write the trailer.
//!
//! Every native resource of a run lives in one [`PipelineRun`] and is
//! released by [`PipelineRun::teardown`] in reverse acquisition order, on
//! success, on failure, and again (as a no-op) when the run is dropped.

use std::path::Path;

use serde::Serialize;

use crate::{
    config::TranscodeConfig,
    decoder::{DecodedFrame, Decoder},
    dimension,
    encoder::{Encoder, VideoGeometry},
    error::{ErrorKind, Result, TranscodeError},
    input::AvInput,
    output::AvOutput,
    packet::RawPacket,
    scaler::FrameScaler,
};

/// Output stream index of the video track.
pub const VIDEO_OUTPUT_INDEX: usize = 0;
/// Output stream index of the audio track, when there is one.
pub const AUDIO_OUTPUT_INDEX: usize = 1;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscodeStats {
    pub packets_read: u64,
    pub packets_skipped: u64,
    pub video_frames_decoded: u64,
    pub video_frames_encoded: u64,
    pub video_packets_written: u64,
    pub audio_packets_copied: u64,
    pub output_width: u32,
    pub output_height: u32,
    pub scaled: bool,
}

/// What a caller gets back from [`Transcoder::process`].
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeOutcome {
    pub success: bool,
    pub message: String,
    pub stats: Option<TranscodeStats>,
    pub error_kind: Option<ErrorKind>,
}

/// Reusable transcoder. Holds only configuration; all per-run state lives
/// in a [`PipelineRun`] created by each call.
pub struct Transcoder {
    config: TranscodeConfig,
}

impl Transcoder {
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    /// Transcodes `input` into `output`. On error the output file may exist
    /// but is incomplete.
    pub fn run(&mut self, input: &Path, output: &Path) -> Result<TranscodeStats> {
        let mut run = PipelineRun::new(&self.config);
        let result = run.execute(input, output);
        let released = run.teardown();
        log::debug!("released {} pipeline resources", released);
        result
    }

    /// Like [`Transcoder::run`], folded into a success flag and a message.
    pub fn process(&mut self, input: &Path, output: &Path) -> TranscodeOutcome {
        match self.run(input, output) {
            Ok(stats) => TranscodeOutcome {
                success: true,
                message: "Video processed successfully".to_string(),
                stats: Some(stats),
                error_kind: None,
            },
            Err(err) => TranscodeOutcome {
                success: false,
                message: format!("Error processing video: {}", err),
                stats: None,
                error_kind: Some(err.kind()),
            },
        }
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(TranscodeConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Negotiating,
    Processing,
    Flushing,
    Trailer,
    Done,
    Failed,
}

/// Everything one transcode owns.
pub struct PipelineRun<'a> {
    config: &'a TranscodeConfig,
    state: RunState,
    stats: TranscodeStats,

    // acquisition order; teardown walks it backwards
    input: Option<AvInput>,
    video_decoder: Option<Decoder>,
    audio_decoder: Option<Decoder>,
    output: Option<AvOutput>,
    video_encoder: Option<Encoder>,
    audio_encoder: Option<Encoder>,
    scaler: Option<FrameScaler>,

    video_input: usize,
    audio_input: Option<usize>,
    audio_output: Option<usize>,
}

impl<'a> PipelineRun<'a> {
    pub fn new(config: &'a TranscodeConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
            stats: TranscodeStats::default(),
            input: None,
            video_decoder: None,
            audio_decoder: None,
            output: None,
            video_encoder: None,
            audio_encoder: None,
            scaler: None,
            video_input: 0,
            audio_input: None,
            audio_output: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &TranscodeStats {
        &self.stats
    }

    pub fn execute(&mut self, input: &Path, output: &Path) -> Result<TranscodeStats> {
        match self.drive(input, output) {
            Ok(()) => {
                self.state = RunState::Done;
                log::info!(
                    "transcoded {} -> {}: {} video frames, {} audio packets",
                    input.display(),
                    output.display(),
                    self.stats.video_frames_encoded,
                    self.stats.audio_packets_copied
                );
                Ok(self.stats.clone())
            }
            Err(err) => {
                log::error!(
                    "transcode {} failed while {:?}: {}",
                    input.display(),
                    self.state,
                    err
                );
                self.state = RunState::Failed;
                Err(err)
            }
        }
    }

    fn drive(&mut self, input: &Path, output: &Path) -> Result<()> {
        self.state = RunState::Negotiating;
        self.negotiate_input(input)?;
        self.negotiate_output(output)?;

        self.state = RunState::Processing;
        self.process_packets()?;

        self.state = RunState::Flushing;
        self.flush()?;

        self.state = RunState::Trailer;
        match self.output.as_mut() {
            Some(output) => output.finish(),
            None => Ok(()),
        }
    }

    fn negotiate_input(&mut self, path: &Path) -> Result<()> {
        let input = self.input.insert(AvInput::open(path)?);
        self.video_input = input.video_stream().index();
        self.audio_input = input.audio_stream().map(|s| s.index());

        let (video, audio) = input.open_decoders()?;
        log::info!(
            "video decoder: {}x{} {:?}",
            video.width(),
            video.height(),
            video.pixel_format()
        );
        self.video_decoder = Some(video);
        self.audio_decoder = audio;
        Ok(())
    }

    fn negotiate_output(&mut self, path: &Path) -> Result<()> {
        let (Some(input), Some(decoder)) = (self.input.as_ref(), self.video_decoder.as_ref())
        else {
            return Err(TranscodeError::Probe("input was not negotiated".to_string()));
        };
        let config = self.config;

        let (width, height) = dimension::fit(
            decoder.width(),
            decoder.height(),
            config.target_width,
            config.target_height,
        );
        let output = self.output.insert(AvOutput::create(path)?);
        let global_header = output.requires_global_header();

        let geometry = VideoGeometry {
            width,
            height,
            aspect_ratio: decoder.aspect_ratio(),
        };
        let video_encoder = self.video_encoder.insert(Encoder::video(
            input.video_stream(),
            geometry,
            config,
            global_header,
        )?);
        let video_index = output.add_stream(video_encoder)?;
        debug_assert_eq!(video_index, VIDEO_OUTPUT_INDEX);

        if let Some(audio_stream) = input.audio_stream() {
            self.audio_encoder = Some(Encoder::audio(audio_stream, config, global_header)?);
            // the payload is copied, so the stream is described by the source
            let audio_index = output.add_stream_copy(audio_stream)?;
            debug_assert_eq!(audio_index, AUDIO_OUTPUT_INDEX);
            self.audio_output = Some(audio_index);
        }

        output.write_header()?;

        if FrameScaler::required(
            decoder.pixel_format(),
            decoder.width(),
            decoder.height(),
            video_encoder.pixel_format(),
            width,
            height,
        ) {
            self.scaler = Some(FrameScaler::new(
                decoder.pixel_format(),
                decoder.width(),
                decoder.height(),
                video_encoder.pixel_format(),
                width,
                height,
            )?);
        }

        self.stats.output_width = width;
        self.stats.output_height = height;
        self.stats.scaled = self.scaler.is_some();
        log::info!(
            "output {}: {}x{} -> {}x{}{}",
            path.display(),
            decoder.width(),
            decoder.height(),
            width,
            height,
            if self.audio_output.is_some() {
                ", audio copied"
            } else {
                ""
            }
        );
        Ok(())
    }

    fn process_packets(&mut self) -> Result<()> {
        loop {
            let Some(input) = self.input.as_mut() else {
                return Ok(());
            };
            let Some(packet) = input.read_packet()? else {
                return Ok(());
            };
            self.stats.packets_read += 1;

            let index = packet.index();
            if index == self.video_input {
                self.stages()?.video_packet(&packet)?;
            } else if Some(index) == self.audio_input {
                self.copy_audio(packet)?;
            } else {
                self.stats.packets_skipped += 1;
            }
        }
    }

    fn copy_audio(&mut self, packet: RawPacket) -> Result<()> {
        let (Some(output), Some(index)) = (self.output.as_mut(), self.audio_output) else {
            self.stats.packets_skipped += 1;
            return Ok(());
        };
        output.write_packet(index, packet)?;
        self.stats.audio_packets_copied += 1;
        Ok(())
    }

    /// Drains the decoder, then the encoder, writing everything that comes
    /// out.
    fn flush(&mut self) -> Result<()> {
        let mut stages = self.stages()?;
        stages.decoder.send_eof()?;
        stages.drain_decoder()?;
        stages.encoder.send_eof()?;
        stages.write_encoded()?;
        log::debug!(
            "flushed: decoder {:?}, encoder {:?}",
            stages.decoder.state(),
            stages.encoder.state()
        );
        Ok(())
    }

    fn stages(&mut self) -> Result<Stages<'_>> {
        match (
            self.video_decoder.as_mut(),
            self.video_encoder.as_mut(),
            self.output.as_mut(),
        ) {
            (Some(decoder), Some(encoder), Some(output)) => Ok(Stages {
                decoder,
                scaler: self.scaler.as_mut(),
                encoder,
                output,
                stats: &mut self.stats,
            }),
            _ => Err(TranscodeError::Encode(
                "video stages were not negotiated".to_string(),
            )),
        }
    }

    /// Releases every resource still held, newest first. Returns how many
    /// were released; a second call returns 0.
    pub fn teardown(&mut self) -> usize {
        let released = release(&mut self.scaler)
            + release(&mut self.audio_encoder)
            + release(&mut self.video_encoder)
            + release(&mut self.output)
            + release(&mut self.audio_decoder)
            + release(&mut self.video_decoder)
            + release(&mut self.input);
        if released > 0 {
            log::debug!("teardown released {} resources", released);
        }
        released
    }
}

impl Drop for PipelineRun<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn release<T>(slot: &mut Option<T>) -> usize {
    usize::from(slot.take().is_some())
}

/// The video path of a run, borrowed for one packet or for the flush.
struct Stages<'a> {
    decoder: &'a mut Decoder,
    scaler: Option<&'a mut FrameScaler>,
    encoder: &'a mut Encoder,
    output: &'a mut AvOutput,
    stats: &'a mut TranscodeStats,
}

impl Stages<'_> {
    fn video_packet(&mut self, packet: &RawPacket) -> Result<()> {
        self.decoder.send_packet(packet)?;
        self.drain_decoder()
    }

    fn drain_decoder(&mut self) -> Result<()> {
        let Stages {
            decoder,
            scaler,
            encoder,
            output,
            stats,
        } = self;

        for frame in decoder.frames() {
            let DecodedFrame::Video(mut frame) = frame? else {
                continue;
            };
            stats.video_frames_decoded += 1;
            if frame.pts().is_none() {
                frame.set_pts(frame.timestamp());
            }
            // let the encoder pick frame types
            frame.set_kind(ffmpeg_next::picture::Type::None);

            let frame = match scaler.as_deref_mut() {
                Some(scaler) => scaler.scale(&frame)?,
                None => &frame,
            };
            encoder.send_frame(frame)?;
            stats.video_frames_encoded += 1;
            write_encoded(encoder, output, stats)?;
        }
        Ok(())
    }

    fn write_encoded(&mut self) -> Result<()> {
        write_encoded(self.encoder, self.output, self.stats)
    }
}

fn write_encoded(
    encoder: &mut Encoder,
    output: &mut AvOutput,
    stats: &mut TranscodeStats,
) -> Result<()> {
    for packet in encoder.packets() {
        output.write_packet(VIDEO_OUTPUT_INDEX, packet?)?;
        stats.video_packets_written += 1;
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
