//! Synthetic media for tests: mpeg4 video and optional AAC audio muxed into
//! Matroska, built only from codecs every libavcodec ships.

use std::path::Path;

use ffmpeg_next::{Rational, codec, encoder, format, frame};

const FPS: i32 = 25;
const SAMPLE_RATE: i32 = 44_100;

pub(crate) struct Clip {
    width: u32,
    height: u32,
    frames: usize,
    audio_tracks: usize,
}

impl Clip {
    pub(crate) fn new(width: u32, height: u32, frames: usize) -> Self {
        Self {
            width,
            height,
            frames,
            audio_tracks: 0,
        }
    }

    pub(crate) fn with_audio(self) -> Self {
        self.with_audio_tracks(1)
    }

    /// Muxes `tracks` identical AAC tracks after the video stream.
    pub(crate) fn with_audio_tracks(mut self, tracks: usize) -> Self {
        self.audio_tracks = tracks;
        self
    }

    pub(crate) fn write(&self, path: &Path) -> anyhow::Result<()> {
        let mut octx = format::output(path)?;
        let global_header = octx
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let mut video = VideoTrack::open(&mut octx, self.width, self.height, global_header)?;
        let mut audio = (0..self.audio_tracks)
            .map(|_| AudioTrack::open(&mut octx, global_header))
            .collect::<anyhow::Result<Vec<_>>>()?;

        octx.write_header()?;
        video.stream_tb = stream_time_base(&octx, video.index)?;
        for track in audio.iter_mut() {
            track.stream_tb = stream_time_base(&octx, track.index)?;
        }

        let samples_needed = self.frames as i64 * (SAMPLE_RATE / FPS) as i64;
        for i in 0..self.frames {
            video.push(&mut octx, i as i64)?;
            let until = (i as i64 + 1) * (SAMPLE_RATE / FPS) as i64;
            for track in audio.iter_mut() {
                while track.next_pts < until.min(samples_needed) {
                    track.push(&mut octx)?;
                }
            }
        }
        video.finish(&mut octx)?;
        for track in audio.iter_mut() {
            track.finish(&mut octx)?;
        }
        octx.write_trailer()?;
        Ok(())
    }
}

/// Matroska file holding only an AAC track of `frames` encoder frames.
pub(crate) fn write_audio_only(path: &Path, frames: usize) -> anyhow::Result<()> {
    let mut octx = format::output(path)?;
    let global_header = octx
        .format()
        .flags()
        .contains(format::Flags::GLOBAL_HEADER);
    let mut audio = AudioTrack::open(&mut octx, global_header)?;
    octx.write_header()?;
    audio.stream_tb = stream_time_base(&octx, audio.index)?;
    for _ in 0..frames {
        audio.push(&mut octx)?;
    }
    audio.finish(&mut octx)?;
    octx.write_trailer()?;
    Ok(())
}

/// Demuxed packet count per stream index.
pub(crate) fn packets_per_stream(path: &Path) -> anyhow::Result<Vec<u64>> {
    let mut input = format::input(path)?;
    let mut counts = vec![0u64; input.nb_streams() as usize];
    for (stream, _) in input.packets() {
        counts[stream.index()] += 1;
    }
    Ok(counts)
}

fn stream_time_base(octx: &format::context::Output, index: usize) -> anyhow::Result<Rational> {
    octx.stream(index)
        .map(|s| s.time_base())
        .ok_or_else(|| anyhow::anyhow!("output stream {} missing", index))
}

struct VideoTrack {
    encoder: encoder::Video,
    index: usize,
    encoder_tb: Rational,
    stream_tb: Rational,
    width: u32,
    height: u32,
}

impl VideoTrack {
    fn open(
        octx: &mut format::context::Output,
        width: u32,
        height: u32,
        global_header: bool,
    ) -> anyhow::Result<Self> {
        let codec = encoder::find(codec::Id::MPEG4)
            .ok_or_else(|| anyhow::anyhow!("mpeg4 encoder missing"))?;
        let mut setup = codec::Context::new_with_codec(codec).encoder().video()?;
        setup.set_width(width);
        setup.set_height(height);
        setup.set_format(format::Pixel::YUV420P);
        setup.set_time_base(Rational::new(1, FPS));
        setup.set_frame_rate(Some(Rational::new(FPS, 1)));
        if global_header {
            setup.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = setup.open_as(codec)?;

        let mut stream = octx.add_stream(codec)?;
        stream.set_parameters(&encoder);
        stream.set_time_base(Rational::new(1, FPS));
        let index = stream.index();

        Ok(Self {
            encoder,
            index,
            encoder_tb: Rational::new(1, FPS),
            stream_tb: Rational::new(1, FPS),
            width,
            height,
        })
    }

    fn push(&mut self, octx: &mut format::context::Output, pts: i64) -> anyhow::Result<()> {
        let mut frame = frame::Video::new(format::Pixel::YUV420P, self.width, self.height);
        // moving gradient so consecutive frames differ
        let shade = (pts * 7 % 200) as u8 + 16;
        frame.data_mut(0).fill(shade);
        frame.data_mut(1).fill(128);
        frame.data_mut(2).fill(255 - shade);
        frame.set_pts(Some(pts));
        self.encoder.send_frame(&frame)?;
        self.drain(octx)
    }

    fn finish(&mut self, octx: &mut format::context::Output) -> anyhow::Result<()> {
        self.encoder.send_eof()?;
        self.drain(octx)
    }

    fn drain(&mut self, octx: &mut format::context::Output) -> anyhow::Result<()> {
        let mut packet = codec::packet::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.index);
            packet.rescale_ts(self.encoder_tb, self.stream_tb);
            packet.write_interleaved(octx)?;
        }
        Ok(())
    }
}

struct AudioTrack {
    encoder: encoder::Audio,
    index: usize,
    frame_size: i32,
    next_pts: i64,
    stream_tb: Rational,
}

impl AudioTrack {
    fn open(octx: &mut format::context::Output, global_header: bool) -> anyhow::Result<Self> {
        let codec = encoder::find(codec::Id::AAC)
            .ok_or_else(|| anyhow::anyhow!("aac encoder missing"))?;
        let mut setup = codec::Context::new_with_codec(codec).encoder().audio()?;
        setup.set_rate(SAMPLE_RATE);
        setup.set_format(format::Sample::F32(format::sample::Type::Planar));
        setup.set_bit_rate(64_000);
        setup.set_time_base(Rational::new(1, SAMPLE_RATE));
        unsafe {
            ffmpeg_next::ffi::av_channel_layout_default(&mut (*setup.as_mut_ptr()).ch_layout, 2);
        }
        if global_header {
            setup.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = setup.open_as(codec)?;
        let frame_size = unsafe { (*encoder.as_ptr()).frame_size }.max(1);

        let mut stream = octx.add_stream(codec)?;
        stream.set_parameters(&encoder);
        stream.set_time_base(Rational::new(1, SAMPLE_RATE));
        let index = stream.index();

        Ok(Self {
            encoder,
            index,
            frame_size,
            next_pts: 0,
            stream_tb: Rational::new(1, SAMPLE_RATE),
        })
    }

    fn push(&mut self, octx: &mut format::context::Output) -> anyhow::Result<()> {
        let mut frame = frame::Audio::empty();
        unsafe {
            let ptr = frame.as_mut_ptr();
            (*ptr).format = ffmpeg_next::ffi::AVSampleFormat::AV_SAMPLE_FMT_FLTP as i32;
            (*ptr).nb_samples = self.frame_size;
            (*ptr).sample_rate = SAMPLE_RATE;
            ffmpeg_next::ffi::av_channel_layout_default(&mut (*ptr).ch_layout, 2);
            let ret = ffmpeg_next::ffi::av_frame_get_buffer(ptr, 0);
            if ret < 0 {
                anyhow::bail!("audio frame allocation: {}", ffmpeg_next::Error::from(ret));
            }
            for channel in 0..2 {
                let samples = std::slice::from_raw_parts_mut(
                    (*ptr).data[channel] as *mut f32,
                    self.frame_size as usize,
                );
                for (n, sample) in samples.iter_mut().enumerate() {
                    let t = (self.next_pts + n as i64) as f32 / SAMPLE_RATE as f32;
                    *sample = 0.2 * (t * 440.0 * std::f32::consts::TAU).sin();
                }
            }
        }
        frame.set_pts(Some(self.next_pts));
        self.next_pts += self.frame_size as i64;
        self.encoder.send_frame(&frame)?;
        self.drain(octx)
    }

    fn finish(&mut self, octx: &mut format::context::Output) -> anyhow::Result<()> {
        self.encoder.send_eof()?;
        self.drain(octx)
    }

    fn drain(&mut self, octx: &mut format::context::Output) -> anyhow::Result<()> {
        let mut packet = codec::packet::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.index);
            packet.rescale_ts(Rational::new(1, SAMPLE_RATE), self.stream_tb);
            packet.write_interleaved(octx)?;
        }
        Ok(())
    }
}
