//! Media file metadata (similar to ffprobe).

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::stream::AvStream;

/// Format-level info (corresponds to ffprobe format).
#[derive(Debug, Clone, Serialize)]
pub struct FormatInfo {
    /// Format name, e.g. "mov,mp4,m4a,3gp,3g2,mj2"
    pub format_name: String,
    /// Duration in seconds; None if unknown.
    pub duration_sec: Option<f64>,
    /// Total bitrate in bps; 0 if unknown.
    pub bit_rate: i64,
    pub nb_streams: u32,
}

/// Per-stream info (corresponds to ffprobe stream).
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub index: usize,
    /// "video" | "audio" | "subtitle" etc.
    pub codec_type: String,
    /// e.g. "h264", "aac"
    pub codec_name: String,
    /// e.g. "1/90000"
    pub time_base: String,
    pub duration_ts: Option<i64>,
    /// Average frame rate, e.g. "25/1"
    pub rate: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub format: FormatInfo,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn video(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "video")
    }

    pub fn audio(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "audio")
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[FORMAT]")?;
        writeln!(f, "format_name={}", self.format.format_name)?;
        match self.format.duration_sec {
            Some(d) => writeln!(f, "duration_sec={:.3}", d)?,
            None => writeln!(f, "duration_sec=N/A")?,
        }
        writeln!(f, "bit_rate={}", self.format.bit_rate)?;
        writeln!(f, "nb_streams={}", self.format.nb_streams)?;
        writeln!(f, "[/FORMAT]")?;
        for s in &self.streams {
            writeln!(f, "[STREAM]")?;
            writeln!(f, "index={}", s.index)?;
            writeln!(f, "codec_type={}", s.codec_type)?;
            writeln!(f, "codec_name={}", s.codec_name)?;
            writeln!(f, "time_base={}", s.time_base)?;
            if let Some(d) = s.duration_ts {
                writeln!(f, "duration_ts={}", d)?;
            }
            writeln!(f, "rate={}", s.rate)?;
            if let (Some(w), Some(h)) = (s.width, s.height) {
                writeln!(f, "width={}", w)?;
                writeln!(f, "height={}", h)?;
            }
            if let Some(sr) = s.sample_rate {
                writeln!(f, "sample_rate={}", sr)?;
            }
            if let Some(c) = s.channels {
                writeln!(f, "channels={}", c)?;
            }
            writeln!(f, "[/STREAM]")?;
        }
        Ok(())
    }
}

/// Opens a file and returns media metadata (similar to ffprobe).
pub fn probe(path: &Path) -> anyhow::Result<MediaInfo> {
    let input = ffmpeg_next::format::input(path)?;

    let format_name = input.format().name().to_string();
    let nb_streams = input.nb_streams();
    let bit_rate = input.bit_rate();
    // AV_TIME_BASE units
    let duration_sec = match input.duration() {
        d if d == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || d <= 0 => None,
        d => Some(d as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)),
    };

    let mut streams = Vec::with_capacity(nb_streams as usize);
    for stream in input.streams() {
        let duration_ts = match stream.duration() {
            d if d == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || d < 0 => None,
            d => Some(d),
        };
        let av_stream = AvStream::from(stream);
        let time_base = av_stream.time_base();
        let rate = av_stream.rate();

        let (width, height, sample_rate, channels) = if av_stream.is_video() {
            (Some(av_stream.width()), Some(av_stream.height()), None, None)
        } else if av_stream.is_audio() {
            (
                None,
                None,
                Some(av_stream.sample_rate()),
                Some(av_stream.channels()),
            )
        } else {
            (None, None, None, None)
        };

        streams.push(StreamInfo {
            index: av_stream.index(),
            codec_type: av_stream.medium_name().to_string(),
            codec_name: av_stream.codec_id().name().to_string(),
            time_base: format!("{}/{}", time_base.numerator(), time_base.denominator()),
            duration_ts,
            rate: format!("{}/{}", rate.numerator(), rate.denominator()),
            width,
            height,
            sample_rate,
            channels,
        });
    }

    Ok(MediaInfo {
        format: FormatInfo {
            format_name,
            duration_sec,
            bit_rate,
            nb_streams,
        },
        streams,
    })
}
