use std::ffi::CString;
use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;

use crate::{
    decoder::Decoder,
    error::{Result, TranscodeError},
    packet::RawPacket,
    stream::AvStream,
};

/// Read-only input container with the streams the pipeline will consume.
///
/// The first video stream and the first audio stream are selected once in
/// [`AvInput::open`]; every other stream is read and ignored.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    path: PathBuf,
    streams: Vec<AvStream>,
    video: usize,
    audio: Option<usize>,
}

impl AvInput {
    pub fn open(path: &Path) -> Result<Self> {
        let inner = open_container(path)?;

        let streams: Vec<AvStream> = inner.streams().map(AvStream::from).collect();
        let video = streams.iter().find(|s| s.is_video()).map(|s| s.index());
        let audio = streams.iter().find(|s| s.is_audio()).map(|s| s.index());

        let Some(video) = video else {
            return Err(TranscodeError::NoVideoStream {
                path: path.to_path_buf(),
            });
        };

        log::info!(
            "opened {} ({}): {} streams, video #{}, audio {}",
            path.display(),
            inner.format().name(),
            streams.len(),
            video,
            audio.map_or("none".to_string(), |a| format!("#{}", a))
        );
        for stream in &streams {
            log::debug!("input stream {:?}", stream);
        }

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            streams,
            video,
            audio,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    pub fn video_stream(&self) -> &AvStream {
        &self.streams[self.video]
    }

    pub fn audio_stream(&self) -> Option<&AvStream> {
        self.audio.map(|index| &self.streams[index])
    }

    pub fn time_base(&self, index: usize) -> Option<Rational> {
        self.streams.get(index).map(|s| s.time_base())
    }

    /// Decoder sessions for the selected video and, if present, audio stream.
    pub fn open_decoders(&self) -> Result<(Decoder, Option<Decoder>)> {
        let video = Decoder::new(self.video_stream())?;
        let audio = match self.audio_stream() {
            Some(stream) => Some(Decoder::new(stream)?),
            None => None,
        };
        Ok((video, audio))
    }

    /// Next demuxed packet tagged with its stream's time base; `None` at end
    /// of input.
    pub fn read_packet(&mut self) -> Result<Option<RawPacket>> {
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        match packet.read(&mut self.inner) {
            Ok(()) => {
                let time_base = self
                    .time_base(packet.stream())
                    .unwrap_or(Rational::new(1, 1));
                Ok(Some(RawPacket::from((packet, time_base))))
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(TranscodeError::decode("read packet", e)),
        }
    }
}

/// Opens and probes the container. Split out so open failures and probe
/// failures surface as different error kinds.
fn open_container(path: &Path) -> Result<ffmpeg_next::format::context::Input> {
    let open_error = |source| TranscodeError::Open {
        path: path.to_path_buf(),
        source,
    };
    let c_path = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| open_error(ffmpeg_next::Error::InvalidData))?;

    unsafe {
        let mut ps = std::ptr::null_mut();
        let ret = ffmpeg_next::ffi::avformat_open_input(
            &mut ps,
            c_path.as_ptr(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        );
        if ret < 0 {
            return Err(open_error(ffmpeg_next::Error::from(ret)));
        }

        let ret = ffmpeg_next::ffi::avformat_find_stream_info(ps, std::ptr::null_mut());
        if ret < 0 {
            ffmpeg_next::ffi::avformat_close_input(&mut ps);
            return Err(TranscodeError::Probe(format!(
                "{}: {}",
                path.display(),
                ffmpeg_next::Error::from(ret)
            )));
        }

        Ok(ffmpeg_next::format::context::Input::wrap(ps))
    }
}
