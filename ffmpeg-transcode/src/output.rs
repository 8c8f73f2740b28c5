use std::ffi::CString;
use std::path::{Path, PathBuf};

use ffmpeg_next::Rational;

use crate::{
    encoder::Encoder,
    error::{Result, TranscodeError},
    packet::RawPacket,
    stream::AvStream,
};

/// Where an output container is in its write lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Unopened,
    HeaderWritten,
    TrailerWritten,
}

/// Write-only output container. The muxer is chosen from the path.
pub struct AvOutput {
    inner: ffmpeg_next::format::context::Output,
    path: PathBuf,
    // read back after the header, muxers may override what was requested
    time_bases: Vec<Rational>,
    state: OutputState,
}

impl AvOutput {
    pub fn create(path: &Path) -> Result<Self> {
        let open_error = |reason: String| TranscodeError::OutputOpen {
            path: path.to_path_buf(),
            reason,
        };
        let c_path = CString::new(path.to_string_lossy().as_bytes())
            .map_err(|e| open_error(e.to_string()))?;

        let inner = unsafe {
            let mut ps = std::ptr::null_mut();
            let ret = ffmpeg_next::ffi::avformat_alloc_output_context2(
                &mut ps,
                std::ptr::null(),
                std::ptr::null(),
                c_path.as_ptr(),
            );
            if ret < 0 || ps.is_null() {
                return Err(open_error(ffmpeg_next::Error::from(ret).to_string()));
            }
            ffmpeg_next::format::context::Output::wrap(ps)
        };

        log::debug!("output {} uses muxer {}", path.display(), inner.format().name());

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            time_bases: Vec::new(),
            state: OutputState::Unopened,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Whether encoders feeding this container must emit global headers.
    pub fn requires_global_header(&self) -> bool {
        self.inner
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER)
    }

    /// Adds an output stream carrying `encoder`'s parameters; returns its
    /// index. Streams are numbered in the order they are added.
    pub fn add_stream(&mut self, encoder: &Encoder) -> Result<usize> {
        if self.state != OutputState::Unopened {
            return Err(self.open_error("streams must be added before the header"));
        }
        let codec = ffmpeg_next::encoder::find(encoder.codec_id());
        let path = self.path.clone();
        let mut stream =
            self.inner
                .add_stream(codec)
                .map_err(|e| TranscodeError::OutputOpen {
                    path,
                    reason: format!("add {} stream: {}", encoder.name(), e),
                })?;
        stream.set_parameters(encoder.parameters());
        stream.set_time_base(encoder.time_base());
        let index = stream.index();
        log::debug!("output stream {} <- {}", index, encoder.name());
        Ok(index)
    }

    /// Adds an output stream for packets copied from `stream` without
    /// re-encoding; returns its index.
    pub fn add_stream_copy(&mut self, stream: &AvStream) -> Result<usize> {
        if self.state != OutputState::Unopened {
            return Err(self.open_error("streams must be added before the header"));
        }
        let mut parameters = stream.parameters().clone();
        unsafe {
            // the source container's tag may be meaningless to this muxer
            (*parameters.as_mut_ptr()).codec_tag = 0;
        }
        let path = self.path.clone();
        let mut writer_stream = self
            .inner
            .add_stream(ffmpeg_next::encoder::find(stream.codec_id()))
            .map_err(|e| TranscodeError::OutputOpen {
                path,
                reason: format!("add {} copy stream: {}", stream.medium_name(), e),
            })?;
        writer_stream.set_parameters(parameters);
        writer_stream.set_time_base(stream.time_base());
        let index = writer_stream.index();
        log::debug!("output stream {} <- copy of input stream {}", index, stream.index());
        Ok(index)
    }

    /// Opens the file for writing (unless the muxer does its own I/O) and
    /// writes the container header.
    pub fn write_header(&mut self) -> Result<()> {
        if self.state != OutputState::Unopened {
            return Ok(());
        }
        self.open_io()?;
        self.inner
            .write_header()
            .map_err(TranscodeError::HeaderWrite)?;
        self.time_bases = self.inner.streams().map(|s| s.time_base()).collect();
        self.state = OutputState::HeaderWritten;
        log::info!(
            "header written to {} ({} streams)",
            self.path.display(),
            self.time_bases.len()
        );
        Ok(())
    }

    pub fn time_base(&self, index: usize) -> Option<Rational> {
        self.time_bases.get(index).copied()
    }

    /// Rescales `packet` onto output stream `index` and writes it through the
    /// interleaving queue.
    pub fn write_packet(&mut self, index: usize, mut packet: RawPacket) -> Result<()> {
        let time_base = match (self.state, self.time_base(index)) {
            (OutputState::HeaderWritten, Some(time_base)) => time_base,
            (state, _) => {
                return Err(TranscodeError::Write {
                    stream: index,
                    source: if state == OutputState::HeaderWritten {
                        ffmpeg_next::Error::StreamNotFound
                    } else {
                        ffmpeg_next::Error::InvalidData
                    },
                });
            }
        };
        packet.retarget(index, time_base);
        packet
            .get_mut()
            .write_interleaved(&mut self.inner)
            .map_err(|source| TranscodeError::Write {
                stream: index,
                source,
            })?;
        Ok(())
    }

    /// Writes the trailer once; later calls are no-ops.
    pub fn finish(&mut self) -> Result<()> {
        if self.state != OutputState::HeaderWritten {
            return Ok(());
        }
        self.state = OutputState::TrailerWritten;
        self.inner.write_trailer().map_err(TranscodeError::Trailer)?;
        log::info!("trailer written to {}", self.path.display());
        Ok(())
    }

    fn open_io(&mut self) -> Result<()> {
        if self
            .inner
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::NO_FILE)
        {
            return Ok(());
        }
        let c_path = CString::new(self.path.to_string_lossy().as_bytes())
            .map_err(|e| self.open_error(&e.to_string()))?;
        let ret = unsafe {
            ffmpeg_next::ffi::avio_open(
                &mut (*self.inner.as_mut_ptr()).pb,
                c_path.as_ptr(),
                ffmpeg_next::ffi::AVIO_FLAG_WRITE as i32,
            )
        };
        if ret < 0 {
            return Err(self.open_error(&ffmpeg_next::Error::from(ret).to_string()));
        }
        Ok(())
    }

    fn open_error(&self, reason: &str) -> TranscodeError {
        TranscodeError::OutputOpen {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
