//! Error taxonomy for a transcode run.
//!
//! Every stage returns [`TranscodeError`]; the first error aborts the run and
//! the orchestrator releases everything it owns before handing it back.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = TranscodeError> = std::result::Result<T, E>;

/// Plain tag for the failing stage, for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Open,
    Probe,
    NoVideoStream,
    UnsupportedCodec,
    EncoderUnavailable,
    OutputOpen,
    HeaderWrite,
    Decode,
    Encode,
    Write,
    Trailer,
    ScalingInit,
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("could not open input file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("could not find stream information: {0}")]
    Probe(String),

    #[error("no video stream found in {}", path.display())]
    NoVideoStream { path: PathBuf },

    #[error("no decoder available for {medium} stream {index} (codec {codec:?})")]
    UnsupportedCodec {
        index: usize,
        medium: &'static str,
        codec: ffmpeg_next::codec::Id,
    },

    #[error("encoder not available: {0}")]
    EncoderUnavailable(String),

    #[error("could not open output {}: {reason}", path.display())]
    OutputOpen { path: PathBuf, reason: String },

    #[error("could not write output header: {0}")]
    HeaderWrite(#[source] ffmpeg_next::Error),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("could not write packet for output stream {stream}: {source}")]
    Write {
        stream: usize,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("could not write trailer: {0}")]
    Trailer(#[source] ffmpeg_next::Error),

    #[error("could not initialize scaling context: {0}")]
    ScalingInit(#[source] ffmpeg_next::Error),
}

impl TranscodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::Open,
            Self::Probe(_) => ErrorKind::Probe,
            Self::NoVideoStream { .. } => ErrorKind::NoVideoStream,
            Self::UnsupportedCodec { .. } => ErrorKind::UnsupportedCodec,
            Self::EncoderUnavailable(_) => ErrorKind::EncoderUnavailable,
            Self::OutputOpen { .. } => ErrorKind::OutputOpen,
            Self::HeaderWrite(_) => ErrorKind::HeaderWrite,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Write { .. } => ErrorKind::Write,
            Self::Trailer(_) => ErrorKind::Trailer,
            Self::ScalingInit(_) => ErrorKind::ScalingInit,
        }
    }

    pub(crate) fn decode(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{}: {}", context, err))
    }

    pub(crate) fn encode(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Encode(format!("{}: {}", context, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = TranscodeError::NoVideoStream {
            path: PathBuf::from("in.mp4"),
        };
        assert_eq!(err.kind(), ErrorKind::NoVideoStream);
        assert!(err.to_string().contains("in.mp4"));

        let err = TranscodeError::Trailer(ffmpeg_next::Error::Eof);
        assert_eq!(err.kind(), ErrorKind::Trailer);
    }

    #[test]
    fn unsupported_codec_names_the_stream() {
        let err = TranscodeError::UnsupportedCodec {
            index: 3,
            medium: "video",
            codec: ffmpeg_next::codec::Id::None,
        };
        let msg = err.to_string();
        assert!(msg.contains("video stream 3"));
        assert_eq!(err.kind(), ErrorKind::UnsupportedCodec);
    }

    #[test]
    fn decode_helper_keeps_context() {
        let err = TranscodeError::decode("receive frame", "boom");
        assert_eq!(err.to_string(), "decode failed: receive frame: boom");
    }
}
