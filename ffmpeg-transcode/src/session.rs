//! Send/receive bookkeeping shared by decoder and encoder sessions.
//!
//! FFmpeg codecs are producer/consumer pairs: input goes in with
//! `send_*`, output comes out with `receive_*` until the codec reports
//! "needs more input" (EAGAIN) or "end of stream" (EOF). [`SessionState`]
//! tracks where a session is in that exchange so misuse is caught as an
//! error instead of an FFmpeg assertion.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next packet or frame.
    NeedsInput,
    /// Input was accepted; output may be pending.
    HasOutput,
    /// End of stream was signalled; remaining output is being drained.
    Draining,
    /// The codec reported end of stream. Terminal.
    Finished,
}

/// What a single `receive_*` call produced.
pub(crate) enum Received<T> {
    Item(T),
    NeedsInput,
    EndOfStream,
}

impl SessionState {
    pub fn accepts_input(self) -> bool {
        matches!(self, Self::NeedsInput | Self::HasOutput)
    }

    pub fn is_finished(self) -> bool {
        self == Self::Finished
    }

    pub(crate) fn after_receive<T>(self, received: &Received<T>) -> Self {
        match received {
            Received::Item(_) => self,
            // a draining codec never asks for more input; stay put so the
            // next receive can still observe EOF
            Received::NeedsInput if self == Self::Draining => Self::Draining,
            Received::NeedsInput => Self::NeedsInput,
            Received::EndOfStream => Self::Finished,
        }
    }
}

/// Sorts a receive result into output, "needs more input", end of stream,
/// or a real failure.
pub(crate) fn classify<T>(
    result: Result<T, ffmpeg_next::Error>,
) -> Result<Received<T>, ffmpeg_next::Error> {
    match result {
        Ok(item) => Ok(Received::Item(item)),
        Err(ffmpeg_next::Error::Eof) => Ok(Received::EndOfStream),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
            Ok(Received::NeedsInput)
        }
        Err(err) => Err(err),
    }
}
