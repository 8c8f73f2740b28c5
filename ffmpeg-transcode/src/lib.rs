/// Registers FFmpeg components. Call once at startup before opening any
/// input or output.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod config;
pub mod decoder;
pub mod dimension;
pub mod encoder;
pub mod error;
pub mod input;
pub mod metadata;
pub mod output;
pub mod packet;
pub mod pipeline;
pub mod scaler;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod fixture;

pub use config::TranscodeConfig;
pub use error::{ErrorKind, TranscodeError};
pub use metadata::probe;
pub use pipeline::{TranscodeOutcome, TranscodeStats, Transcoder};
