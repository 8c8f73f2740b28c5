use ffmpeg_next::{
    format::Pixel,
    frame,
    software::scaling::{self, Flags},
};

use crate::error::{Result, TranscodeError};

/// Resamples decoded video into the encoder's geometry and pixel format.
///
/// One destination frame is allocated up front and reused for every call,
/// so the frame returned by [`FrameScaler::scale`] is only valid until the
/// next call.
pub struct FrameScaler {
    context: scaling::Context,
    destination: frame::Video,
}

impl FrameScaler {
    /// True when frames of the given input shape cannot go straight to the
    /// encoder.
    pub fn required(
        src_format: Pixel,
        src_width: u32,
        src_height: u32,
        dst_format: Pixel,
        dst_width: u32,
        dst_height: u32,
    ) -> bool {
        src_format != dst_format || src_width != dst_width || src_height != dst_height
    }

    pub fn new(
        src_format: Pixel,
        src_width: u32,
        src_height: u32,
        dst_format: Pixel,
        dst_width: u32,
        dst_height: u32,
    ) -> Result<Self> {
        let context = scaling::Context::get(
            src_format,
            src_width,
            src_height,
            dst_format,
            dst_width,
            dst_height,
            Flags::BILINEAR,
        )
        .map_err(TranscodeError::ScalingInit)?;

        log::info!(
            "scaler {:?} {}x{} -> {:?} {}x{}",
            src_format,
            src_width,
            src_height,
            dst_format,
            dst_width,
            dst_height
        );

        Ok(Self {
            context,
            destination: frame::Video::new(dst_format, dst_width, dst_height),
        })
    }

    pub fn scale(&mut self, source: &frame::Video) -> Result<&frame::Video> {
        self.context
            .run(source, &mut self.destination)
            .map_err(|e| TranscodeError::encode("scale frame", e))?;
        self.destination.set_pts(source.pts());
        Ok(&self.destination)
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.destination.width(), self.destination.height())
    }
}
