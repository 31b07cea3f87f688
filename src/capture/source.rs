//! Frame source abstraction and the frozen-frame raster.
//!
//! A [`FrameSource`] is anything that decodes the clip and can hand over
//! its current frame: the host's visible playback element, or a hidden
//! helper decode of the same source dedicated to seek-and-capture. The
//! controller never touches a real decoder; it only reacts to
//! [`MediaEvent`]s the host dispatches and pulls frames through this trait.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, RgbaImage};

use crate::error::{IncisionError, IncisionResult};
use crate::geometry::round3;

/// Playback/decoder events dispatched by the host environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    /// Stream metadata (duration, dimensions) became available.
    MetadataLoaded,
    /// Playback position advanced.
    TimeUpdate,
    /// A requested seek completed.
    Seeked,
    /// Playback reached the natural end of the stream.
    Ended,
    /// The stream failed to load or decode.
    Error,
}

/// Why a frame grab produced nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameGrabError {
    /// The decoder has no displayable frame yet.
    NotReady,
    /// The decoded frame reported zero dimensions (blank end-of-stream
    /// artifact on several mobile decoders).
    ZeroSized,
    /// Reading the raster was denied (cross-origin source without CORS).
    SecurityDenied,
}

impl FrameGrabError {
    pub fn is_security(&self) -> bool {
        matches!(self, Self::SecurityDenied)
    }
}

/// Abstract decoded-frame capability.
///
/// Implementations wrap whatever the host actually decodes with. All
/// methods are synchronous; suspension points (metadata, seek completion,
/// stream end) arrive as [`MediaEvent`]s instead.
pub trait FrameSource {
    /// Total stream duration in seconds, once metadata is known.
    fn duration(&self) -> Option<f64>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Decoded frame dimensions, once known and non-zero.
    fn decoded_size(&self) -> Option<(u32, u32)>;

    /// Copy the current decoded frame out of the source.
    fn grab_frame(&mut self) -> Result<RgbaImage, FrameGrabError>;

    /// Pause playback.
    fn pause(&mut self);

    /// Request a seek to the given position. Completion arrives as
    /// [`MediaEvent::Seeked`].
    fn seek(&mut self, position_secs: f64);

    /// Stop decoding, clear the source and release resources. Must be
    /// safe to call more than once.
    fn teardown(&mut self);
}

/// Builds the hidden helper decode instance for a clip source URL.
pub trait SourceFactory {
    fn open(&mut self, src: &str) -> Box<dyn FrameSource>;
}

// ============================================================================
// Frozen frame
// ============================================================================

/// The single raster snapshot of the clip's final moment.
///
/// Captured once per clip selection and never overwritten thereafter.
#[derive(Debug, Clone)]
pub struct FrozenFrame {
    raster: RgbaImage,
    frame_time: f64,
}

impl FrozenFrame {
    /// Wrap a captured raster, locking in the capture timestamp (rounded
    /// to wire precision for time values).
    pub fn new(raster: RgbaImage, frame_time: f64) -> Self {
        Self {
            raster,
            frame_time: round3(frame_time),
        }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Timestamp the frame was captured at, rounded to 3 decimals.
    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    /// Encode the frozen frame as a PNG data URL for host display.
    pub fn to_png_data_url(&self) -> IncisionResult<String> {
        let dynamic_image = DynamicImage::ImageRgba8(self.raster.clone());
        let mut buffer = Cursor::new(Vec::new());
        dynamic_image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .map_err(|e| IncisionError::EncodingError(e.to_string()))?;
        let base64_data = STANDARD.encode(buffer.get_ref());
        Ok(format!("data:image/png;base64,{}", base64_data))
    }
}
