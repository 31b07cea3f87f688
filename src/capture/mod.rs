//! Final-frame capture.
//!
//! The controller turns a streamed clip into exactly one stable raster
//! snapshot of its last visually meaningful frame. See
//! [`controller::CaptureController`] for the state machine and
//! [`source::FrameSource`] for the decoder seam.

pub mod controller;
pub mod source;


pub use controller::{
    CaptureController, CaptureFailure, CaptureOutcome, CaptureState, ReplayAction,
};
pub use source::{FrameGrabError, FrameSource, FrozenFrame, MediaEvent, SourceFactory};
