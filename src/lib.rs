//! Final-frame capture and incision annotation pipeline.
//!
//! A clinical study participant watches a short clip, the pipeline
//! freezes on the clip's last visually meaningful frame, the participant
//! draws straight-line incision annotations on the frozen frame, and the
//! normalized geometry plus participant metadata is submitted to an
//! investigator endpoint.
//!
//! # Architecture
//!
//! - [`geometry`] — pure line/point math in pixel and normalized spaces.
//! - [`capture`] — the final-frame capture state machine over an abstract
//!   [`capture::FrameSource`] decoder seam, with rolling capture, a
//!   fallback near-end seek and an optional hidden helper decode.
//! - [`annotation`] — the pointer-gesture state machine accumulating a
//!   bounded set of incision lines over the frozen frame.
//! - [`submission`] — payload projection, eligibility gating, in-flight
//!   guarding and the outbound HTTP POST.
//! - [`session`] — one explicit object owning all of the above per
//!   participant sitting; hosts dispatch decoder events and pointer input
//!   into it and read back status text and the render plan.
//!
//! The host shell (DOM wiring, toast rendering, query-parameter parsing)
//! stays outside this crate; it talks to the pipeline through
//! [`session::Session`] and the [`capture::FrameSource`] trait.

pub mod annotation;
pub mod capture;
pub mod clips;
pub mod config;
pub mod error;
pub mod geometry;
pub mod participant;
pub mod session;
pub mod submission;

pub use annotation::{AnnotationSurface, GestureOutcome, GestureRejection, RenderedLine};
pub use capture::{
    CaptureController, CaptureFailure, CaptureOutcome, CaptureState, FrameGrabError, FrameSource,
    FrozenFrame, MediaEvent, ReplayAction, SourceFactory,
};
pub use clips::{Clip, ClipRegistry, SourceDiagnosis};
pub use config::{BodyWrapper, PipelineOptions, SubmissionConfig};
pub use error::{IncisionError, IncisionResult};
pub use geometry::{Line, Point};
pub use participant::{ParticipantIdentity, ParticipantMeta};
pub use session::{Session, StatusNote};
pub use submission::{
    Eligibility, SubmissionCoordinator, SubmissionPayload, SubmitGate, SubmitStart,
};
