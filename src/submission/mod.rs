//! Submission payload assembly and delivery.
//!
//! The payload is a pure projection of the current session state,
//! recomputed wholesale whenever any contributing input changes, so stale
//! data never survives a mutation. The coordinator gates the network call
//! behind eligibility checks and a single in-flight guard.

pub mod coordinator;
pub mod csv;

pub use coordinator::{
    Eligibility, PreparedRequest, SubmissionCoordinator, SubmitGate, SubmitStart,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::FrozenFrame;
use crate::clips::Clip;
use crate::geometry::{round2, Line};
use crate::participant::ParticipantIdentity;

// ============================================================================
// Wire types
// ============================================================================

/// Pixel-space endpoints plus length, rounded to wire precision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PixelLine {
    pub start: crate::geometry::Point,
    pub end: crate::geometry::Point,
    pub length: f64,
}

/// One incision in both coordinate spaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncisionDetail {
    /// Resolution-agnostic `[0,1]` coordinates, full precision.
    pub normalized: Line,
    /// Raster-space coordinates, 2-decimal precision.
    pub pixels: PixelLine,
}

/// Raster dimensions the pixel coordinates refer to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

/// The authoritative annotation payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub clip_id: String,
    pub clip_label: String,
    pub video_src: String,
    /// Timestamp of the frozen frame, 3-decimal precision.
    pub captured_frame_time: f64,
    /// Normalized lines only; the resolution-agnostic consumer view.
    pub incisions: Vec<Line>,
    /// Full per-incision detail in both spaces.
    pub incision_details: Vec<IncisionDetail>,
    pub canvas_size: CanvasSize,
    /// ISO-8601 wall-clock time the payload was generated.
    pub generated_at: String,
    pub participant_id: String,
    /// Suggested artifact filename: `<participantId>_<clipId>.json`.
    pub filename_hint: String,
}

// ============================================================================
// Builder
// ============================================================================

/// Project the current session state into a fresh payload.
///
/// Pure function of its inputs; callers pass the wall-clock time so the
/// projection is reproducible under test.
pub fn build_payload(
    clip: &Clip,
    frame: &FrozenFrame,
    completed_lines: &[Line],
    identity: &ParticipantIdentity,
    now: DateTime<Utc>,
) -> SubmissionPayload {
    let width = frame.width() as f64;
    let height = frame.height() as f64;

    let incisions: Vec<Line> = completed_lines
        .iter()
        .map(|line| line.normalized(width, height))
        .collect();

    let incision_details = completed_lines
        .iter()
        .zip(incisions.iter())
        .map(|(pixel, normalized)| IncisionDetail {
            normalized: *normalized,
            pixels: PixelLine {
                start: pixel.start.rounded2(),
                end: pixel.end.rounded2(),
                length: round2(pixel.length()),
            },
        })
        .collect();

    SubmissionPayload {
        clip_id: clip.id.clone(),
        clip_label: clip.label.clone(),
        video_src: clip.src.clone(),
        captured_frame_time: frame.frame_time(),
        incisions,
        incision_details,
        canvas_size: CanvasSize {
            width: frame.width(),
            height: frame.height(),
        },
        generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        participant_id: identity.id().to_string(),
        filename_hint: format!("{}_{}.json", identity.id(), clip.id),
    }
}
