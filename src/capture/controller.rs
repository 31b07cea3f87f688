//! Final-frame capture state machine.
//!
//! Turns a playing/ended stream into one stable raster snapshot of the
//! clip's last visually meaningful frame, tolerant of decoders that
//! render black or zero-sized frames at the true end-of-stream position
//! and of browsers that only honor a seek after playback has progressed.
//!
//! Two logically concurrent processes race toward the frame: the visible
//! element's natural timeline (rolling capture in the trailing window,
//! then the `ended` grab) and, optionally, a hidden helper decode that
//! seeks straight to near-end. Whichever grabs a valid frame first wins;
//! the commit is guarded by the state check, so the loser's later events
//! are provable no-ops rather than cancelled callbacks.

use image::RgbaImage;

use super::source::{FrameGrabError, FrameSource, FrozenFrame, MediaEvent, SourceFactory};
use crate::config::PipelineOptions;

// ============================================================================
// States and outcomes
// ============================================================================

/// Capture lifecycle for the current clip selection.
#[derive(Debug, Default)]
pub enum CaptureState {
    /// No clip selected, or selection just reset.
    #[default]
    Idle,
    /// Clip selected, waiting for stream metadata.
    Preparing,
    /// Metadata known; capture attempts are live.
    Capturing,
    /// The frozen frame is locked in for this clip selection.
    Captured(FrozenFrame),
    /// No valid frame obtainable; recoverable via replay.
    Failed(CaptureFailure),
}

impl CaptureState {
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Capturing => "capturing",
            Self::Captured(_) => "captured",
            Self::Failed(_) => "failed",
        }
    }
}

/// Why capture gave up on the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFailure {
    /// Rolling, ended and fallback grabs all came back empty.
    NoValidFrame,
    /// The stream itself failed to load or decode.
    Decode,
    /// The raster read was denied (cross-origin source without CORS).
    SecurityDenied,
}

impl CaptureFailure {
    /// User-actionable remedy text. Every failure leaves a recovery path.
    pub fn remedy(&self) -> &'static str {
        match self {
            Self::NoValidFrame => "Press Replay to restart the capture sequence.",
            Self::Decode => "Reselect the clip or press Replay once the source is reachable.",
            Self::SecurityDenied => {
                "Serve the clip from the same origin or enable CORS on the media host, \
                 then press Replay."
            }
        }
    }
}

/// What a dispatched event did to the capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Nothing observable changed.
    None,
    /// The frozen frame was just committed; annotation unlocks now.
    /// Fired exactly once per clip selection.
    Unlocked,
    /// Capture transitioned to `Failed`.
    Failed(CaptureFailure),
}

/// What `replay()` decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAction {
    /// Frame already captured: replay is review-only, the frozen frame
    /// stays authoritative.
    PlaybackOnly,
    /// Capture had not completed (or had failed): the full capture
    /// sequence restarts.
    RestartCapture,
    /// No clip selected; nothing to replay.
    NoClip,
}

// ============================================================================
// Controller
// ============================================================================

/// Owns the capture state machine for the currently selected clip.
pub struct CaptureController {
    state: CaptureState,
    options: PipelineOptions,
    /// Hidden helper decode, alive only while capture is in flight.
    helper: Option<Box<dyn FrameSource>>,
    /// A fallback seek on the visible element is awaiting `Seeked`.
    fallback_pending: bool,
    /// The helper's near-end seek is awaiting `Seeked`.
    helper_seek_pending: bool,
    /// Source URL of the current selection (helper restart on replay).
    current_src: Option<String>,
}

impl CaptureController {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            state: CaptureState::Idle,
            options,
            helper: None,
            fallback_pending: false,
            helper_seek_pending: false,
            current_src: None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// The frozen frame, once captured.
    pub fn frozen_frame(&self) -> Option<&FrozenFrame> {
        match &self.state {
            CaptureState::Captured(frame) => Some(frame),
            _ => None,
        }
    }

    /// True while a hidden helper decode is alive.
    pub fn helper_active(&self) -> bool {
        self.helper.is_some()
    }

    /// Begin the capture sequence for a newly selected clip.
    ///
    /// Any in-flight capture for a previous clip is discarded and its
    /// helper decode torn down before the new sequence starts.
    pub fn begin(&mut self, src: &str, factory: Option<&mut dyn SourceFactory>) {
        self.reset();
        self.current_src = Some(src.to_string());
        self.state = CaptureState::Preparing;
        if self.options.use_helper_source {
            if let Some(factory) = factory {
                log::debug!("[CAPTURE] Opening hidden helper decode for {}", src);
                self.helper = Some(factory.open(src));
            }
        }
        log::info!("[CAPTURE] Preparing final frame for {}", src);
    }

    /// Discard the in-flight capture and return to `Idle`.
    pub fn reset(&mut self) {
        self.teardown_helper();
        self.state = CaptureState::Idle;
        self.fallback_pending = false;
        self.current_src = None;
    }

    /// Replay the clip for the user's review.
    ///
    /// A captured frame persists across replay; only a failed or
    /// incomplete capture restarts the sequence.
    pub fn replay(&mut self, factory: Option<&mut dyn SourceFactory>) -> ReplayAction {
        let Some(src) = self.current_src.clone() else {
            return ReplayAction::NoClip;
        };
        match self.state {
            CaptureState::Captured(_) => ReplayAction::PlaybackOnly,
            _ => {
                self.begin(&src, factory);
                ReplayAction::RestartCapture
            }
        }
    }

    // ------------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------------

    /// Handle an event from the user-visible playback element.
    pub fn handle_visible_event(
        &mut self,
        event: MediaEvent,
        source: &mut dyn FrameSource,
    ) -> CaptureOutcome {
        match event {
            MediaEvent::MetadataLoaded | MediaEvent::TimeUpdate => {
                self.ensure_capturing(source);
                if event == MediaEvent::TimeUpdate {
                    self.rolling_attempt(source)
                } else {
                    CaptureOutcome::None
                }
            }
            MediaEvent::Seeked => {
                if self.fallback_pending {
                    self.fallback_pending = false;
                    return self.final_attempt(source);
                }
                // A user seek straight into the trailing window still
                // deserves a capture attempt before `ended` fires.
                self.rolling_attempt(source)
            }
            MediaEvent::Ended => self.handle_ended(source),
            MediaEvent::Error => self.fail(CaptureFailure::Decode),
        }
    }

    /// Handle an event from the hidden helper decode.
    pub fn handle_helper_event(&mut self, event: MediaEvent) -> CaptureOutcome {
        let Some(mut helper) = self.helper.take() else {
            return CaptureOutcome::None;
        };
        let outcome = match event {
            MediaEvent::MetadataLoaded => {
                match helper.duration() {
                    Some(duration) if duration > 0.0 => {
                        // The helper may learn the duration before the
                        // visible element does; promote so its commit is
                        // not dropped by the state guard.
                        if matches!(self.state, CaptureState::Preparing) {
                            self.state = CaptureState::Capturing;
                        }
                        let target = (duration - self.options.fallback_epsilon_secs).max(0.0);
                        helper.pause();
                        helper.seek(target);
                        self.helper_seek_pending = true;
                        log::debug!("[CAPTURE] Helper seeking to {:.3}s", target);
                    }
                    _ => {
                        log::warn!("[CAPTURE] Helper metadata without usable duration");
                    }
                }
                CaptureOutcome::None
            }
            MediaEvent::Seeked if self.helper_seek_pending => {
                self.helper_seek_pending = false;
                match helper.grab_frame() {
                    Ok(raster) if raster.width() > 0 && raster.height() > 0 => {
                        let frame_time = helper.duration().unwrap_or_else(|| helper.current_time());
                        helper.teardown();
                        return self.commit(raster, frame_time);
                    }
                    Ok(_) | Err(FrameGrabError::NotReady) | Err(FrameGrabError::ZeroSized) => {
                        // Helper came up empty; the visible element's own
                        // paths are still racing toward the frame.
                        log::debug!("[CAPTURE] Helper grab empty, leaving it to the visible path");
                        helper.teardown();
                        return CaptureOutcome::None;
                    }
                    Err(FrameGrabError::SecurityDenied) => {
                        helper.teardown();
                        return self.fail(CaptureFailure::SecurityDenied);
                    }
                }
            }
            MediaEvent::Error => {
                log::warn!("[CAPTURE] Helper decode failed, visible path continues");
                helper.teardown();
                return CaptureOutcome::None;
            }
            _ => CaptureOutcome::None,
        };
        self.helper = Some(helper);
        outcome
    }

    // ------------------------------------------------------------------------
    // Capture attempts
    // ------------------------------------------------------------------------

    /// Move `Preparing -> Capturing` once the stream duration is known.
    fn ensure_capturing(&mut self, source: &dyn FrameSource) {
        if matches!(self.state, CaptureState::Preparing) {
            match source.duration() {
                Some(duration) if duration.is_finite() && duration > 0.0 => {
                    self.state = CaptureState::Capturing;
                    log::debug!("[CAPTURE] Capturing (duration {:.3}s)", duration);
                }
                _ => {
                    log::debug!("[CAPTURE] Duration not available yet, still preparing");
                }
            }
        }
    }

    /// Attempt a grab while the playhead sits in the trailing window.
    fn rolling_attempt(&mut self, source: &mut dyn FrameSource) -> CaptureOutcome {
        if !matches!(self.state, CaptureState::Capturing) {
            return CaptureOutcome::None;
        }
        let Some(duration) = source.duration() else {
            return CaptureOutcome::None;
        };
        let remaining = duration - source.current_time();
        if remaining > self.options.rolling_window_secs {
            return CaptureOutcome::None;
        }
        match source.grab_frame() {
            Ok(raster) if raster.width() > 0 && raster.height() > 0 => {
                self.commit(raster, duration)
            }
            Ok(_) | Err(FrameGrabError::NotReady) | Err(FrameGrabError::ZeroSized) => {
                // Blank or undecoded frame; the next timeupdate, the ended
                // grab or the helper will try again.
                CaptureOutcome::None
            }
            Err(FrameGrabError::SecurityDenied) => self.fail(CaptureFailure::SecurityDenied),
        }
    }

    /// The stream reached its natural end: grab, or fall back to an
    /// explicit near-end seek.
    fn handle_ended(&mut self, source: &mut dyn FrameSource) -> CaptureOutcome {
        if !matches!(self.state, CaptureState::Capturing) {
            // Rolling or helper already won; the late `ended` is a no-op.
            return CaptureOutcome::None;
        }
        let frame_time = source.duration().unwrap_or_else(|| source.current_time());
        match source.grab_frame() {
            Ok(raster) if raster.width() > 0 && raster.height() > 0 => {
                self.commit(raster, frame_time)
            }
            Ok(_) | Err(FrameGrabError::NotReady) | Err(FrameGrabError::ZeroSized) => {
                self.start_fallback_seek(source)
            }
            Err(FrameGrabError::SecurityDenied) => self.fail(CaptureFailure::SecurityDenied),
        }
    }

    /// Pause, seek to `duration - epsilon` and wait for `Seeked`.
    fn start_fallback_seek(&mut self, source: &mut dyn FrameSource) -> CaptureOutcome {
        let Some(duration) = source.duration() else {
            return self.fail(CaptureFailure::NoValidFrame);
        };
        let target = (duration - self.options.fallback_epsilon_secs).max(0.0);
        source.pause();
        source.seek(target);
        self.fallback_pending = true;
        log::debug!("[CAPTURE] Fallback seek to {:.3}s", target);
        CaptureOutcome::None
    }

    /// One last grab after the fallback seek completed.
    fn final_attempt(&mut self, source: &mut dyn FrameSource) -> CaptureOutcome {
        if !matches!(self.state, CaptureState::Capturing) {
            return CaptureOutcome::None;
        }
        let frame_time = source.duration().unwrap_or_else(|| source.current_time());
        match source.grab_frame() {
            Ok(raster) if raster.width() > 0 && raster.height() > 0 => {
                self.commit(raster, frame_time)
            }
            Ok(_) | Err(FrameGrabError::NotReady) | Err(FrameGrabError::ZeroSized) => {
                self.fail(CaptureFailure::NoValidFrame)
            }
            Err(FrameGrabError::SecurityDenied) => self.fail(CaptureFailure::SecurityDenied),
        }
    }

    // ------------------------------------------------------------------------
    // Commit / fail
    // ------------------------------------------------------------------------

    /// First-writer-wins commit of the frozen frame.
    ///
    /// The frozen frame carries the clip's final-moment timestamp. Commit
    /// is a no-op unless capture is live, so whichever concurrent path
    /// reaches a valid frame first wins and every later attempt bounces
    /// off the state check.
    fn commit(&mut self, raster: RgbaImage, frame_time: f64) -> CaptureOutcome {
        if !matches!(self.state, CaptureState::Capturing) {
            return CaptureOutcome::None;
        }
        let frame = FrozenFrame::new(raster, frame_time);
        log::info!(
            "[CAPTURE] Frozen frame committed: {}x{} at {:.3}s",
            frame.width(),
            frame.height(),
            frame.frame_time()
        );
        self.state = CaptureState::Captured(frame);
        self.fallback_pending = false;
        self.teardown_helper();
        CaptureOutcome::Unlocked
    }

    fn fail(&mut self, failure: CaptureFailure) -> CaptureOutcome {
        if self.state.is_captured() {
            // A late error cannot dislodge a committed frame.
            return CaptureOutcome::None;
        }
        log::warn!("[CAPTURE] Capture failed: {:?}. {}", failure, failure.remedy());
        self.state = CaptureState::Failed(failure);
        self.fallback_pending = false;
        self.teardown_helper();
        CaptureOutcome::Failed(failure)
    }

    /// Stop and drop the hidden helper decode. Must run on capture
    /// success, capture failure and clip change; a leaked helper keeps
    /// fetching after its purpose is served.
    fn teardown_helper(&mut self) {
        if let Some(mut helper) = self.helper.take() {
            log::debug!("[CAPTURE] Tearing down helper decode");
            helper.teardown();
        }
        self.helper_seek_pending = false;
    }
}
