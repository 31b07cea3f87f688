//! Top-level annotation session.
//!
//! One explicit session object owns the clip selection, capture
//! controller, annotation surface and submission coordinator, replacing
//! the ambient per-module globals a host shell might otherwise keep.
//! Hosts dispatch decoder events and pointer input into the session and
//! read back computed status, toasts and the render plan.

use chrono::Utc;

use crate::annotation::{AnnotationSurface, GestureOutcome, RenderedLine};
use crate::capture::{
    CaptureController, CaptureFailure, CaptureOutcome, CaptureState, FrameSource, MediaEvent,
    ReplayAction, SourceFactory,
};
use crate::clips::{load_error_message, Clip, ClipRegistry};
use crate::config::{PipelineOptions, SubmissionConfig};
use crate::error::{IncisionError, IncisionResult};
use crate::participant::{ParticipantIdentity, ParticipantMeta};
use crate::submission::{SubmissionCoordinator, SubmitGate};

// ============================================================================
// Status surface
// ============================================================================

/// User-visible pipeline status. These transitions are the session's only
/// "exit codes"; the exact wording is presentation, the states are the
/// contract.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusNote {
    NoClipConfigured,
    ClipLoadError(String),
    Preparing,
    Capturing,
    CaptureFailed(CaptureFailure),
    DrawingInProgress { have: usize, need: usize },
    AwaitingParticipant,
    EndpointMissing,
    ReadyToSubmit,
    Submitting,
    Submitted,
    SubmissionFailed,
}

impl StatusNote {
    /// Human-readable progress text.
    pub fn message(&self) -> String {
        match self {
            Self::NoClipConfigured => "No clip configured.".to_string(),
            Self::ClipLoadError(message) => message.clone(),
            Self::Preparing => "Preparing final frame…".to_string(),
            Self::Capturing => "Capturing the final frame…".to_string(),
            Self::CaptureFailed(failure) => {
                format!("Unable to capture the final frame. {}", failure.remedy())
            }
            Self::DrawingInProgress { have, need } => {
                format!(
                    "Final frame ready. {} of {} incision lines drawn.",
                    have, need
                )
            }
            Self::AwaitingParticipant => {
                "Enter a participant ID to enable submission.".to_string()
            }
            Self::EndpointMissing => {
                "Investigator submission endpoint not configured.".to_string()
            }
            Self::ReadyToSubmit => {
                "Ready to submit. Tap the button to send your annotation.".to_string()
            }
            Self::Submitting => "Submitting annotation…".to_string(),
            Self::Submitted => "Annotation submitted. Thank you!".to_string(),
            Self::SubmissionFailed => "Submission failed. Please try again.".to_string(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Owns all pipeline state for one participant sitting.
pub struct Session {
    registry: ClipRegistry,
    current_clip: Option<Clip>,
    capture: CaptureController,
    surface: AnnotationSurface,
    coordinator: SubmissionCoordinator,
    identity: ParticipantIdentity,
    meta: ParticipantMeta,
    factory: Option<Box<dyn SourceFactory>>,
    /// Transient user notices, drained by the host.
    toasts: Vec<String>,
    clip_load_error: Option<String>,
    last_submit_failed: bool,
}

impl Session {
    pub fn new(
        registry: ClipRegistry,
        submission_config: SubmissionConfig,
        mut options: PipelineOptions,
    ) -> Self {
        options.validate();
        let surface = AnnotationSurface::new(options.required_line_count);
        Self {
            registry,
            current_clip: None,
            capture: CaptureController::new(options),
            surface,
            coordinator: SubmissionCoordinator::new(submission_config),
            identity: ParticipantIdentity::default(),
            meta: ParticipantMeta::default(),
            factory: None,
            toasts: Vec::new(),
            clip_load_error: None,
            last_submit_failed: false,
        }
    }

    /// Install a factory for hidden helper decodes.
    pub fn with_source_factory(mut self, factory: Box<dyn SourceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn registry(&self) -> &ClipRegistry {
        &self.registry
    }

    pub fn current_clip(&self) -> Option<&Clip> {
        self.current_clip.as_ref()
    }

    pub fn capture_state(&self) -> &CaptureState {
        self.capture.state()
    }

    pub fn surface(&self) -> &AnnotationSurface {
        &self.surface
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator {
        &self.coordinator
    }

    pub fn submit_enabled(&self) -> bool {
        self.coordinator.submit_enabled()
    }

    pub fn replay_enabled(&self) -> bool {
        self.current_clip.is_some() && self.clip_load_error.is_none()
    }

    pub fn clear_enabled(&self) -> bool {
        self.surface.is_unlocked()
            && (!self.surface.completed_lines().is_empty()
                || self.surface.active_line().is_some())
    }

    /// Drain pending transient notices.
    pub fn take_toasts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.toasts)
    }

    /// Ordered draw list for the host renderer.
    pub fn render_plan(&self) -> Vec<RenderedLine> {
        self.surface.render_plan()
    }

    // ------------------------------------------------------------------------
    // Clip selection and playback
    // ------------------------------------------------------------------------

    /// Select a clip by id, resetting every per-clip piece of state.
    pub fn select_clip(&mut self, clip_id: &str) -> IncisionResult<()> {
        let clip = self
            .registry
            .resolve(clip_id)
            .cloned()
            .ok_or_else(|| IncisionError::ValidationError(format!("unknown clip: {}", clip_id)))?;
        log::info!("[SESSION] Selecting clip {} ({})", clip.id, clip.label);
        self.reset_for_clip();
        let mut factory = self.factory.take();
        self.capture.begin(
            &clip.src,
            factory.as_mut().map(|f| f.as_mut() as &mut dyn SourceFactory),
        );
        self.factory = factory;
        self.current_clip = Some(clip);
        Ok(())
    }

    /// Select the first configured clip, if any.
    pub fn select_default_clip(&mut self) -> IncisionResult<()> {
        match self.registry.first().map(|c| c.id.clone()) {
            Some(id) => self.select_clip(&id),
            None => Err(IncisionError::ValidationError(
                "no clips configured".to_string(),
            )),
        }
    }

    /// Replay the clip for review. A captured frame persists; a failed or
    /// incomplete capture restarts the full sequence.
    pub fn replay(&mut self) -> ReplayAction {
        // Split borrow: take the factory out while replay runs.
        let mut factory = self.factory.take();
        let action = self
            .capture
            .replay(factory.as_mut().map(|f| f.as_mut() as &mut dyn SourceFactory));
        self.factory = factory;
        if action == ReplayAction::RestartCapture {
            self.surface.reset();
            self.clip_load_error = None;
            self.last_submit_failed = false;
            self.refresh();
        }
        action
    }

    fn reset_for_clip(&mut self) {
        self.capture.reset();
        self.surface.reset();
        self.coordinator.reset();
        self.current_clip = None;
        self.clip_load_error = None;
        self.last_submit_failed = false;
    }

    // ------------------------------------------------------------------------
    // Media events
    // ------------------------------------------------------------------------

    /// Dispatch an event from the visible playback element.
    pub fn on_visible_event(
        &mut self,
        event: MediaEvent,
        source: &mut dyn FrameSource,
    ) -> CaptureOutcome {
        if event == MediaEvent::Error {
            if let Some(clip) = &self.current_clip {
                let message = load_error_message(&clip.src);
                self.toasts.push(message.clone());
                self.clip_load_error = Some(message);
            }
        }
        let outcome = self.capture.handle_visible_event(event, source);
        self.apply_capture_outcome(outcome);
        outcome
    }

    /// Dispatch an event from the hidden helper decode.
    pub fn on_helper_event(&mut self, event: MediaEvent) -> CaptureOutcome {
        let outcome = self.capture.handle_helper_event(event);
        self.apply_capture_outcome(outcome);
        outcome
    }

    fn apply_capture_outcome(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Unlocked => {
                if let Some(frame) = self.capture.frozen_frame() {
                    let (w, h) = (frame.width(), frame.height());
                    self.surface.unlock(w, h);
                }
                self.toasts
                    .push("Final frame ready. Draw your incision lines.".to_string());
                self.refresh();
            }
            CaptureOutcome::Failed(failure) => {
                self.toasts.push(format!(
                    "Unable to capture the final frame. {}",
                    failure.remedy()
                ));
                self.refresh();
            }
            CaptureOutcome::None => {}
        }
    }

    // ------------------------------------------------------------------------
    // Pointer input (element-space coordinates)
    // ------------------------------------------------------------------------

    /// The on-screen element size changed (layout/CSS scaling).
    pub fn set_display_size(&mut self, width: f64, height: f64) {
        self.surface.set_display_size(width, height);
    }

    pub fn pointer_down(&mut self, element_x: f64, element_y: f64) -> GestureOutcome {
        let point = self.surface.map_pointer(element_x, element_y);
        let outcome = self.surface.begin(point);
        if let GestureOutcome::Ignored(Some(rejection)) = outcome {
            self.toasts.push(rejection.notice().to_string());
        }
        outcome
    }

    pub fn pointer_move(&mut self, element_x: f64, element_y: f64) -> GestureOutcome {
        let point = self.surface.map_pointer(element_x, element_y);
        self.surface.update(point)
    }

    pub fn pointer_up(&mut self, element_x: f64, element_y: f64) -> GestureOutcome {
        let point = self.surface.map_pointer(element_x, element_y);
        let outcome = self.surface.end(point);
        if matches!(outcome, GestureOutcome::Completed { .. }) {
            self.last_submit_failed = false;
            self.refresh();
        }
        outcome
    }

    /// Pointer left the drawable area: the in-progress line is dropped.
    pub fn pointer_leave(&mut self) -> GestureOutcome {
        self.surface.leave()
    }

    /// Discard all drawn lines.
    pub fn clear_lines(&mut self) {
        self.surface.clear();
        self.last_submit_failed = false;
        self.refresh();
    }

    // ------------------------------------------------------------------------
    // Participant
    // ------------------------------------------------------------------------

    pub fn set_participant_id(&mut self, id: &str) {
        self.identity = ParticipantIdentity::new(id);
        self.refresh();
    }

    pub fn set_participant_meta(&mut self, meta: ParticipantMeta) {
        self.meta = meta.trimmed();
    }

    // ------------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------------

    /// Run one submission attempt. Reentrant calls while a request is in
    /// flight are no-ops; validation failures never reach the network.
    pub async fn submit(&mut self, client: &reqwest::Client) -> IncisionResult<()> {
        let result = self
            .coordinator
            .submit(client, &self.meta, Utc::now())
            .await;
        match &result {
            Ok(()) => {
                if self.coordinator.has_submitted() {
                    self.last_submit_failed = false;
                    self.toasts
                        .push("Annotation sent to investigator.".to_string());
                }
            }
            Err(IncisionError::ValidationError(message)) => {
                self.toasts.push(message.clone());
            }
            Err(_) => {
                self.last_submit_failed = true;
                self.toasts.push(
                    "Unable to submit annotation. Check your connection and try again."
                        .to_string(),
                );
            }
        }
        result
    }

    /// Rebuild the payload and eligibility after any input mutation.
    fn refresh(&mut self) {
        self.coordinator.refresh(
            self.current_clip.as_ref(),
            self.capture.frozen_frame(),
            self.surface.completed_lines(),
            self.surface.required_line_count(),
            &self.identity,
            Utc::now(),
        );
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// Compute the current user-visible status.
    pub fn status(&self) -> StatusNote {
        if self.registry.is_empty() {
            return StatusNote::NoClipConfigured;
        }
        if let Some(message) = &self.clip_load_error {
            return StatusNote::ClipLoadError(message.clone());
        }
        if self.current_clip.is_none() {
            return StatusNote::NoClipConfigured;
        }
        match self.capture.state() {
            CaptureState::Idle | CaptureState::Preparing => StatusNote::Preparing,
            CaptureState::Capturing => StatusNote::Capturing,
            CaptureState::Failed(failure) => StatusNote::CaptureFailed(*failure),
            CaptureState::Captured(_) => self.captured_status(),
        }
    }

    fn captured_status(&self) -> StatusNote {
        if self.coordinator.gate() == SubmitGate::Submitting {
            return StatusNote::Submitting;
        }
        if self.last_submit_failed {
            return StatusNote::SubmissionFailed;
        }
        if self.coordinator.has_submitted() {
            return StatusNote::Submitted;
        }
        use crate::submission::Eligibility;
        match self.coordinator.eligibility() {
            Eligibility::Ready => StatusNote::ReadyToSubmit,
            Eligibility::WrongLineCount { have, need } => {
                StatusNote::DrawingInProgress { have, need }
            }
            Eligibility::MissingParticipant => StatusNote::AwaitingParticipant,
            Eligibility::EndpointMissing => StatusNote::EndpointMissing,
            Eligibility::CaptureIncomplete => StatusNote::DrawingInProgress {
                have: self.surface.completed_lines().len(),
                need: self.surface.required_line_count(),
            },
        }
    }
}
