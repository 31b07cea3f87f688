//! Submission coordinator: eligibility gate, in-flight guard, delivery.
//!
//! Maintains exactly one authoritative payload derived from current
//! session state and performs the network exchange with idempotence
//! against double-submit. Validation failures never reach the network;
//! they surface as a disabled affordance plus explanatory status text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::csv::build_csv_form_data;
use super::{build_payload, SubmissionPayload};
use crate::capture::FrozenFrame;
use crate::clips::Clip;
use crate::config::{BodyWrapper, SubmissionConfig};
use crate::error::{IncisionError, IncisionResult};
use crate::geometry::Line;
use crate::participant::{ParticipantIdentity, ParticipantMeta};

// ============================================================================
// Gate and eligibility
// ============================================================================

/// In-flight state of the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitGate {
    #[default]
    Idle,
    Submitting,
}

/// Why the submit affordance is (or is not) enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// All preconditions met; submit is enabled.
    Ready,
    /// The frozen frame has not been captured.
    CaptureIncomplete,
    /// Not exactly the required number of completed lines.
    WrongLineCount { have: usize, need: usize },
    /// Participant id is empty.
    MissingParticipant,
    /// No endpoint configured by the host.
    EndpointMissing,
}

impl Eligibility {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Explanatory status text shown next to the disabled button.
    pub fn status_text(&self) -> String {
        match self {
            Self::Ready => "Ready to submit. Tap the button to send your annotation.".to_string(),
            Self::CaptureIncomplete => {
                "Draw the incision on the frozen frame to enable submission.".to_string()
            }
            Self::WrongLineCount { have, need } => {
                format!("{} of {} incision lines drawn.", have, need)
            }
            Self::MissingParticipant => {
                "Enter a participant ID to enable submission.".to_string()
            }
            Self::EndpointMissing => {
                "Investigator submission endpoint not configured.".to_string()
            }
        }
    }
}

/// Outcome of asking to start a submission.
#[derive(Debug)]
pub enum SubmitStart {
    /// Guard taken; send this request.
    Request(PreparedRequest),
    /// A request is already in flight; this call is a no-op.
    AlreadyInFlight,
    /// Preconditions unmet; nothing was sent.
    NotEligible(Eligibility),
}

/// A fully assembled outbound request.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub endpoint: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owns the authoritative payload and the submission lifecycle.
pub struct SubmissionCoordinator {
    config: SubmissionConfig,
    gate: SubmitGate,
    eligibility: Eligibility,
    latest_payload: Option<SubmissionPayload>,
    /// At least one successful submission happened for the current lines.
    submitted: bool,
}

impl SubmissionCoordinator {
    pub fn new(config: SubmissionConfig) -> Self {
        Self {
            config,
            gate: SubmitGate::Idle,
            eligibility: Eligibility::CaptureIncomplete,
            latest_payload: None,
            submitted: false,
        }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    pub fn gate(&self) -> SubmitGate {
        self.gate
    }

    pub fn eligibility(&self) -> Eligibility {
        self.eligibility
    }

    /// True when the submit affordance should be enabled.
    pub fn submit_enabled(&self) -> bool {
        self.eligibility.is_ready() && self.gate == SubmitGate::Idle
    }

    pub fn latest_payload(&self) -> Option<&SubmissionPayload> {
        self.latest_payload.as_ref()
    }

    pub fn has_submitted(&self) -> bool {
        self.submitted
    }

    /// Discard payload and eligibility for a new clip selection.
    pub fn reset(&mut self) {
        self.gate = SubmitGate::Idle;
        self.eligibility = Eligibility::CaptureIncomplete;
        self.latest_payload = None;
        self.submitted = false;
    }

    /// Recompute eligibility and rebuild the payload from scratch.
    ///
    /// Called after every mutation of capture state, completed lines or
    /// participant identity; the payload is a disposable projection, never
    /// patched in place.
    pub fn refresh(
        &mut self,
        clip: Option<&Clip>,
        frame: Option<&FrozenFrame>,
        completed_lines: &[Line],
        required_line_count: usize,
        identity: &ParticipantIdentity,
        now: DateTime<Utc>,
    ) {
        self.eligibility = match (clip, frame) {
            (Some(_), Some(_)) if completed_lines.len() != required_line_count => {
                Eligibility::WrongLineCount {
                    have: completed_lines.len(),
                    need: required_line_count,
                }
            }
            (Some(_), Some(_)) if !identity.is_present() => Eligibility::MissingParticipant,
            (Some(_), Some(_)) if !self.config.has_endpoint() => Eligibility::EndpointMissing,
            (Some(_), Some(_)) => Eligibility::Ready,
            _ => Eligibility::CaptureIncomplete,
        };

        self.latest_payload = match (clip, frame) {
            (Some(clip), Some(frame)) if completed_lines.len() == required_line_count => {
                Some(build_payload(clip, frame, completed_lines, identity, now))
            }
            _ => None,
        };
        // New inputs mean a new logical submission.
        self.submitted = false;
    }

    // ------------------------------------------------------------------------
    // Submission lifecycle
    // ------------------------------------------------------------------------

    /// Take the in-flight guard and assemble the outbound request.
    ///
    /// Reentrant calls while a request is pending are no-ops.
    pub fn try_begin(&mut self, meta: &ParticipantMeta, now: DateTime<Utc>) -> SubmitStart {
        if self.gate == SubmitGate::Submitting {
            log::debug!("[SUBMIT] Ignoring submit while a request is in flight");
            return SubmitStart::AlreadyInFlight;
        }
        if !self.eligibility.is_ready() {
            return SubmitStart::NotEligible(self.eligibility);
        }
        let Some(payload) = self.latest_payload.as_ref() else {
            return SubmitStart::NotEligible(self.eligibility);
        };
        // has_endpoint() held in the eligibility check above.
        let endpoint = self.config.endpoint.clone().unwrap_or_default();

        let request = PreparedRequest {
            endpoint,
            method: self.config.method().to_string(),
            headers: self.config.effective_headers(),
            body: self.build_body(payload, meta, now),
        };
        self.gate = SubmitGate::Submitting;
        log::info!("[SUBMIT] Submitting annotation for clip {}", payload.clip_id);
        SubmitStart::Request(request)
    }

    /// Release the guard and record the attempt's outcome.
    ///
    /// On failure the payload stays intact so the user can retry without
    /// redrawing.
    pub fn finish(&mut self, result: &IncisionResult<()>) {
        self.gate = SubmitGate::Idle;
        match result {
            Ok(()) => {
                self.submitted = true;
                log::info!("[SUBMIT] Annotation submitted");
            }
            Err(e) => {
                log::warn!("[SUBMIT] Submission failed (retriable): {}", e);
            }
        }
    }

    /// Assemble the JSON request body.
    ///
    /// Participant fields are flattened into the body root only when the
    /// wrapper is `none`; otherwise the wrapped payload (which carries
    /// `participantId`) stands alone next to the static fields.
    fn build_body(
        &self,
        payload: &SubmissionPayload,
        meta: &ParticipantMeta,
        now: DateTime<Utc>,
    ) -> Value {
        let mut body: Map<String, Value> = self.config.additional_fields.clone();

        match &self.config.body_wrapper {
            BodyWrapper::None => {
                if let Value::Object(participant) =
                    serde_json::to_value(meta).unwrap_or(Value::Null)
                {
                    body.extend(participant);
                }
                if let Ok(Value::Object(flattened)) = serde_json::to_value(payload) {
                    body.extend(flattened);
                }
            }
            BodyWrapper::Key(key) => {
                body.insert(
                    key.clone(),
                    serde_json::to_value(payload).unwrap_or(Value::Null),
                );
            }
        }

        if self.config.csv_mirror {
            body.insert(
                "csv_form_data".to_string(),
                Value::String(build_csv_form_data(meta, &payload.clip_id, now)),
            );
        }

        Value::Object(body)
    }

    /// Run one full submission attempt over HTTP.
    ///
    /// Double-invoking while the first request is pending yields exactly
    /// one outbound request; validation failures return without touching
    /// the network.
    pub async fn submit(
        &mut self,
        client: &reqwest::Client,
        meta: &ParticipantMeta,
        now: DateTime<Utc>,
    ) -> IncisionResult<()> {
        match self.try_begin(meta, now) {
            SubmitStart::AlreadyInFlight => Ok(()),
            SubmitStart::NotEligible(eligibility) => {
                Err(IncisionError::ValidationError(eligibility.status_text()))
            }
            SubmitStart::Request(request) => {
                let result = send(client, &request).await;
                self.finish(&result);
                result
            }
        }
    }
}

/// Execute a single request and check the response status.
async fn send(client: &reqwest::Client, request: &PreparedRequest) -> IncisionResult<()> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .unwrap_or(reqwest::Method::POST);
    let mut builder = client.request(method, &request.endpoint);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    let response = builder.json(&request.body).send().await?;
    if !response.status().is_success() {
        return Err(IncisionError::HttpStatus {
            status: response.status().as_u16(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use image::RgbaImage;

    fn clip() -> Clip {
        Clip::new("case-4", "Case 4", "https://cdn.example/case4.mp4")
    }

    fn frame() -> FrozenFrame {
        FrozenFrame::new(RgbaImage::new(640, 360), 10.0)
    }

    fn two_lines() -> Vec<Line> {
        vec![
            Line::new(Point::new(100.0, 100.0), Point::new(200.0, 100.0)),
            Line::new(Point::new(100.0, 200.0), Point::new(200.0, 260.0)),
        ]
    }

    fn endpoint_config() -> SubmissionConfig {
        SubmissionConfig {
            endpoint: Some("https://collector.example/submit".to_string()),
            ..Default::default()
        }
    }

    fn ready_coordinator() -> SubmissionCoordinator {
        let mut coordinator = SubmissionCoordinator::new(endpoint_config());
        coordinator.refresh(
            Some(&clip()),
            Some(&frame()),
            &two_lines(),
            2,
            &ParticipantIdentity::new("P07"),
            Utc::now(),
        );
        coordinator
    }

    #[test]
    fn test_line_count_gate() {
        let mut coordinator = SubmissionCoordinator::new(endpoint_config());
        let identity = ParticipantIdentity::new("P07");
        let lines = two_lines();

        // One line drawn: disabled.
        coordinator.refresh(Some(&clip()), Some(&frame()), &lines[..1], 2, &identity, Utc::now());
        assert!(!coordinator.submit_enabled());
        assert_eq!(
            coordinator.eligibility(),
            Eligibility::WrongLineCount { have: 1, need: 2 }
        );

        // Second line: enabled.
        coordinator.refresh(Some(&clip()), Some(&frame()), &lines, 2, &identity, Utc::now());
        assert!(coordinator.submit_enabled());

        // Cleared: disabled again.
        coordinator.refresh(Some(&clip()), Some(&frame()), &[], 2, &identity, Utc::now());
        assert!(!coordinator.submit_enabled());
        assert!(coordinator.latest_payload().is_none());
    }

    #[test]
    fn test_gate_requires_capture_identity_and_endpoint() {
        let identity = ParticipantIdentity::new("P07");
        let lines = two_lines();

        let mut coordinator = SubmissionCoordinator::new(endpoint_config());
        coordinator.refresh(Some(&clip()), None, &lines, 2, &identity, Utc::now());
        assert_eq!(coordinator.eligibility(), Eligibility::CaptureIncomplete);

        coordinator.refresh(
            Some(&clip()),
            Some(&frame()),
            &lines,
            2,
            &ParticipantIdentity::default(),
            Utc::now(),
        );
        assert_eq!(coordinator.eligibility(), Eligibility::MissingParticipant);

        let mut no_endpoint = SubmissionCoordinator::new(SubmissionConfig::default());
        no_endpoint.refresh(Some(&clip()), Some(&frame()), &lines, 2, &identity, Utc::now());
        assert_eq!(no_endpoint.eligibility(), Eligibility::EndpointMissing);
        // The payload still exists for display; only submission is gated.
        assert!(no_endpoint.latest_payload().is_some());
    }

    #[test]
    fn test_in_flight_guard_yields_one_request() {
        let mut coordinator = ready_coordinator();
        let meta = ParticipantMeta::default();

        let first = coordinator.try_begin(&meta, Utc::now());
        assert!(matches!(first, SubmitStart::Request(_)));
        assert!(!coordinator.submit_enabled());

        let second = coordinator.try_begin(&meta, Utc::now());
        assert!(matches!(second, SubmitStart::AlreadyInFlight));
    }

    #[test]
    fn test_failure_is_retriable_and_preserves_payload() {
        let mut coordinator = ready_coordinator();
        let meta = ParticipantMeta::default();

        let SubmitStart::Request(_) = coordinator.try_begin(&meta, Utc::now()) else {
            panic!("expected a request");
        };
        coordinator.finish(&Err(IncisionError::HttpStatus { status: 502 }));

        assert_eq!(coordinator.gate(), SubmitGate::Idle);
        assert!(coordinator.submit_enabled());
        assert!(coordinator.latest_payload().is_some());
        assert!(!coordinator.has_submitted());

        // Retry succeeds without any refresh in between.
        assert!(matches!(
            coordinator.try_begin(&meta, Utc::now()),
            SubmitStart::Request(_)
        ));
        coordinator.finish(&Ok(()));
        assert!(coordinator.has_submitted());
    }

    #[test]
    fn test_validation_never_builds_a_request() {
        let mut coordinator = SubmissionCoordinator::new(SubmissionConfig::default());
        coordinator.refresh(
            Some(&clip()),
            Some(&frame()),
            &two_lines(),
            2,
            &ParticipantIdentity::new("P07"),
            Utc::now(),
        );
        let start = coordinator.try_begin(&ParticipantMeta::default(), Utc::now());
        assert!(matches!(
            start,
            SubmitStart::NotEligible(Eligibility::EndpointMissing)
        ));
        assert_eq!(coordinator.gate(), SubmitGate::Idle);
    }

    #[test]
    fn test_body_with_wrapper_key() {
        let mut coordinator = ready_coordinator();
        let SubmitStart::Request(request) =
            coordinator.try_begin(&ParticipantMeta::default(), Utc::now())
        else {
            panic!("expected a request");
        };

        assert_eq!(request.method, "POST");
        assert_eq!(request.headers.get("Content-Type").unwrap(), "application/json");
        let annotation = &request.body["annotation"];
        assert_eq!(annotation["incisions"].as_array().unwrap().len(), 2);
        assert_eq!(annotation["filenameHint"], "P07_case-4.json");
        // Participant fields stay out of the root when wrapped.
        assert!(request.body.get("Name").is_none());
    }

    #[test]
    fn test_body_flattened_with_participant_and_extras() {
        let mut config = endpoint_config();
        config.body_wrapper = BodyWrapper::None;
        config
            .additional_fields
            .insert("study".to_string(), Value::String("cesarean-01".to_string()));

        let mut coordinator = SubmissionCoordinator::new(config);
        coordinator.refresh(
            Some(&clip()),
            Some(&frame()),
            &two_lines(),
            2,
            &ParticipantIdentity::new("P07"),
            Utc::now(),
        );
        let meta = ParticipantMeta {
            name: Some("Dr. Chen".to_string()),
            ..Default::default()
        };
        let SubmitStart::Request(request) = coordinator.try_begin(&meta, Utc::now()) else {
            panic!("expected a request");
        };

        assert_eq!(request.body["study"], "cesarean-01");
        assert_eq!(request.body["Name"], "Dr. Chen");
        assert_eq!(request.body["clipId"], "case-4");
        assert!(request.body.get("annotation").is_none());
    }

    #[test]
    fn test_csv_mirror_rides_along() {
        let mut config = endpoint_config();
        config.csv_mirror = true;
        let mut coordinator = SubmissionCoordinator::new(config);
        coordinator.refresh(
            Some(&clip()),
            Some(&frame()),
            &two_lines(),
            2,
            &ParticipantIdentity::new("P07"),
            Utc::now(),
        );
        let SubmitStart::Request(request) =
            coordinator.try_begin(&ParticipantMeta::default(), Utc::now())
        else {
            panic!("expected a request");
        };
        let csv = request.body["csv_form_data"].as_str().unwrap();
        assert!(csv.starts_with("Name,Institution,ClipID,Parkland,Nassar,SubmittedAt\n"));
        assert!(csv.contains("\"case-4\""));
    }

    #[test]
    fn test_refresh_resets_submitted_flag() {
        let mut coordinator = ready_coordinator();
        coordinator.try_begin(&ParticipantMeta::default(), Utc::now());
        coordinator.finish(&Ok(()));
        assert!(coordinator.has_submitted());

        coordinator.refresh(
            Some(&clip()),
            Some(&frame()),
            &two_lines(),
            2,
            &ParticipantIdentity::new("P07"),
            Utc::now(),
        );
        assert!(!coordinator.has_submitted());
    }
}
