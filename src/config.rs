//! Pipeline configuration.
//!
//! Consolidates the submission endpoint settings and the tunable capture /
//! annotation parameters into typed structs validated up front, instead of
//! scattered host-provided values checked at the point of use.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Body wrapper
// ============================================================================

/// How the annotation payload is placed inside the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BodyWrapper {
    /// Flatten the payload fields directly into the body.
    None,
    /// Nest the payload under this key.
    Key(String),
}

impl Default for BodyWrapper {
    fn default() -> Self {
        Self::Key("annotation".to_string())
    }
}

impl From<String> for BodyWrapper {
    fn from(value: String) -> Self {
        match value.trim() {
            "none" => Self::None,
            "" => Self::default(),
            key => Self::Key(key.to_string()),
        }
    }
}

impl From<BodyWrapper> for String {
    fn from(value: BodyWrapper) -> Self {
        match value {
            BodyWrapper::None => "none".to_string(),
            BodyWrapper::Key(key) => key,
        }
    }
}

// ============================================================================
// Submission configuration
// ============================================================================

/// Static submission endpoint configuration supplied by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionConfig {
    /// Investigator endpoint URL. Submission stays disabled while unset.
    pub endpoint: Option<String>,

    /// HTTP method; empty means POST.
    pub method: String,

    /// Extra request headers. A `Content-Type` entry (any casing)
    /// suppresses the default `application/json`.
    pub headers: BTreeMap<String, String>,

    /// Where the annotation payload lands in the body.
    pub body_wrapper: BodyWrapper,

    /// Static fields merged into the body root.
    pub additional_fields: Map<String, Value>,

    /// Include the flattened `csv_form_data` mirror string in the body.
    pub csv_mirror: bool,
}

impl SubmissionConfig {
    /// True once an endpoint URL is present.
    pub fn has_endpoint(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Effective HTTP method.
    pub fn method(&self) -> &str {
        if self.method.trim().is_empty() {
            "POST"
        } else {
            &self.method
        }
    }

    /// Effective headers with the default content type applied unless the
    /// caller set one.
    pub fn effective_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        let has_content_type = headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        headers
    }
}

// ============================================================================
// Pipeline options
// ============================================================================

/// Tunable capture and annotation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Completed incision lines required before submission is eligible.
    pub required_line_count: usize,

    /// Trailing playback window (seconds) during which rolling capture
    /// attempts fire on the visible element.
    pub rolling_window_secs: f64,

    /// Back-off from the stream duration for the fallback seek target.
    pub fallback_epsilon_secs: f64,

    /// Run a hidden helper decode of the same source dedicated to
    /// seek-and-capture, leaving the visible element free to play.
    pub use_helper_source: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            required_line_count: 2,
            rolling_window_secs: 0.25,
            fallback_epsilon_secs: 0.1,
            use_helper_source: false,
        }
    }
}

impl PipelineOptions {
    /// Clamp settings to sane ranges.
    pub fn validate(&mut self) {
        self.required_line_count = self.required_line_count.clamp(1, 8);
        self.rolling_window_secs = self.rolling_window_secs.clamp(0.05, 1.0);
        self.fallback_epsilon_secs = self.fallback_epsilon_secs.clamp(0.01, 0.5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_wrapper_parsing() {
        assert_eq!(BodyWrapper::from("none".to_string()), BodyWrapper::None);
        assert_eq!(
            BodyWrapper::from("".to_string()),
            BodyWrapper::Key("annotation".to_string())
        );
        assert_eq!(
            BodyWrapper::from("incisionReport".to_string()),
            BodyWrapper::Key("incisionReport".to_string())
        );
    }

    #[test]
    fn test_has_endpoint() {
        let mut config = SubmissionConfig::default();
        assert!(!config.has_endpoint());
        config.endpoint = Some("  ".to_string());
        assert!(!config.has_endpoint());
        config.endpoint = Some("https://collector.example/submit".to_string());
        assert!(config.has_endpoint());
    }

    #[test]
    fn test_default_method_is_post() {
        let config = SubmissionConfig::default();
        assert_eq!(config.method(), "POST");
    }

    #[test]
    fn test_default_content_type_applied() {
        let config = SubmissionConfig::default();
        let headers = config.effective_headers();
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
    }

    #[test]
    fn test_caller_content_type_wins() {
        let mut config = SubmissionConfig::default();
        config
            .headers
            .insert("content-type".to_string(), "text/plain".to_string());
        let headers = config.effective_headers();
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert!(!headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_options_validate_clamps() {
        let mut options = PipelineOptions {
            required_line_count: 0,
            rolling_window_secs: 5.0,
            fallback_epsilon_secs: 0.0,
            use_helper_source: true,
        };
        options.validate();
        assert_eq!(options.required_line_count, 1);
        assert_eq!(options.rolling_window_secs, 1.0);
        assert_eq!(options.fallback_epsilon_secs, 0.01);
    }

    #[test]
    fn test_config_deserializes_from_host_json() {
        let config: SubmissionConfig = serde_json::from_str(
            r#"{
                "endpoint": "https://collector.example/submit",
                "bodyWrapper": "none",
                "additionalFields": {"study": "cesarean-01"},
                "csvMirror": true
            }"#,
        )
        .unwrap();
        assert!(config.has_endpoint());
        assert_eq!(config.body_wrapper, BodyWrapper::None);
        assert_eq!(config.additional_fields["study"], "cesarean-01");
        assert!(config.csv_mirror);
    }
}
