//! Clip registry and source diagnostics.
//!
//! The registry is an ordered list of study clips plus an optional ad-hoc
//! clip injected by the host (e.g. from a survey query parameter). Source
//! diagnostics classify a failing clip URL so the load-error message can
//! point at the usual misconfigurations instead of a generic failure.

use serde::{Deserialize, Serialize};

/// Reserved id for the host-injected ad-hoc clip.
pub const INJECTED_CLIP_ID: &str = "survey-param";

/// A single study clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,
    pub label: String,
    pub src: String,
    #[serde(default)]
    pub poster: Option<String>,
}

impl Clip {
    pub fn new(id: &str, label: &str, src: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            src: src.to_string(),
            poster: None,
        }
    }
}

/// Ordered collection of selectable clips.
#[derive(Debug, Clone, Default)]
pub struct ClipRegistry {
    clips: Vec<Clip>,
}

impl ClipRegistry {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self { clips }
    }

    /// Prepend a host-injected ad-hoc clip so it becomes the default
    /// selection.
    pub fn with_injected(mut self, src: &str) -> Self {
        self.clips.insert(0, Clip::new(INJECTED_CLIP_ID, "Embedded Clip", src));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn first(&self) -> Option<&Clip> {
        self.clips.first()
    }

    pub fn resolve(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }
}

// ============================================================================
// Source diagnostics
// ============================================================================

/// Classification of a failing clip source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDiagnosis {
    /// Looks like a local filesystem path rather than a hosted URL.
    LocalPath,
    /// Looks like a repository-viewer page URL, not a raw media URL.
    RepositoryPage,
    /// No recognizable misconfiguration pattern.
    Unknown,
}

impl SourceDiagnosis {
    /// Inspect a source string for common misconfiguration patterns.
    pub fn classify(src: &str) -> Self {
        let lower = src.to_lowercase();
        let is_local = lower.starts_with("file:")
            || lower.starts_with("/users/")
            || lower.starts_with("c:\\")
            || lower.starts_with("\\\\");
        if is_local {
            return Self::LocalPath;
        }
        if lower.contains("github.com/") && (lower.contains("/blob/") || lower.contains("/tree/"))
        {
            return Self::RepositoryPage;
        }
        Self::Unknown
    }

    /// Tailored guidance appended to the clip-load-error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LocalPath => Some(
                "this looks like a local file path. Upload the video to your hosting \
                 provider (e.g., GitHub Pages, CDN) and reference the hosted HTTPS URL \
                 instead.",
            ),
            Self::RepositoryPage => Some(
                "this looks like a repository page URL, not a direct media URL. Use the \
                 raw file URL or a media host that serves the video bytes directly.",
            ),
            Self::Unknown => None,
        }
    }
}

/// Build the full user-facing clip-load-error message for a source.
pub fn load_error_message(src: &str) -> String {
    let mut message = format!(
        "Clip failed to load. Check that the src URL is correct and publicly accessible. \
         (Configured source: {})",
        src
    );
    if let Some(hint) = SourceDiagnosis::classify(src).hint() {
        message.push_str(" - ");
        message.push_str(hint);
    }
    message
}
