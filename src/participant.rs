//! Participant identity and study metadata.
//!
//! Identity gates submission eligibility; the metadata fields are
//! free-text study context (read by the host from form inputs or query
//! parameters) that travel alongside the annotation payload. Nothing here
//! is validated beyond trimming.

use serde::{Deserialize, Serialize};

/// Participant identity required for submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantIdentity {
    id: String,
}

impl ParticipantIdentity {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.trim().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Non-empty after trimming.
    pub fn is_present(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Free-text participant metadata merged into the request body.
///
/// Wire keys are PascalCase to match the investigator-side sheet columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantMeta {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Institution", skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(rename = "Specialty", skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(rename = "Board", skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    #[serde(rename = "Practice", skip_serializing_if = "Option::is_none")]
    pub practice: Option<String>,
    #[serde(rename = "Volume", skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Optional pre-scored field passed through from upstream.
    #[serde(rename = "Parkland", skip_serializing_if = "Option::is_none")]
    pub parkland: Option<String>,
    /// Optional pre-scored field passed through from upstream.
    #[serde(rename = "Nassar", skip_serializing_if = "Option::is_none")]
    pub nassar: Option<String>,
}

impl ParticipantMeta {
    /// Trim every field and drop the ones that end up empty.
    pub fn trimmed(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.institution,
            &mut self.specialty,
            &mut self.board,
            &mut self.practice,
            &mut self.volume,
            &mut self.parkland,
            &mut self.nassar,
        ] {
            if let Some(value) = field.take() {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    *field = Some(value);
                }
            }
        }
        self
    }
}
