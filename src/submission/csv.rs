//! Flattened CSV mirror of the submission.
//!
//! A secondary, best-effort view of a subset of fields for investigators
//! who consume a sheet instead of JSON: one header line and one
//! quoted-field row. It rides along inside the JSON body and never blocks
//! the primary submission.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::participant::ParticipantMeta;

/// Fixed column order of the mirror.
pub const CSV_HEADER: &str = "Name,Institution,ClipID,Parkland,Nassar,SubmittedAt";

/// Quote one CSV field, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Build the two-line `csv_form_data` string.
pub fn build_csv_form_data(
    meta: &ParticipantMeta,
    clip_id: &str,
    submitted_at: DateTime<Utc>,
) -> String {
    let row = [
        meta.name.as_deref().unwrap_or(""),
        meta.institution.as_deref().unwrap_or(""),
        clip_id,
        meta.parkland.as_deref().unwrap_or(""),
        meta.nassar.as_deref().unwrap_or(""),
        &submitted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
    .iter()
    .map(|field| quote(field))
    .collect::<Vec<_>>()
    .join(",");

    format!("{}\n{}", CSV_HEADER, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_header_and_row_shape() {
        let meta = ParticipantMeta {
            name: Some("Dr. Chen".to_string()),
            institution: Some("General Hospital".to_string()),
            parkland: Some("3".to_string()),
            ..Default::default()
        };
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let csv = build_csv_form_data(&meta, "case-4", at);

        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER);
        assert_eq!(
            lines.next().unwrap(),
            "\"Dr. Chen\",\"General Hospital\",\"case-4\",\"3\",\"\",\"2026-03-14T15:09:26Z\""
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let meta = ParticipantMeta {
            name: Some("Dr. \"Ace\" Chen".to_string()),
            ..Default::default()
        };
        let csv = build_csv_form_data(&meta, "c", Utc::now());
        assert!(csv.contains("\"Dr. \"\"Ace\"\" Chen\""));
    }
}
