//! Per-record outcomes of one parse call.

use serde::Serialize;
use std::collections::BTreeMap;

/// Prefix of the notice emitted for a freshly allocated identity.
pub const ASSIGNED_IDENTITY: &str = "The record was assigned the identity";

/// Informational outcome: the record committed under an allocated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// `"The record was assigned the identity <id>"`
    pub message: String,
    /// The identity the record was committed under.
    pub assigned_identity: String,
    /// What the document asked for (absent or blank).
    pub requested_identity: Option<String>,
}

impl Notice {
    /// Notice for a freshly allocated identity.
    #[must_use]
    pub fn assigned(assigned_identity: String, requested_identity: Option<String>) -> Self {
        Self {
            message: format!("{ASSIGNED_IDENTITY} {assigned_identity}"),
            assigned_identity,
            requested_identity,
        }
    }
}

/// Failed outcome: the record was not committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Human readable reason, e.g. `"Validation failed: Status can't be blank"`.
    pub reason: String,
    /// What the document asked for.
    pub requested_identity: Option<String>,
}

/// Outcomes keyed by 1-based record sequence number.
///
/// A sequence number appears in at most one of the two maps. Records that
/// committed under their requested identity appear in neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records committed under an allocated identity.
    pub messages: BTreeMap<u32, Notice>,
    /// Records that were not committed.
    pub errors: BTreeMap<u32, Failure>,
}

impl IngestReport {
    /// Record a success. Only freshly allocated identities produce a notice.
    pub fn record_success(
        &mut self,
        sequence: u32,
        identity: String,
        freshly_allocated: bool,
        requested_identity: Option<String>,
    ) {
        self.errors.remove(&sequence);
        if freshly_allocated {
            self.messages
                .insert(sequence, Notice::assigned(identity, requested_identity));
        }
    }

    /// Record a failure.
    pub fn record_failure(
        &mut self,
        sequence: u32,
        reason: impl ToString,
        requested_identity: Option<String>,
    ) {
        self.messages.remove(&sequence);
        self.errors.insert(
            sequence,
            Failure {
                reason: reason.to_string(),
                requested_identity,
            },
        );
    }

    /// `true` when no record failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of sequence numbers with an entry in either map.
    #[must_use]
    pub fn total(&self) -> usize {
        self.messages.len() + self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_success_leaves_no_entry() {
        let mut report = IngestReport::default();
        report.record_success(1, "abcd".to_string(), false, Some("abcd".to_string()));
        assert_eq!(report.total(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn allocation_produces_a_notice() {
        let mut report = IngestReport::default();
        report.record_success(2, "f00d".to_string(), true, None);
        let notice = &report.messages[&2];
        assert_eq!(notice.message, "The record was assigned the identity f00d");
        assert_eq!(notice.requested_identity, None);
    }

    #[test]
    fn a_sequence_lives_in_one_map_only() {
        let mut report = IngestReport::default();
        report.record_success(1, "x".to_string(), true, None);
        report.record_failure(1, "Validation failed: Status can't be blank", None);
        assert!(report.messages.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn serializes_with_sequence_keys() {
        let mut report = IngestReport::default();
        report.record_failure(3, "boom", Some("abcd".to_string()));
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert_eq!(json["errors"]["3"]["reason"], "boom");
        assert_eq!(json["errors"]["3"]["requested_identity"], "abcd");
    }
}
