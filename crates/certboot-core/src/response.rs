//! Classification of CA response bodies.

/// First line of a PEM-encoded certificate.
pub const CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";

const DUPLICATE_REQUEST_MARKER: &str = "already has a requested certificate";
const ALT_NAMES_MARKER: &str = "contains subject alternative names";
const DISALLOWED_MARKER: &str = "disallowed";

/// Returns true if a response body is a PEM certificate.
///
/// Only the start of the body is inspected; whatever follows the header is
/// irrelevant to the classification.
pub fn is_certificate_body(body: &str) -> bool {
    body.trim_start().starts_with(CERTIFICATE_HEADER)
}

/// Outcome of submitting a CSR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Empty body: the request was accepted.
    Success,
    /// An unsigned request for this name already exists on the CA.
    AlreadyPending(String),
    /// CA policy forbids subject alternative names.
    AltNamesDisallowed(String),
    /// Any other text. Treated as a warning; the CA may emit advisory text
    /// alongside an accepted request.
    OtherAdvisory(String),
}

impl SubmissionOutcome {
    /// Classify a submission response body.
    pub fn classify(body: &str) -> Self {
        let text = body.trim();
        if text.is_empty() {
            return Self::Success;
        }

        let lower = text.to_lowercase();
        if lower.contains(DUPLICATE_REQUEST_MARKER) {
            Self::AlreadyPending(text.to_string())
        } else if lower
            .find(ALT_NAMES_MARKER)
            .is_some_and(|at| lower[at..].contains(DISALLOWED_MARKER))
        {
            Self::AltNamesDisallowed(text.to_string())
        } else {
            Self::OtherAdvisory(text.to_string())
        }
    }
}
