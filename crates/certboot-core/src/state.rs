//! Enrollment state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a single enrollment run.
///
/// Runs move strictly forward through the states in declaration order; a
/// failure at any point ends the run instead of moving backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentState {
    /// Nothing done yet.
    #[default]
    Init,
    /// CA certificate and CRL fetched and validated.
    CaTrusted,
    /// The CA holds no signed certificate for this name.
    CheckedNoExistingCert,
    /// Key pair generated and persisted.
    KeyGenerated,
    /// CSR built and persisted.
    CsrBuilt,
    /// CSR sent to the CA.
    CsrSubmitted,
    /// Waiting for the CA to sign.
    Polling,
    /// Signed certificate persisted.
    Signed,
    /// The CA refused the request.
    Rejected,
    /// The wait budget ran out.
    TimedOut,
}

impl EnrollmentState {
    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Signed | Self::Rejected | Self::TimedOut)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use EnrollmentState::*;
        matches!(
            (self, next),
            (Init, CaTrusted)
                | (CaTrusted, CheckedNoExistingCert)
                | (CheckedNoExistingCert, KeyGenerated)
                | (KeyGenerated, CsrBuilt)
                | (CsrBuilt, CsrSubmitted)
                | (CsrSubmitted, Polling)
                | (CsrSubmitted, Rejected)
                | (Polling, Signed)
                | (Polling, TimedOut)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::CaTrusted => "CA_TRUSTED",
            Self::CheckedNoExistingCert => "CHECKED_NO_EXISTING_CERT",
            Self::KeyGenerated => "KEY_GENERATED",
            Self::CsrBuilt => "CSR_BUILT",
            Self::CsrSubmitted => "CSR_SUBMITTED",
            Self::Polling => "POLLING",
            Self::Signed => "SIGNED",
            Self::Rejected => "REJECTED",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
