//! certboot enrollment agent.
//!
//! Bootstraps a host identity from a Puppet CA: trusts the CA certificate on
//! first use, fetches the CRL, generates a key pair and CSR, submits it, and
//! polls until the CA signs it. The resulting SSL directory is the standard
//! layout other agents expect.

pub mod artifacts;
pub mod client;
pub mod enroll;
pub mod error;
pub mod pki;
pub mod retry;
pub mod trust;
pub mod waiter;

pub use client::{CaApi, CaResponse, HttpCaClient};
pub use enroll::{Enrollment, EnrollmentReport};
pub use error::TransportError;
pub use trust::TrustAnchor;
pub use waiter::{TokioWaiter, Waiter};
