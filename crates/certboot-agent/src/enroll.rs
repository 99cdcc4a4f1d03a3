//! The enrollment state machine.
//!
//! ```text
//! INIT -> CA_TRUSTED -> CHECKED_NO_EXISTING_CERT -> KEY_GENERATED -> CSR_BUILT
//!      -> CSR_SUBMITTED -> POLLING -> SIGNED | TIMED_OUT
//!                       \-> REJECTED
//! ```
//!
//! Every failure ends the run. Artifacts written before the failure are kept
//! so the stuck state can be inspected; a rerun for the same name then stops
//! at the pre-flight collision check.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use certboot_core::{
    is_certificate_body, san_extension_value, EnrollError, EnrollmentConfig, EnrollmentState,
    SslLayout, SubmissionOutcome, CERTIFICATE_HEADER,
};

use crate::artifacts::{self, PRIVATE_MODE, PUBLIC_MODE};
use crate::client::CaApi;
use crate::pki;
use crate::trust::{self, TrustAnchor};
use crate::waiter::Waiter;

/// Result of a successful enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReport {
    pub certname: String,
    pub certificate_path: PathBuf,
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_after: Option<DateTime<Utc>>,
    /// Number of requests made for the signed certificate.
    pub polls: u32,
    /// Seconds spent waiting between polls.
    pub waited_secs: u64,
}

/// Drives one enrollment run against a CA.
pub struct Enrollment<C, W> {
    config: EnrollmentConfig,
    layout: SslLayout,
    ca: C,
    waiter: W,
    state: EnrollmentState,
}

/// What was generated locally for this run.
struct Identity {
    csr_pem: String,
    /// subjectPublicKey bits of the generated key.
    public_key: Vec<u8>,
}

struct Polled {
    body: String,
    polls: u32,
    waited_secs: u64,
}

impl<C, W> Enrollment<C, W>
where
    C: CaApi,
    W: Waiter,
{
    pub fn new(config: EnrollmentConfig, ca: C, waiter: W) -> Self {
        let layout = SslLayout::new(&config.ssl_root, &config.certname);
        Self {
            config,
            layout,
            ca,
            waiter,
            state: EnrollmentState::Init,
        }
    }

    /// Current state of the run.
    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    /// Run the enrollment to completion.
    pub async fn run(&mut self) -> Result<EnrollmentReport, EnrollError> {
        info!(
            certname = %self.config.certname,
            ca = %self.config.ca_base_url(),
            ssl_root = %self.config.ssl_root.display(),
            "Starting certificate enrollment"
        );

        self.layout.ensure_directories()?;

        let anchor = trust::bootstrap_trust(&mut self.ca, &self.layout).await?;
        self.advance(EnrollmentState::CaTrusted)?;
        log_anchor(&anchor);

        self.check_not_enrolled().await?;
        self.advance(EnrollmentState::CheckedNoExistingCert)?;

        let identity = self.generate_identity()?;

        self.submit(&identity.csr_pem).await?;

        self.advance(EnrollmentState::Polling)?;
        let polled = self.poll_for_certificate().await?;

        let path = self.layout.certificate();
        artifacts::write_replace(&path, &polled.body, PUBLIC_MODE)?;

        let report = self.validate_certificate(&identity, polled)?;
        self.advance(EnrollmentState::Signed)?;
        info!(
            certname = %report.certname,
            subject = %report.subject,
            issuer = %report.issuer,
            serial = %report.serial,
            not_after = ?report.not_after,
            path = %report.certificate_path.display(),
            "Certificate enrollment complete"
        );
        Ok(report)
    }

    fn advance(&mut self, next: EnrollmentState) -> Result<(), EnrollError> {
        if !self.state.can_transition_to(next) {
            return Err(EnrollError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %self.state, to = %next, "Enrollment state transition");
        self.state = next;
        Ok(())
    }

    /// Refuse to enroll a name the CA has already signed.
    async fn check_not_enrolled(&self) -> Result<(), EnrollError> {
        let certname = &self.config.certname;
        let response = self
            .ca
            .fetch_certificate(certname)
            .await
            .map_err(|e| EnrollError::CaUnreachable {
                operation: "check existing certificate",
                message: e.to_string(),
            })?;

        if is_certificate_body(&response.body) {
            return Err(EnrollError::AlreadyEnrolled {
                certname: certname.clone(),
            });
        }

        debug!(certname = %certname, status = response.status, "No signed certificate on the CA");
        Ok(())
    }

    /// Generate and persist the key pair and CSR.
    fn generate_identity(&mut self) -> Result<Identity, EnrollError> {
        // Checked up front so a collision never leaves a half-written identity.
        self.layout.ensure_no_identity_artifacts()?;

        info!(certname = %self.config.certname, "Generating RSA 4096 key pair");
        let key_pair = pki::generate_key_pair()?;
        let public_key = pki::public_key_bits(&key_pair);
        artifacts::write_new(&self.layout.private_key(), &key_pair.serialize_pem(), PRIVATE_MODE)?;
        artifacts::write_new(&self.layout.public_key(), &key_pair.public_key_pem(), PUBLIC_MODE)?;
        self.advance(EnrollmentState::KeyGenerated)?;

        let csr_pem = pki::build_csr(&key_pair, &self.config.certname, &self.config.dns_alt_names)?;
        artifacts::write_new(&self.layout.certificate_request(), &csr_pem, PUBLIC_MODE)?;
        self.advance(EnrollmentState::CsrBuilt)?;

        let alt_names = san_extension_value(&self.config.dns_alt_names)
            .unwrap_or_else(|| "none".to_string());
        info!(
            certname = %self.config.certname,
            subject_alt_names = %alt_names,
            path = %self.layout.certificate_request().display(),
            "Certificate request created"
        );
        Ok(Identity {
            csr_pem,
            public_key,
        })
    }

    async fn submit(&mut self, csr_pem: &str) -> Result<(), EnrollError> {
        let certname = self.config.certname.clone();
        let response = self
            .ca
            .submit_csr(&certname, csr_pem)
            .await
            .map_err(|e| EnrollError::CaUnreachable {
                operation: "submit certificate request",
                message: e.to_string(),
            })?;
        self.advance(EnrollmentState::CsrSubmitted)?;

        let outcome = match SubmissionOutcome::classify(&response.body) {
            SubmissionOutcome::Success if !response.is_success() => {
                SubmissionOutcome::OtherAdvisory(format!("HTTP {} with an empty body", response.status))
            }
            outcome => outcome,
        };

        match outcome {
            SubmissionOutcome::Success => {
                info!(certname = %certname, "Certificate request accepted");
                Ok(())
            }
            SubmissionOutcome::OtherAdvisory(message) => {
                // Unrecognised text may hide a CA-side failure; polling will
                // time out in that case.
                warn!(
                    certname = %certname,
                    status = response.status,
                    message = %message,
                    "CA returned unexpected text for the certificate request, continuing"
                );
                Ok(())
            }
            SubmissionOutcome::AlreadyPending(message) => {
                self.advance(EnrollmentState::Rejected)?;
                Err(EnrollError::DuplicatePendingRequest { certname, message })
            }
            SubmissionOutcome::AltNamesDisallowed(message) => {
                self.advance(EnrollmentState::Rejected)?;
                Err(EnrollError::AltNamesRejected { certname, message })
            }
        }
    }

    /// Poll until the CA returns a certificate or the wait budget is spent.
    /// A zero budget still polls once.
    async fn poll_for_certificate(&mut self) -> Result<Polled, EnrollError> {
        let certname = self.config.certname.clone();
        let timeout = self.config.wait_timeout_secs;
        let interval = self.config.poll_interval();
        let mut waited_secs = 0u64;
        let mut polls = 0u32;

        loop {
            polls += 1;
            let response = self
                .ca
                .fetch_certificate(&certname)
                .await
                .map_err(|e| EnrollError::CaUnreachable {
                    operation: "poll signed certificate",
                    message: e.to_string(),
                })?;

            if is_certificate_body(&response.body) {
                info!(certname = %certname, polls, waited_secs, "Signed certificate received");
                return Ok(Polled {
                    body: response.body.trim_start().to_string(),
                    polls,
                    waited_secs,
                });
            }

            if waited_secs >= timeout {
                self.advance(EnrollmentState::TimedOut)?;
                return Err(EnrollError::EnrollmentTimeout {
                    certname,
                    waited_secs,
                });
            }

            info!(
                certname = %certname,
                status = response.status,
                waited_secs,
                timeout_secs = timeout,
                "Certificate not signed yet, waiting {}s", interval.as_secs()
            );
            self.waiter.wait(interval).await;
            waited_secs += interval.as_secs();
        }
    }

    /// Re-read the persisted certificate and make sure it is usable and
    /// issued for the key generated in this run.
    fn validate_certificate(
        &self,
        identity: &Identity,
        polled: Polled,
    ) -> Result<EnrollmentReport, EnrollError> {
        let path = self.layout.certificate();
        let written = artifacts::read(&path)?;

        if !written.starts_with(CERTIFICATE_HEADER) {
            return Err(EnrollError::InvalidCertificate {
                path,
                reason: "file does not begin with a PEM certificate header".to_string(),
            });
        }

        let certs = pki::parse_certificates(&written)
            .map_err(|reason| EnrollError::InvalidCertificate {
                path: path.clone(),
                reason,
            })?;
        let leaf = certs.into_iter().next().ok_or_else(|| EnrollError::InvalidCertificate {
            path: path.clone(),
            reason: "no certificate found".to_string(),
        })?;

        if leaf.public_key != identity.public_key {
            return Err(EnrollError::InvalidCertificate {
                path,
                reason: format!(
                    "certificate '{}' was not issued for the generated private key",
                    leaf.subject
                ),
            });
        }

        Ok(EnrollmentReport {
            certname: self.config.certname.clone(),
            certificate_path: path,
            subject: leaf.subject,
            issuer: leaf.issuer,
            serial: leaf.serial,
            not_after: leaf.not_after,
            polls: polled.polls,
            waited_secs: polled.waited_secs,
        })
    }
}

fn log_anchor(anchor: &TrustAnchor) {
    debug!(
        ca_certificates = anchor.ca_certificates.len(),
        crls = anchor.crls.len(),
        "Trust anchor established"
    );
}
