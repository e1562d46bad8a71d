//! Ports the registration flow calls out to.
//!
//! Each collaborator is a separate trait so adapters can be swapped one at a
//! time; [`RegistrationBackend`] bundles them for the flow.

use serde::{Deserialize, Serialize};

use super::domain::{ApplicantForm, LocalFile, ReceiptReference, UploadId, VerificationKey};

/// Failure to get an answer from a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("{0}")]
    Failed(String),
}

/// Result of a duplicate lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOutcome {
    pub found: bool,
}

pub trait DuplicateCheck: Send + Sync {
    fn lookup(&self, key: &VerificationKey) -> Result<LookupOutcome, CollaboratorError>;
}

/// Finished form as handed to the submission collaborator.
///
/// Slots holding a pending local file travel as attachments; slots holding an
/// upload id travel by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub verification: VerificationKey,
    pub form: ApplicantForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Duplicate,
    Other,
}

impl RejectionKind {
    /// Classify a rejection from a server that sends only free text.
    ///
    /// Matches the wording older deployments use for duplicates. A message
    /// that merely mentions the identity card is classified as a duplicate too,
    /// so prefer the structured kind whenever the server sends one.
    pub fn from_legacy_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if ["ya existe", "cedula", "cédula"]
            .iter()
            .any(|needle| lowered.contains(needle))
        {
            RejectionKind::Duplicate
        } else {
            RejectionKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Accepted {
        receipt: ReceiptReference,
    },
    Rejected {
        kind: RejectionKind,
        message: String,
    },
}

pub trait SubmissionGateway: Send + Sync {
    fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome, CollaboratorError>;
}

/// Per-slot upload; slots do not block one another.
pub trait FileUploader: Send + Sync {
    fn upload(&self, file: &LocalFile) -> Result<UploadId, CollaboratorError>;
}

/// Notice shown when a closed portal does not say why.
pub const DEFAULT_CLOSED_MESSAGE: &str = "El sistema de postulación se ha cerrado.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalStatusReport {
    pub active: bool,
    #[serde(default)]
    pub message: String,
}

pub trait PortalStatus: Send + Sync {
    fn status(&self) -> Result<PortalStatusReport, CollaboratorError>;
}

/// Every collaborator the flow needs, implemented by one adapter.
pub trait RegistrationBackend: DuplicateCheck + SubmissionGateway + FileUploader + PortalStatus {}

impl<T> RegistrationBackend for T where
    T: DuplicateCheck + SubmissionGateway + FileUploader + PortalStatus
{
}
