//! Applicant-side registration flow.
//!
//! Drives an applicant through `start → personal → additional → confirmation →
//! review` and into one of the terminal steps, validating each step locally and
//! talking to the intake backend through the traits in [`collaborators`].
//! In-progress state survives restarts through [`persistence`].

pub mod collaborators;
pub mod domain;
pub mod flow;
pub mod persistence;
pub mod validation;

#[cfg(test)]
mod tests;

pub use collaborators::{
    CollaboratorError, DuplicateCheck, FileUploader, LookupOutcome, PortalStatus,
    PortalStatusReport, RegistrationBackend, RejectionKind, SubmissionGateway, SubmissionOutcome,
    SubmissionRequest, DEFAULT_CLOSED_MESSAGE,
};
pub use domain::{
    ApplicantForm, Declaration, Declarations, DocumentSlot, EducationLevel, FileRef,
    GeneralExperience, IssuingAuthority, LocalFile, Position, ReceiptReference, Step, UploadId,
    VerificationKey, MAX_DOCUMENT_BYTES,
};
pub use flow::{
    plan, FlowAction, FlowError, Plan, PortalSession, RegistrationFlow, SlotUpdate,
    DECLINE_OBSERVATION,
};
pub use persistence::{
    FileSnapshotStore, MemorySnapshotStore, PersistedSnapshot, SnapshotPersistence,
    SnapshotStore, StoreError, STORAGE_KEY,
};
pub use validation::{DocumentRejection, FieldErrors, FormField};
