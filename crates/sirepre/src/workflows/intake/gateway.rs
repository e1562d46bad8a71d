//! In-process adapter letting the registration flow run against the intake service.

use super::repository::{RegistrantRepository, RepositoryError, UploadStore};
use super::service::{IntakeService, IntakeServiceError};
use crate::workflows::registration::collaborators::{
    CollaboratorError, DuplicateCheck, FileUploader, LookupOutcome, PortalStatus,
    PortalStatusReport, RejectionKind, SubmissionGateway, SubmissionOutcome, SubmissionRequest,
};
use crate::workflows::registration::domain::{LocalFile, UploadId, VerificationKey};

impl From<IntakeServiceError> for CollaboratorError {
    fn from(err: IntakeServiceError) -> Self {
        match err {
            IntakeServiceError::Repository(RepositoryError::Unavailable(reason)) => {
                CollaboratorError::Unreachable(reason)
            }
            other => CollaboratorError::Failed(other.to_string()),
        }
    }
}

impl<R, U> DuplicateCheck for IntakeService<R, U>
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    fn lookup(&self, key: &VerificationKey) -> Result<LookupOutcome, CollaboratorError> {
        let found = IntakeService::lookup(self, key)?;
        Ok(LookupOutcome { found })
    }
}

impl<R, U> SubmissionGateway for IntakeService<R, U>
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome, CollaboratorError> {
        match self.register(request) {
            Ok(receipt) => Ok(SubmissionOutcome::Accepted {
                receipt: receipt.receipt,
            }),
            Err(IntakeServiceError::Duplicate) => Ok(SubmissionOutcome::Rejected {
                kind: RejectionKind::Duplicate,
                message: IntakeServiceError::Duplicate.to_string(),
            }),
            Err(IntakeServiceError::Repository(RepositoryError::Unavailable(reason))) => {
                Err(CollaboratorError::Unreachable(reason))
            }
            Err(other) => Ok(SubmissionOutcome::Rejected {
                kind: RejectionKind::Other,
                message: other.to_string(),
            }),
        }
    }
}

impl<R, U> FileUploader for IntakeService<R, U>
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    fn upload(&self, file: &LocalFile) -> Result<UploadId, CollaboratorError> {
        let bytes = file.content().ok_or_else(|| {
            CollaboratorError::Failed(format!("{} has no content to upload", file.name))
        })?;
        Ok(IntakeService::upload(
            self,
            &file.name,
            &file.media_type,
            bytes.to_vec(),
        )?)
    }
}

impl<R, U> PortalStatus for IntakeService<R, U>
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    fn status(&self) -> Result<PortalStatusReport, CollaboratorError> {
        Ok(IntakeService::status(self))
    }
}
