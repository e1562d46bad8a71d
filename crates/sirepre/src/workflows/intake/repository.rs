use chrono::{DateTime, Utc};

use super::domain::RegistrantRecord;
use crate::workflows::registration::domain::{UploadId, VerificationKey};

/// Storage abstraction for registrants so the service can be exercised in isolation.
pub trait RegistrantRepository: Send + Sync {
    /// Store a new record; fails with [`RepositoryError::Conflict`] when the
    /// identity is already registered.
    fn insert(&self, record: RegistrantRecord) -> Result<RegistrantRecord, RepositoryError>;
    fn find_by_identity(
        &self,
        key: &VerificationKey,
    ) -> Result<Option<RegistrantRecord>, RepositoryError>;
    /// Most recent registration under a national id, whatever its complement.
    fn find_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<RegistrantRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<RegistrantRecord>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub id: UploadId,
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

/// Blob storage for uploaded documents.
pub trait UploadStore: Send + Sync {
    fn store(
        &self,
        name: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredUpload, RepositoryError>;
    fn fetch(&self, id: UploadId) -> Result<Option<StoredUpload>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
