use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::RegistrantRecord;
use super::repository::{RegistrantRepository, RepositoryError, StoredUpload, UploadStore};
use crate::workflows::registration::domain::{UploadId, VerificationKey};

fn poisoned(what: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("{what} mutex poisoned"))
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRegistrantRepository {
    records: Arc<Mutex<Vec<RegistrantRecord>>>,
}

impl InMemoryRegistrantRepository {
    fn records(&self) -> Result<MutexGuard<'_, Vec<RegistrantRecord>>, RepositoryError> {
        self.records.lock().map_err(|_| poisoned("repository"))
    }
}

impl RegistrantRepository for InMemoryRegistrantRepository {
    fn insert(&self, record: RegistrantRecord) -> Result<RegistrantRecord, RepositoryError> {
        let mut guard = self.records()?;
        if guard
            .iter()
            .any(|existing| existing.verification.same_identity(&record.verification))
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn find_by_identity(
        &self,
        key: &VerificationKey,
    ) -> Result<Option<RegistrantRecord>, RepositoryError> {
        let guard = self.records()?;
        Ok(guard
            .iter()
            .find(|record| record.verification.same_identity(key))
            .cloned())
    }

    fn find_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<RegistrantRecord>, RepositoryError> {
        let national_id = national_id.trim();
        let guard = self.records()?;
        Ok(guard
            .iter()
            .filter(|record| record.verification.national_id.trim() == national_id)
            .max_by_key(|record| (record.registered_at, record.id))
            .cloned())
    }

    fn list(&self) -> Result<Vec<RegistrantRecord>, RepositoryError> {
        Ok(self.records()?.clone())
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryUploadStore {
    uploads: Arc<Mutex<HashMap<UploadId, StoredUpload>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for InMemoryUploadStore {
    fn default() -> Self {
        Self {
            uploads: Arc::default(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl InMemoryUploadStore {
    pub fn len(&self) -> usize {
        self.uploads.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UploadStore for InMemoryUploadStore {
    fn store(
        &self,
        name: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredUpload, RepositoryError> {
        let id = UploadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let upload = StoredUpload {
            id,
            name: name.to_string(),
            media_type: media_type.to_string(),
            bytes,
            uploaded_at: Utc::now(),
        };
        self.uploads
            .lock()
            .map_err(|_| poisoned("upload store"))?
            .insert(id, upload.clone());
        Ok(upload)
    }

    fn fetch(&self, id: UploadId) -> Result<Option<StoredUpload>, RepositoryError> {
        let guard = self.uploads.lock().map_err(|_| poisoned("upload store"))?;
        Ok(guard.get(&id).cloned())
    }
}
