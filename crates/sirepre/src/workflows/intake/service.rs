use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{IntakeSettings, RegistrantId, RegistrantRecord, RegistrationReceipt};
use super::receipt::{PlainTextReceiptRenderer, ReceiptRenderer, RenderError, RenderedReceipt};
use super::report::{self, ListingPage, ListingQuery, RegistrationStatistics};
use super::repository::{RegistrantRepository, RepositoryError, UploadStore};
use super::stations::StationCatalog;
use crate::workflows::registration::collaborators::{PortalStatusReport, SubmissionRequest};
use crate::workflows::registration::domain::{
    DocumentSlot, FileRef, UploadId, VerificationKey, MAX_DOCUMENT_BYTES,
};
use crate::workflows::registration::validation::{
    validate_document, validate_submission, FieldErrors, FormField,
};

const ACCEPTED_UPLOAD_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];

/// Server side of the registration call: intake, receipts, and admin views.
pub struct IntakeService<R, U> {
    repository: Arc<R>,
    uploads: Arc<U>,
    renderer: Arc<dyn ReceiptRenderer>,
    settings: IntakeSettings,
    stations: StationCatalog,
    sequence: AtomicU64,
}

impl<R, U> IntakeService<R, U>
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    pub fn new(repository: Arc<R>, uploads: Arc<U>, settings: IntakeSettings) -> Self {
        Self::with_renderer(
            repository,
            uploads,
            settings,
            Arc::new(PlainTextReceiptRenderer::default()),
        )
    }

    pub fn with_renderer(
        repository: Arc<R>,
        uploads: Arc<U>,
        settings: IntakeSettings,
        renderer: Arc<dyn ReceiptRenderer>,
    ) -> Self {
        Self {
            repository,
            uploads,
            renderer,
            settings,
            stations: StationCatalog::default(),
            sequence: AtomicU64::new(1),
        }
    }

    /// Check submitted polling stations against `stations`. Without a
    /// catalogue any station id is accepted.
    pub fn with_stations(mut self, stations: StationCatalog) -> Self {
        self.stations = stations;
        self
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    pub fn stations(&self) -> &StationCatalog {
        &self.stations
    }

    pub fn status(&self) -> PortalStatusReport {
        PortalStatusReport {
            active: self.settings.open,
            message: self.settings.closed_message.clone(),
        }
    }

    /// Whether the identity (national id + complement) is already registered.
    pub fn lookup(&self, key: &VerificationKey) -> Result<bool, IntakeServiceError> {
        if key.national_id.trim().is_empty() {
            let mut errors = FieldErrors::new();
            errors.insert(FormField::NationalId, "required");
            return Err(IntakeServiceError::Validation(errors));
        }
        Ok(self.repository.find_by_identity(key)?.is_some())
    }

    /// Store one document and return its id.
    pub fn upload(
        &self,
        name: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadId, IntakeServiceError> {
        let essence = media_type
            .trim()
            .parse::<mime::Mime>()
            .map(|parsed| parsed.essence_str().to_string())
            .map_err(|_| IntakeServiceError::UnsupportedMediaType(media_type.to_string()))?;
        if !ACCEPTED_UPLOAD_TYPES.contains(&essence.as_str()) {
            return Err(IntakeServiceError::UnsupportedMediaType(essence));
        }
        if bytes.is_empty() {
            return Err(IntakeServiceError::EmptyUpload);
        }
        let size = bytes.len() as u64;
        if size > MAX_DOCUMENT_BYTES {
            return Err(IntakeServiceError::PayloadTooLarge {
                size,
                limit: MAX_DOCUMENT_BYTES,
            });
        }

        let stored = self.uploads.store(name, &essence, bytes)?;
        info!(upload_id = stored.id.0, %essence, size, "document uploaded");
        Ok(stored.id)
    }

    /// Validate, de-duplicate, and store a finished registration.
    pub fn register(
        &self,
        request: SubmissionRequest,
    ) -> Result<RegistrationReceipt, IntakeServiceError> {
        self.register_at(request, Utc::now())
    }

    pub(crate) fn register_at(
        &self,
        request: SubmissionRequest,
        now: DateTime<Utc>,
    ) -> Result<RegistrationReceipt, IntakeServiceError> {
        if !self.settings.open {
            return Err(IntakeServiceError::Closed {
                message: self.settings.closed_message.clone(),
            });
        }

        let SubmissionRequest {
            verification,
            mut form,
            observation,
        } = request;

        form.normalize();
        let mut errors = validate_submission(&verification, &form)
            .err()
            .unwrap_or_default();
        if let Some(station) = form.polling_station {
            if !self.stations.is_empty() && !self.stations.contains(station) {
                errors.insert(
                    FormField::PollingStation,
                    format!("unknown polling station {station}"),
                );
            }
        }
        if !errors.is_empty() {
            warn!(national_id = %verification.national_id, fields = errors.len(), "registration failed validation");
            return Err(IntakeServiceError::Validation(errors));
        }

        if self.repository.find_by_identity(&verification)?.is_some() {
            info!(national_id = %verification.national_id, "duplicate registration refused");
            return Err(IntakeServiceError::Duplicate);
        }

        self.resolve_documents(&mut form.documents)?;

        let record = RegistrantRecord {
            id: RegistrantId(self.sequence.fetch_add(1, Ordering::Relaxed)),
            verification,
            form,
            observation: observation
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            registered_at: now,
        };

        let stored = match self.repository.insert(record) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => return Err(IntakeServiceError::Duplicate),
            Err(err) => return Err(err.into()),
        };

        info!(
            registrant_id = stored.id.0,
            national_id = %stored.verification.national_id,
            declined = stored.declined_designation(),
            "registration stored"
        );

        Ok(RegistrationReceipt {
            id: stored.id,
            full_name: stored.full_name(),
            receipt: stored.receipt_reference(),
        })
    }

    /// Store inline files and check that referenced uploads exist and fit their slot.
    fn resolve_documents(
        &self,
        documents: &mut BTreeMap<DocumentSlot, FileRef>,
    ) -> Result<(), IntakeServiceError> {
        let mut errors = FieldErrors::new();

        for (slot, file) in documents.iter_mut() {
            let field = FormField::Document(*slot);
            let stored_id = match &*file {
                FileRef::Uploaded(id) => {
                    match self.uploads.fetch(*id)? {
                        Some(stored) if slot.accepts(&stored.media_type) => {}
                        Some(stored) => errors.insert(
                            field,
                            format!("upload {} is '{}'", id.0, stored.media_type),
                        ),
                        None => errors.insert(field, format!("unknown upload id {}", id.0)),
                    }
                    continue;
                }
                FileRef::Local(local) => {
                    if let Err(rejection) = validate_document(*slot, local) {
                        errors.insert(field, rejection.to_string());
                        continue;
                    }
                    let Some(bytes) = local.content() else {
                        errors.insert(field, "file content missing; upload it again");
                        continue;
                    };
                    self.uploads
                        .store(&local.name, &local.media_type, bytes.to_vec())?
                        .id
                }
            };
            *file = FileRef::Uploaded(stored_id);
        }

        errors
            .into_result()
            .map_err(IntakeServiceError::Validation)
    }

    /// Render the receipt of the latest registration under `national_id`.
    pub fn receipt(&self, national_id: &str) -> Result<RenderedReceipt, IntakeServiceError> {
        let record = self
            .repository
            .find_by_national_id(national_id)?
            .ok_or_else(|| IntakeServiceError::NotFound(national_id.trim().to_string()))?;
        Ok(self.renderer.render(&record)?)
    }

    pub fn list(&self, query: &ListingQuery) -> Result<ListingPage, IntakeServiceError> {
        let records = self.repository.list()?;
        Ok(report::paginate(records, query))
    }

    pub fn export_csv<W: Write>(&self, writer: W) -> Result<(), IntakeServiceError> {
        let records = self.repository.list()?;
        report::write_csv(&records, writer)?;
        Ok(())
    }

    pub fn statistics(&self) -> Result<RegistrationStatistics, IntakeServiceError> {
        self.statistics_at(Utc::now())
    }

    pub fn statistics_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RegistrationStatistics, IntakeServiceError> {
        let records = self.repository.list()?;
        Ok(report::statistics(&records, now))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error("{message}")]
    Closed { message: String },
    #[error("registration failed validation on {} field(s)", .0.len())]
    Validation(FieldErrors),
    #[error("Ya existe un postulante con esta cédula de identidad y complemento")]
    Duplicate,
    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),
    #[error("upload is {size} bytes; the limit is {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
    #[error("upload is empty")]
    EmptyUpload,
    #[error("no registrant with national id {0}")]
    NotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}
