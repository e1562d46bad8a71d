use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::intake::domain::{IntakeSettings, RegistrantRecord};
use crate::workflows::intake::memory::{InMemoryRegistrantRepository, InMemoryUploadStore};
use crate::workflows::intake::repository::{
    RegistrantRepository, RepositoryError, StoredUpload, UploadStore,
};
use crate::workflows::intake::service::IntakeService;
use crate::workflows::intake::stations::StationCatalog;
use crate::workflows::registration::collaborators::SubmissionRequest;
use crate::workflows::registration::domain::{
    ApplicantForm, Declarations, DocumentSlot, EducationLevel, FileRef, GeneralExperience,
    IssuingAuthority, LocalFile, Position, UploadId, VerificationKey,
};

pub(super) type MemoryService = IntakeService<InMemoryRegistrantRepository, InMemoryUploadStore>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryRegistrantRepository>,
    Arc<InMemoryUploadStore>,
) {
    build_service_with(IntakeSettings::default())
}

pub(super) fn build_service_with(
    settings: IntakeSettings,
) -> (
    MemoryService,
    Arc<InMemoryRegistrantRepository>,
    Arc<InMemoryUploadStore>,
) {
    let repository = Arc::new(InMemoryRegistrantRepository::default());
    let uploads = Arc::new(InMemoryUploadStore::default());
    let service = IntakeService::new(repository.clone(), uploads.clone(), settings);
    (service, repository, uploads)
}

pub(super) fn closed_settings() -> IntakeSettings {
    IntakeSettings {
        open: false,
        closed_message: "Convocatoria cerrada".to_string(),
    }
}

pub(super) fn key(national_id: &str) -> VerificationKey {
    VerificationKey::new(national_id, "", Some(IssuingAuthority::LaPaz))
}

pub(super) fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4 test".to_vec()
}

/// Upload the three mandatory documents and return a form referencing them.
pub(super) fn form_with_uploads(service: &MemoryService) -> ApplicantForm {
    let identity = service
        .upload("ci.pdf", "application/pdf", pdf_bytes())
        .expect("ci upload");
    let screenshot = service
        .upload("yo-participo.png", "image/png", vec![0x89, b'P', b'N', b'G'])
        .expect("screenshot upload");
    let curriculum = service
        .upload("cv.pdf", "application/pdf", pdf_bytes())
        .expect("cv upload");

    let mut form = base_form();
    form.set_document(DocumentSlot::IdentityCard, Some(FileRef::Uploaded(identity)));
    form.set_document(
        DocumentSlot::ParticipationScreenshot,
        Some(FileRef::Uploaded(screenshot)),
    );
    form.set_document(DocumentSlot::Curriculum, Some(FileRef::Uploaded(curriculum)));
    form
}

/// Valid form without documents.
pub(super) fn base_form() -> ApplicantForm {
    ApplicantForm {
        first_name: "Ana".to_string(),
        paternal_surname: "Quispe".to_string(),
        maternal_surname: "Mamani".to_string(),
        birth_date: Some(NaiveDate::from_ymd_opt(1995, 4, 12).expect("valid date")),
        education: Some(EducationLevel::Licenciatura),
        career: "Derecho".to_string(),
        city: "La Paz".to_string(),
        zone: "Miraflores".to_string(),
        street: "Av. Busch".to_string(),
        house_number: "1200".to_string(),
        mobile: "71234567".to_string(),
        email: "ana@correo.bo".to_string(),
        position: Some(Position::RuralTransmissionOperator),
        general_experience: Some(GeneralExperience::No),
        rural_experience: "2 procesos".to_string(),
        declarations: Declarations::all_confirmed(),
        ..ApplicantForm::default()
    }
}

pub(super) fn request(service: &MemoryService, national_id: &str) -> SubmissionRequest {
    SubmissionRequest {
        verification: key(national_id),
        form: form_with_uploads(service),
        observation: None,
    }
}

pub(super) const STATION_HEADER: &str =
    "Código,Nombre,Departamento,Provincia,Municipio,Asiento,Zona,Longitud,Latitud";

/// Two stations plus a row without code.
pub(super) fn station_csv() -> String {
    [
        STATION_HEADER,
        "1001,U.E. Bolivia,La Paz,Murillo,La Paz,La Paz,Miraflores,-68.1193,-16.5002",
        "1002,Colegio Ayacucho,La Paz,Murillo,La Paz,La Paz,Centro,abc,",
        ",Sin codigo,La Paz,Murillo,La Paz,La Paz,Centro,,",
    ]
    .join("\n")
}

pub(super) fn station_catalog() -> StationCatalog {
    let mut catalog = StationCatalog::default();
    catalog
        .import_csv(station_csv().as_bytes())
        .expect("station csv imports");
    catalog
}

pub(super) fn inline_pdf(name: &str) -> FileRef {
    FileRef::Local(LocalFile::with_content(
        name,
        "application/pdf",
        0,
        pdf_bytes(),
    ))
}

pub(super) struct UnavailableRepository;

impl RegistrantRepository for UnavailableRepository {
    fn insert(&self, _record: RegistrantRecord) -> Result<RegistrantRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_identity(
        &self,
        _key: &VerificationKey,
    ) -> Result<Option<RegistrantRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_national_id(
        &self,
        _national_id: &str,
    ) -> Result<Option<RegistrantRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<RegistrantRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Passes the pre-insert lookup but loses the insert race.
pub(super) struct ConflictRepository;

impl RegistrantRepository for ConflictRepository {
    fn insert(&self, _record: RegistrantRecord) -> Result<RegistrantRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn find_by_identity(
        &self,
        _key: &VerificationKey,
    ) -> Result<Option<RegistrantRecord>, RepositoryError> {
        Ok(None)
    }

    fn find_by_national_id(
        &self,
        _national_id: &str,
    ) -> Result<Option<RegistrantRecord>, RepositoryError> {
        Ok(None)
    }

    fn list(&self) -> Result<Vec<RegistrantRecord>, RepositoryError> {
        Ok(Vec::new())
    }
}

/// Accepts every upload id without storing anything.
pub(super) struct PermissiveUploads;

impl UploadStore for PermissiveUploads {
    fn store(
        &self,
        name: &str,
        media_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredUpload, RepositoryError> {
        Ok(StoredUpload {
            id: UploadId(1),
            name: name.to_string(),
            media_type: media_type.to_string(),
            bytes,
            uploaded_at: chrono::Utc::now(),
        })
    }

    fn fetch(&self, id: UploadId) -> Result<Option<StoredUpload>, RepositoryError> {
        Ok(Some(StoredUpload {
            id,
            name: "any.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            bytes: pdf_bytes(),
            uploaded_at: chrono::Utc::now(),
        }))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
