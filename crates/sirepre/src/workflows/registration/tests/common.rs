use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::workflows::registration::collaborators::{
    CollaboratorError, DuplicateCheck, FileUploader, LookupOutcome, PortalStatus,
    PortalStatusReport, RejectionKind, SubmissionGateway, SubmissionOutcome, SubmissionRequest,
};
use crate::workflows::registration::domain::{
    ApplicantForm, Declarations, DocumentSlot, EducationLevel, FileRef, GeneralExperience,
    IssuingAuthority, LocalFile, Position, ReceiptReference, UploadId, VerificationKey,
};
use crate::workflows::registration::flow::{FlowAction, RegistrationFlow};
use crate::workflows::registration::persistence::{MemorySnapshotStore, SnapshotPersistence};

/// Scriptable stand-in for the intake backend.
pub(super) struct FakeBackend {
    registered: Mutex<Vec<VerificationKey>>,
    submissions: Mutex<Vec<SubmissionRequest>>,
    lookup_failure: Mutex<Option<CollaboratorError>>,
    submit_override: Mutex<Option<Result<SubmissionOutcome, CollaboratorError>>>,
    upload_failure: Mutex<Option<CollaboratorError>>,
    status: Mutex<Result<PortalStatusReport, CollaboratorError>>,
    next_upload: AtomicU64,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            registered: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            lookup_failure: Mutex::new(None),
            submit_override: Mutex::new(None),
            upload_failure: Mutex::new(None),
            status: Mutex::new(Ok(PortalStatusReport {
                active: true,
                message: String::new(),
            })),
            next_upload: AtomicU64::new(100),
        }
    }
}

impl FakeBackend {
    pub(super) fn with_registered(key: VerificationKey) -> Self {
        let backend = Self::default();
        backend.registered.lock().expect("lock").push(key);
        backend
    }

    pub(super) fn fail_lookup(&self, error: CollaboratorError) {
        *self.lookup_failure.lock().expect("lock") = Some(error);
    }

    pub(super) fn respond_to_submit(&self, response: Result<SubmissionOutcome, CollaboratorError>) {
        *self.submit_override.lock().expect("lock") = Some(response);
    }

    pub(super) fn fail_upload(&self, error: CollaboratorError) {
        *self.upload_failure.lock().expect("lock") = Some(error);
    }

    pub(super) fn set_status(&self, status: Result<PortalStatusReport, CollaboratorError>) {
        *self.status.lock().expect("lock") = status;
    }

    pub(super) fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions.lock().expect("lock").clone()
    }
}

impl DuplicateCheck for FakeBackend {
    fn lookup(&self, key: &VerificationKey) -> Result<LookupOutcome, CollaboratorError> {
        if let Some(error) = self.lookup_failure.lock().expect("lock").clone() {
            return Err(error);
        }
        let found = self
            .registered
            .lock()
            .expect("lock")
            .iter()
            .any(|existing| existing.same_identity(key));
        Ok(LookupOutcome { found })
    }
}

impl SubmissionGateway for FakeBackend {
    fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome, CollaboratorError> {
        self.submissions.lock().expect("lock").push(request.clone());
        if let Some(response) = self.submit_override.lock().expect("lock").clone() {
            return response;
        }

        let mut registered = self.registered.lock().expect("lock");
        if registered
            .iter()
            .any(|existing| existing.same_identity(&request.verification))
        {
            return Ok(SubmissionOutcome::Rejected {
                kind: RejectionKind::Duplicate,
                message: "applicant already registered".to_string(),
            });
        }
        registered.push(request.verification.clone());
        Ok(SubmissionOutcome::Accepted {
            receipt: ReceiptReference::for_national_id(&request.verification.national_id),
        })
    }
}

impl FileUploader for FakeBackend {
    fn upload(&self, _file: &LocalFile) -> Result<UploadId, CollaboratorError> {
        if let Some(error) = self.upload_failure.lock().expect("lock").clone() {
            return Err(error);
        }
        Ok(UploadId(self.next_upload.fetch_add(1, Ordering::SeqCst)))
    }
}

impl PortalStatus for FakeBackend {
    fn status(&self) -> Result<PortalStatusReport, CollaboratorError> {
        self.status.lock().expect("lock").clone()
    }
}

pub(super) type TestFlow = RegistrationFlow<FakeBackend, MemorySnapshotStore>;

pub(super) fn identity_key() -> VerificationKey {
    VerificationKey::new("1234567", "", Some(IssuingAuthority::LaPaz))
}

pub(super) fn pdf(name: &str) -> LocalFile {
    LocalFile::with_content(name, "application/pdf", 1_700_000_000_000, b"%PDF-1.4".to_vec())
}

pub(super) fn png(name: &str) -> LocalFile {
    LocalFile::with_content(name, "image/png", 1_700_000_000_000, vec![0x89, b'P', b'N', b'G'])
}

pub(super) fn fill_personal(form: &mut ApplicantForm) {
    form.first_name = "Ana".to_string();
    form.paternal_surname = "Quispe".to_string();
    form.maternal_surname = "Mamani".to_string();
    form.birth_date = Some(NaiveDate::from_ymd_opt(1995, 4, 12).expect("valid date"));
    form.education = Some(EducationLevel::Universitario);
    form.career = "Ingenieria de Sistemas".to_string();
}

pub(super) fn fill_additional(form: &mut ApplicantForm) {
    form.city = "La Paz".to_string();
    form.zone = "Sopocachi".to_string();
    form.street = "Av. 20 de Octubre".to_string();
    form.house_number = "1450".to_string();
    form.mobile = "71234567".to_string();
    form.email = "a@b.com".to_string();
    form.position = Some(Position::UrbanTransmissionOperator);
    form.general_experience = Some(GeneralExperience::Yes);
    form.specific_experience = "Transmission operator 2020".to_string();
    form.declarations = Declarations::all_confirmed();
    for (offset, slot) in DocumentSlot::MANDATORY.into_iter().enumerate() {
        form.set_document(slot, Some(FileRef::Uploaded(UploadId(offset as u64 + 1))));
    }
}

pub(super) fn complete_form() -> ApplicantForm {
    let mut form = ApplicantForm::default();
    fill_personal(&mut form);
    fill_additional(&mut form);
    form
}

pub(super) fn new_flow(backend: Arc<FakeBackend>) -> (TestFlow, MemorySnapshotStore) {
    let store = MemorySnapshotStore::new();
    let flow = RegistrationFlow::restore(backend, SnapshotPersistence::new(store.clone()));
    (flow, store)
}

pub(super) fn flow_on_personal(backend: Arc<FakeBackend>) -> (TestFlow, MemorySnapshotStore) {
    let (mut flow, store) = new_flow(backend);
    flow.dispatch(FlowAction::Begin).expect("begin");
    flow.update_verification(|key| *key = identity_key())
        .expect("identity editable");
    flow.update_form(fill_personal).expect("form editable");
    (flow, store)
}

pub(super) fn flow_on_additional(backend: Arc<FakeBackend>) -> (TestFlow, MemorySnapshotStore) {
    let (mut flow, store) = flow_on_personal(backend);
    flow.dispatch(FlowAction::SubmitIdentity)
        .expect("identity accepted");
    (flow, store)
}

pub(super) fn flow_on_confirmation(backend: Arc<FakeBackend>) -> (TestFlow, MemorySnapshotStore) {
    let (mut flow, store) = flow_on_additional(backend);
    flow.update_form(fill_additional).expect("form editable");
    flow.dispatch(FlowAction::SubmitAdditional)
        .expect("additional accepted");
    (flow, store)
}
