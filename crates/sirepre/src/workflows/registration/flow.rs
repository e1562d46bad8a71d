use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collaborators::{
    CollaboratorError, RegistrationBackend, RejectionKind, SubmissionOutcome, SubmissionRequest,
    DEFAULT_CLOSED_MESSAGE,
};
use super::domain::{
    ApplicantForm, DocumentSlot, FileRef, LocalFile, ReceiptReference, Step, UploadId,
    VerificationKey,
};
use super::persistence::{PersistedSnapshot, SnapshotPersistence, SnapshotStore};
use super::validation::{
    validate_additional, validate_document, validate_identity, FieldErrors, FormField,
};

/// Observation attached when the applicant declines the designation terms.
pub const DECLINE_OBSERVATION: &str =
    "POSTULACION - NO ESTA DE ACUERDO CON DESIGNACION DE ACUERDO A REQUERIMIENTO";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Begin,
    SubmitIdentity,
    SubmitAdditional,
    Agree,
    Edit,
    Decline,
    CancelDecline,
    ConfirmDecline,
    ConfirmReview,
    Back,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },
    #[error("registration service unreachable, try again: {0}")]
    Connectivity(String),
    #[error("registration was not accepted: {0}")]
    Submission(String),
    #[error("`{action:?}` is not available on the {step:?} step")]
    InvalidTransition { step: Step, action: FlowAction },
    #[error("identity can no longer change after the personal step")]
    KeyLocked,
    #[error("registration already finished on the {step:?} step; reset to start over")]
    Finished { step: Step },
}

impl FlowError {
    /// Transient failures where repeating the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Connectivity(_))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            FlowError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Work the flow has to carry out for an action on a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Move(Step),
    CheckIdentity,
    CheckAdditional,
    OpenDeclinePrompt,
    CloseDeclinePrompt,
    Submit { observation: Option<&'static str> },
    Reset,
}

/// Transition table of the registration flow.
///
/// `decline_prompt` is whether the decline confirmation is showing on the
/// confirmation step; while it is, only its two answers (and `Reset`) apply.
pub fn plan(step: Step, action: FlowAction, decline_prompt: bool) -> Result<Plan, FlowError> {
    use FlowAction as A;

    let planned = match (step, action) {
        (_, A::Reset) => Some(Plan::Reset),
        (Step::Start, A::Begin) => Some(Plan::Move(Step::Personal)),
        (Step::Personal, A::SubmitIdentity) => Some(Plan::CheckIdentity),
        (Step::Personal, A::Back) => Some(Plan::Move(Step::Start)),
        (Step::Additional, A::SubmitAdditional) => Some(Plan::CheckAdditional),
        (Step::Additional, A::Back) => Some(Plan::Move(Step::Personal)),
        (Step::Confirmation, A::CancelDecline) if decline_prompt => {
            Some(Plan::CloseDeclinePrompt)
        }
        (Step::Confirmation, A::ConfirmDecline) if decline_prompt => Some(Plan::Submit {
            observation: Some(DECLINE_OBSERVATION),
        }),
        (Step::Confirmation, _) if decline_prompt => None,
        (Step::Confirmation, A::Agree) => Some(Plan::Move(Step::Review)),
        (Step::Confirmation, A::Edit | A::Back) => Some(Plan::Move(Step::Additional)),
        (Step::Confirmation, A::Decline) => Some(Plan::OpenDeclinePrompt),
        (Step::Review, A::ConfirmReview) => Some(Plan::Submit { observation: None }),
        (Step::Review, A::Back) => Some(Plan::Move(Step::Confirmation)),
        _ => None,
    };

    planned.ok_or(FlowError::InvalidTransition { step, action })
}

/// Result of placing a file into a document slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    Uploaded(UploadId),
    /// The uploader was unreachable; the file stays local and travels with the
    /// submission instead.
    Pending,
}

/// Client-side registration state machine.
///
/// Every method takes `&mut self`, so a single flow never runs two transitions
/// at once. Each settled change is written through the snapshot persistence.
#[derive(Debug)]
pub struct RegistrationFlow<B, S> {
    backend: Arc<B>,
    persistence: SnapshotPersistence<S>,
    step: Step,
    verification: VerificationKey,
    form: ApplicantForm,
    receipt: Option<ReceiptReference>,
    errors: FieldErrors,
    decline_prompt: bool,
}

impl<B, S> RegistrationFlow<B, S>
where
    B: RegistrationBackend,
    S: SnapshotStore,
{
    /// Resume from the stored snapshot, or start empty when there is none.
    pub fn restore(backend: Arc<B>, persistence: SnapshotPersistence<S>) -> Self {
        let snapshot = persistence.load().unwrap_or_default();
        Self {
            backend,
            persistence,
            step: snapshot.step,
            verification: snapshot.verification,
            form: snapshot.form,
            receipt: snapshot.receipt,
            errors: FieldErrors::new(),
            decline_prompt: false,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn verification(&self) -> &VerificationKey {
        &self.verification
    }

    pub fn form(&self) -> &ApplicantForm {
        &self.form
    }

    pub fn receipt(&self) -> Option<&ReceiptReference> {
        self.receipt.as_ref()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn decline_prompt_open(&self) -> bool {
        self.decline_prompt
    }

    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            step: self.step,
            verification: self.verification.clone(),
            form: self.form.clone(),
            receipt: self.receipt.clone(),
        }
    }

    /// Slots restored from a snapshot whose bytes must be picked again.
    pub fn slots_needing_reupload(&self) -> Vec<DocumentSlot> {
        self.form
            .documents
            .iter()
            .filter(|(_, file)| file.needs_reupload())
            .map(|(slot, _)| *slot)
            .collect()
    }

    pub fn dispatch(&mut self, action: FlowAction) -> Result<Step, FlowError> {
        let plan = plan(self.step, action, self.decline_prompt)?;
        debug!(from = self.step.label(), ?action, ?plan, "registration action");

        let result = match plan {
            Plan::Move(step) => {
                self.errors.clear();
                self.decline_prompt = false;
                self.step = step;
                Ok(step)
            }
            Plan::CheckIdentity => self.check_identity(),
            Plan::CheckAdditional => self.check_additional(),
            Plan::OpenDeclinePrompt => {
                self.decline_prompt = true;
                Ok(self.step)
            }
            Plan::CloseDeclinePrompt => {
                self.decline_prompt = false;
                Ok(self.step)
            }
            Plan::Submit { observation } => self.submit(observation),
            Plan::Reset => {
                self.reset();
                return Ok(Step::Start);
            }
        };

        self.persist();
        result
    }

    /// Edit the form; dependent fields are cleared and stale errors dropped.
    pub fn update_form<F>(&mut self, edit: F) -> Result<(), FlowError>
    where
        F: FnOnce(&mut ApplicantForm),
    {
        self.ensure_editable()?;
        edit(&mut self.form);
        self.form.normalize();
        self.shrink_errors();
        self.persist();
        Ok(())
    }

    pub fn update_verification<F>(&mut self, edit: F) -> Result<(), FlowError>
    where
        F: FnOnce(&mut VerificationKey),
    {
        if !self.step.accepts_identity_edits() {
            return Err(FlowError::KeyLocked);
        }
        edit(&mut self.verification);
        self.shrink_errors();
        self.persist();
        Ok(())
    }

    /// Validate a picked file and hand it to the uploader.
    pub fn upload_document(
        &mut self,
        slot: DocumentSlot,
        file: LocalFile,
    ) -> Result<SlotUpdate, FlowError> {
        self.ensure_editable()?;
        self.check_document(slot, &file)?;

        let update = match self.backend.upload(&file) {
            Ok(id) => {
                self.form.set_document(slot, Some(FileRef::Uploaded(id)));
                SlotUpdate::Uploaded(id)
            }
            Err(CollaboratorError::Unreachable(reason)) => {
                warn!(?slot, %reason, "uploader unreachable; keeping file for submission");
                self.form.set_document(slot, Some(FileRef::Local(file)));
                SlotUpdate::Pending
            }
            Err(CollaboratorError::Failed(reason)) => return Err(FlowError::Submission(reason)),
        };

        self.shrink_errors();
        self.persist();
        Ok(update)
    }

    /// Keep a picked file locally without uploading it yet.
    pub fn attach_document(&mut self, slot: DocumentSlot, file: LocalFile) -> Result<(), FlowError> {
        self.ensure_editable()?;
        self.check_document(slot, &file)?;
        self.form.set_document(slot, Some(FileRef::Local(file)));
        self.shrink_errors();
        self.persist();
        Ok(())
    }

    pub fn clear_document(&mut self, slot: DocumentSlot) -> Result<(), FlowError> {
        self.ensure_editable()?;
        self.form.set_document(slot, None);
        self.persist();
        Ok(())
    }

    /// Drop all state and the stored snapshot; safe to call repeatedly.
    pub fn reset(&mut self) {
        self.persistence.clear();
        self.step = Step::Start;
        self.verification = VerificationKey::default();
        self.form = ApplicantForm::default();
        self.receipt = None;
        self.errors.clear();
        self.decline_prompt = false;
    }

    fn check_identity(&mut self) -> Result<Step, FlowError> {
        if let Err(errors) = validate_identity(&self.verification, &self.form) {
            return Err(self.reject(errors));
        }
        self.errors.clear();

        let outcome = self
            .backend
            .lookup(&self.verification)
            .map_err(|err| FlowError::Connectivity(err.to_string()))?;

        if outcome.found {
            info!(national_id = %self.verification.national_id, "applicant already registered");
            self.receipt = Some(ReceiptReference::for_national_id(
                &self.verification.national_id,
            ));
            self.step = Step::AlreadyRegistered;
        } else {
            self.step = Step::Additional;
        }
        Ok(self.step)
    }

    fn check_additional(&mut self) -> Result<Step, FlowError> {
        if let Err(errors) = validate_additional(&self.form) {
            return Err(self.reject(errors));
        }
        self.errors.clear();
        self.step = Step::Confirmation;
        Ok(self.step)
    }

    fn submit(&mut self, observation: Option<&'static str>) -> Result<Step, FlowError> {
        self.decline_prompt = false;

        let mut missing = FieldErrors::new();
        for slot in self.slots_needing_reupload() {
            missing.insert(
                FormField::Document(slot),
                "file was restored without its content; select it again",
            );
        }
        if !missing.is_empty() {
            return Err(self.reject(missing));
        }

        let request = SubmissionRequest {
            verification: self.verification.clone(),
            form: self.form.clone(),
            observation: observation.map(str::to_string),
        };

        match self.backend.submit(request) {
            Ok(SubmissionOutcome::Accepted { receipt }) => {
                info!(national_id = %self.verification.national_id, declined = observation.is_some(), "registration submitted");
                self.receipt = Some(receipt);
                self.step = Step::Success;
                Ok(self.step)
            }
            Ok(SubmissionOutcome::Rejected {
                kind: RejectionKind::Duplicate,
                ..
            }) => {
                info!(national_id = %self.verification.national_id, "submission reported a duplicate");
                self.receipt = Some(ReceiptReference::for_national_id(
                    &self.verification.national_id,
                ));
                self.step = Step::AlreadyRegistered;
                Ok(self.step)
            }
            Ok(SubmissionOutcome::Rejected {
                kind: RejectionKind::Other,
                message,
            }) => Err(FlowError::Submission(message)),
            Err(CollaboratorError::Unreachable(reason)) => Err(FlowError::Connectivity(reason)),
            Err(CollaboratorError::Failed(reason)) => Err(FlowError::Submission(reason)),
        }
    }

    fn check_document(&mut self, slot: DocumentSlot, file: &LocalFile) -> Result<(), FlowError> {
        if let Err(rejection) = validate_document(slot, file) {
            let mut errors = FieldErrors::new();
            errors.insert(FormField::Document(slot), rejection.to_string());
            self.errors.insert(FormField::Document(slot), rejection.to_string());
            return Err(FlowError::Validation {
                message: rejection.to_string(),
                errors,
            });
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), FlowError> {
        if self.step.is_terminal() {
            Err(FlowError::Finished { step: self.step })
        } else {
            Ok(())
        }
    }

    fn reject(&mut self, errors: FieldErrors) -> FlowError {
        let fields = errors
            .fields()
            .map(|field| field.key())
            .collect::<Vec<_>>()
            .join(", ");
        let message = format!("{} field(s) need attention: {fields}", errors.len());
        self.errors = errors.clone();
        FlowError::Validation { message, errors }
    }

    fn shrink_errors(&mut self) {
        if self.errors.is_empty() {
            return;
        }
        let mut current = match self.step {
            Step::Personal => validate_identity(&self.verification, &self.form).err(),
            Step::Additional | Step::Confirmation | Step::Review => {
                validate_additional(&self.form).err()
            }
            _ => None,
        }
        .unwrap_or_default();

        // A rejected pick stays flagged until the slot holds a usable file.
        for slot in DocumentSlot::ALL {
            let field = FormField::Document(slot);
            let unresolved = self.form.document(slot).map_or(true, FileRef::needs_reupload);
            if unresolved && !current.contains(field) {
                if let Some(message) = self.errors.get(field) {
                    current.insert(field, message);
                }
            }
        }
        self.errors.retain_failing(&current);
    }

    fn persist(&self) {
        self.persistence.save(&self.snapshot());
    }
}

/// A registration session as seen right after the status poll.
#[derive(Debug)]
pub enum PortalSession<B, S> {
    Closed { message: String },
    Open(RegistrationFlow<B, S>),
}

impl<B, S> PortalSession<B, S>
where
    B: RegistrationBackend,
    S: SnapshotStore,
{
    /// Poll the status collaborator once; an unreachable status opens the
    /// session anyway.
    pub fn open(backend: Arc<B>, store: S) -> Self {
        match backend.status() {
            Ok(report) if !report.active => {
                let message = if report.message.trim().is_empty() {
                    DEFAULT_CLOSED_MESSAGE.to_string()
                } else {
                    report.message
                };
                info!(%message, "registration portal closed");
                PortalSession::Closed { message }
            }
            Ok(_) => PortalSession::Open(RegistrationFlow::restore(
                backend,
                SnapshotPersistence::new(store),
            )),
            Err(err) => {
                warn!(error = %err, "portal status unavailable; opening anyway");
                PortalSession::Open(RegistrationFlow::restore(
                    backend,
                    SnapshotPersistence::new(store),
                ))
            }
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PortalSession::Open(_))
    }

    pub fn into_flow(self) -> Option<RegistrationFlow<B, S>> {
        match self {
            PortalSession::Open(flow) => Some(flow),
            PortalSession::Closed { .. } => None,
        }
    }
}
