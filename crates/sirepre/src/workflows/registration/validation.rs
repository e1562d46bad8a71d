use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use super::domain::{
    ApplicantForm, Declaration, DocumentSlot, LocalFile, VerificationKey, MAX_DOCUMENT_BYTES,
};

fn national_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4,9}$").expect("national id pattern compiles"))
}

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[67][0-9]{7}$").expect("mobile pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern compiles"))
}

pub fn is_valid_national_id(value: &str) -> bool {
    national_id_pattern().is_match(value.trim())
}

/// Eight digits starting with 6 or 7.
pub fn is_valid_mobile(value: &str) -> bool {
    mobile_pattern().is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
    email_pattern().is_match(value.trim())
}

/// Key of a field-level validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormField {
    NationalId,
    IssuingAuthority,
    FirstName,
    BirthDate,
    Education,
    City,
    Zone,
    Street,
    Mobile,
    Email,
    Position,
    GeneralExperience,
    PollingStation,
    Document(DocumentSlot),
    Declarations,
}

impl FormField {
    pub fn key(self) -> &'static str {
        match self {
            FormField::NationalId => "national_id",
            FormField::IssuingAuthority => "issuing_authority",
            FormField::FirstName => "first_name",
            FormField::BirthDate => "birth_date",
            FormField::Education => "education",
            FormField::City => "city",
            FormField::Zone => "zone",
            FormField::Street => "street",
            FormField::Mobile => "mobile",
            FormField::Email => "email",
            FormField::Position => "position",
            FormField::GeneralExperience => "general_experience",
            FormField::PollingStation => "polling_station",
            FormField::Document(DocumentSlot::IdentityCard) => "documents.identity_card",
            FormField::Document(DocumentSlot::ParticipationScreenshot) => {
                "documents.participation_screenshot"
            }
            FormField::Document(DocumentSlot::Curriculum) => "documents.curriculum",
            FormField::Document(DocumentSlot::ExperienceCertificate) => {
                "documents.experience_certificate"
            }
            FormField::Declarations => "declarations",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for FormField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Field-keyed validation messages for the current step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<FormField, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: FormField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: FormField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: FormField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = FormField> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Keep only the errors that `current` still reports.
    pub fn retain_failing(&mut self, current: &FieldErrors) {
        self.0.retain(|field, _| current.contains(*field));
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

const REQUIRED: &str = "required";

/// Checks run on the personal step before the duplicate lookup.
pub fn validate_identity(key: &VerificationKey, form: &ApplicantForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if !is_valid_national_id(&key.national_id) {
        errors.insert(
            FormField::NationalId,
            "national id must have between 4 and 9 digits",
        );
    }
    if key.issuing_authority.is_none() {
        errors.insert(FormField::IssuingAuthority, "select the issuing department");
    }
    if form.first_name.trim().is_empty() {
        errors.insert(FormField::FirstName, REQUIRED);
    }
    if form.birth_date.is_none() {
        errors.insert(FormField::BirthDate, REQUIRED);
    }
    if form.education.is_none() {
        errors.insert(FormField::Education, "select an education level");
    }

    errors.into_result()
}

/// Checks run on the additional-data step before confirmation.
pub fn validate_additional(form: &ApplicantForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    for (field, value) in [
        (FormField::City, &form.city),
        (FormField::Zone, &form.zone),
        (FormField::Street, &form.street),
    ] {
        if value.trim().is_empty() {
            errors.insert(field, REQUIRED);
        }
    }

    if !is_valid_mobile(&form.mobile) {
        errors.insert(
            FormField::Mobile,
            "invalid format (8 digits, starting with 6 or 7)",
        );
    }
    if !is_valid_email(&form.email) {
        errors.insert(FormField::Email, "invalid email address");
    }
    if form.position.is_none() {
        errors.insert(FormField::Position, "select a position");
    }
    if form.general_experience.is_none() {
        errors.insert(FormField::GeneralExperience, REQUIRED);
    }

    for slot in DocumentSlot::MANDATORY {
        if form.document(slot).is_none() {
            errors.insert(FormField::Document(slot), REQUIRED);
        }
    }

    let pending = form.declarations.pending();
    if !pending.is_empty() {
        let labels = pending
            .iter()
            .map(|declaration| Declaration::label(*declaration))
            .collect::<Vec<_>>()
            .join(", ");
        errors.insert(
            FormField::Declarations,
            format!("all declarations must be confirmed; pending: {labels}"),
        );
    }

    errors.into_result()
}

/// Both steps at once, as the backend re-checks a submission.
pub fn validate_submission(key: &VerificationKey, form: &ApplicantForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for result in [validate_identity(key, form), validate_additional(form)] {
        if let Err(step_errors) = result {
            for (field, message) in step_errors.iter() {
                errors.insert(field, message);
            }
        }
    }
    errors.into_result()
}

/// Reasons a picked file cannot go into a slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentRejection {
    #[error("{slot:?} does not accept '{media_type}'")]
    UnsupportedType {
        slot: DocumentSlot,
        media_type: String,
    },
    #[error("file is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("file is empty")]
    Empty,
}

pub fn validate_document(slot: DocumentSlot, file: &LocalFile) -> Result<(), DocumentRejection> {
    if !slot.accepts(&file.media_type) {
        return Err(DocumentRejection::UnsupportedType {
            slot,
            media_type: file.media_type.clone(),
        });
    }
    if file.size == 0 {
        return Err(DocumentRejection::Empty);
    }
    if file.size > MAX_DOCUMENT_BYTES {
        return Err(DocumentRejection::TooLarge {
            size: file.size,
            limit: MAX_DOCUMENT_BYTES,
        });
    }
    Ok(())
}
