use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::registration::collaborators::DEFAULT_CLOSED_MESSAGE;
use crate::workflows::registration::domain::{ApplicantForm, ReceiptReference, VerificationKey};
use crate::workflows::registration::flow::DECLINE_OBSERVATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrantId(pub u64);

/// A stored registration. Every document slot holds an upload id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrantRecord {
    pub id: RegistrantId,
    pub verification: VerificationKey,
    pub form: ApplicantForm,
    #[serde(default)]
    pub observation: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl RegistrantRecord {
    pub fn full_name(&self) -> String {
        self.form.full_name()
    }

    pub fn meets_requirements(&self) -> bool {
        self.form.declarations.is_complete()
    }

    pub fn declined_designation(&self) -> bool {
        self.observation.as_deref() == Some(DECLINE_OBSERVATION)
    }

    pub fn receipt_reference(&self) -> ReceiptReference {
        ReceiptReference::for_national_id(&self.verification.national_id)
    }

    pub fn summary(&self) -> RegistrantSummary {
        RegistrantSummary {
            id: self.id,
            full_name: self.full_name(),
            national_id: self.verification.display_id(),
            position: self.form.position.map(|position| position.label()),
            mobile: self.form.mobile.clone(),
            email: self.form.email.clone(),
            meets_requirements: self.meets_requirements(),
            declined_designation: self.declined_designation(),
            registered_at: self.registered_at,
        }
    }
}

/// Row of the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrantSummary {
    pub id: RegistrantId,
    pub full_name: String,
    pub national_id: String,
    pub position: Option<&'static str>,
    pub mobile: String,
    pub email: String,
    pub meets_requirements: bool,
    pub declined_designation: bool,
    pub registered_at: DateTime<Utc>,
}

/// Returned to the applicant once a registration is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReceipt {
    pub id: RegistrantId,
    pub full_name: String,
    pub receipt: ReceiptReference,
}

/// Whether the call accepts registrations and what to show when it does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSettings {
    pub open: bool,
    pub closed_message: String,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            open: true,
            closed_message: DEFAULT_CLOSED_MESSAGE.to_string(),
        }
    }
}
