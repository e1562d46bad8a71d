use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Largest document accepted by any slot.
pub const MAX_DOCUMENT_BYTES: u64 = 3 * 1024 * 1024;

/// Department that issued the identity card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssuingAuthority {
    #[serde(rename = "LP")]
    LaPaz,
    #[serde(rename = "CB")]
    Cochabamba,
    #[serde(rename = "SC")]
    SantaCruz,
    #[serde(rename = "OR")]
    Oruro,
    #[serde(rename = "PT")]
    Potosi,
    #[serde(rename = "TJ")]
    Tarija,
    #[serde(rename = "CH")]
    Chuquisaca,
    #[serde(rename = "BN")]
    Beni,
    #[serde(rename = "PD", alias = "PN")]
    Pando,
}

impl IssuingAuthority {
    pub const ALL: [IssuingAuthority; 9] = [
        IssuingAuthority::LaPaz,
        IssuingAuthority::Cochabamba,
        IssuingAuthority::SantaCruz,
        IssuingAuthority::Oruro,
        IssuingAuthority::Potosi,
        IssuingAuthority::Tarija,
        IssuingAuthority::Chuquisaca,
        IssuingAuthority::Beni,
        IssuingAuthority::Pando,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            IssuingAuthority::LaPaz => "LP",
            IssuingAuthority::Cochabamba => "CB",
            IssuingAuthority::SantaCruz => "SC",
            IssuingAuthority::Oruro => "OR",
            IssuingAuthority::Potosi => "PT",
            IssuingAuthority::Tarija => "TJ",
            IssuingAuthority::Chuquisaca => "CH",
            IssuingAuthority::Beni => "BN",
            IssuingAuthority::Pando => "PD",
        }
    }

    pub const fn department(self) -> &'static str {
        match self {
            IssuingAuthority::LaPaz => "La Paz",
            IssuingAuthority::Cochabamba => "Cochabamba",
            IssuingAuthority::SantaCruz => "Santa Cruz",
            IssuingAuthority::Oruro => "Oruro",
            IssuingAuthority::Potosi => "Potosí",
            IssuingAuthority::Tarija => "Tarija",
            IssuingAuthority::Chuquisaca => "Chuquisaca",
            IssuingAuthority::Beni => "Beni",
            IssuingAuthority::Pando => "Pando",
        }
    }

    /// Parse a department code; `PN` is accepted for Pando.
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code == "PN" {
            return Some(IssuingAuthority::Pando);
        }
        Self::ALL
            .into_iter()
            .find(|authority| authority.code() == code)
    }
}

/// Identity triple used as the idempotency key of a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    pub national_id: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub issuing_authority: Option<IssuingAuthority>,
}

impl VerificationKey {
    pub fn new(
        national_id: impl Into<String>,
        complement: impl Into<String>,
        issuing_authority: Option<IssuingAuthority>,
    ) -> Self {
        Self {
            national_id: national_id.into(),
            complement: complement.into(),
            issuing_authority,
        }
    }

    /// Upper-cased complement, with blank treated as absent.
    pub fn normalized_complement(&self) -> Option<String> {
        let complement = self.complement.trim().to_ascii_uppercase();
        if complement.is_empty() || complement == "NULL" {
            None
        } else {
            Some(complement)
        }
    }

    /// Two keys name the same person when national id and complement agree.
    pub fn same_identity(&self, other: &VerificationKey) -> bool {
        self.national_id.trim() == other.national_id.trim()
            && self.normalized_complement() == other.normalized_complement()
    }

    /// Identity as printed on receipts, e.g. `1234567-1A LP`.
    pub fn display_id(&self) -> String {
        let mut rendered = self.national_id.trim().to_string();
        if let Some(complement) = self.normalized_complement() {
            rendered.push('-');
            rendered.push_str(&complement);
        }
        if let Some(authority) = self.issuing_authority {
            rendered.push(' ');
            rendered.push_str(authority.code());
        }
        rendered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EducationLevel {
    #[serde(rename = "BACHILLER")]
    Bachiller,
    #[serde(rename = "TECNICO MEDIO")]
    TecnicoMedio,
    #[serde(rename = "TECNICO SUPERIOR")]
    TecnicoSuperior,
    #[serde(rename = "UNIVERSITARIO")]
    Universitario,
    #[serde(rename = "LICENCIATURA")]
    Licenciatura,
}

impl EducationLevel {
    pub const fn label(self) -> &'static str {
        match self {
            EducationLevel::Bachiller => "BACHILLER",
            EducationLevel::TecnicoMedio => "TECNICO MEDIO",
            EducationLevel::TecnicoSuperior => "TECNICO SUPERIOR",
            EducationLevel::Universitario => "UNIVERSITARIO",
            EducationLevel::Licenciatura => "LICENCIATURA",
        }
    }

    /// Secondary-school diploma; no course of study applies.
    pub const fn is_base_secondary(self) -> bool {
        matches!(self, EducationLevel::Bachiller)
    }
}

/// Positions open in the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "OPERADOR TRANSMISION RURAL")]
    RuralTransmissionOperator,
    #[serde(rename = "OPERADOR TRANSMISION URBANO")]
    UrbanTransmissionOperator,
}

impl Position {
    pub const ALL: [Position; 2] = [
        Position::RuralTransmissionOperator,
        Position::UrbanTransmissionOperator,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Position::RuralTransmissionOperator => "OPERADOR TRANSMISION RURAL",
            Position::UrbanTransmissionOperator => "OPERADOR TRANSMISION URBANO",
        }
    }

    /// Published profile requirements shown on the landing step.
    pub fn requirements(self) -> &'static [&'static str] {
        const URBAN: &[&str] = &[
            "Proven experience in electoral processes (desirable)",
            "Secondary-school diploma or higher",
            "Conflict resolution skills",
            "Comfortable serving the public",
            "Computer and office-suite skills",
        ];
        const RURAL: &[&str] = &[
            "Proven experience in electoral processes (desirable)",
            "Secondary-school diploma or higher",
            "Conflict resolution skills",
            "Comfortable serving the public",
            "Computer and office-suite skills",
            "Available to travel to rural areas",
        ];
        match self {
            Position::RuralTransmissionOperator => RURAL,
            Position::UrbanTransmissionOperator => URBAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneralExperience {
    #[serde(rename = "SI")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

/// The ten self-attestations every applicant must confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Declaration {
    BolivianCitizen,
    OnElectoralRoll,
    IdCardCurrent,
    FullTimeAvailability,
    EntelLine,
    NoPartyMembership,
    NoInstitutionalConflicts,
    NoFinalSentence,
    AndroidPhone,
    Powerbank,
}

impl Declaration {
    pub const ALL: [Declaration; 10] = [
        Declaration::BolivianCitizen,
        Declaration::OnElectoralRoll,
        Declaration::IdCardCurrent,
        Declaration::FullTimeAvailability,
        Declaration::EntelLine,
        Declaration::NoPartyMembership,
        Declaration::NoInstitutionalConflicts,
        Declaration::NoFinalSentence,
        Declaration::AndroidPhone,
        Declaration::Powerbank,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Declaration::BolivianCitizen => "Bolivian citizen",
            Declaration::OnElectoralRoll => "Registered on the electoral roll",
            Declaration::IdCardCurrent => "Identity card in force",
            Declaration::FullTimeAvailability => "Full-time availability",
            Declaration::EntelLine => "Has an Entel mobile line",
            Declaration::NoPartyMembership => "No political party membership",
            Declaration::NoInstitutionalConflicts => "No conflicts with the institution",
            Declaration::NoFinalSentence => "No final criminal sentence",
            Declaration::AndroidPhone => "Has an Android phone",
            Declaration::Powerbank => "Has a power bank",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Declarations {
    pub bolivian_citizen: bool,
    pub on_electoral_roll: bool,
    pub id_card_current: bool,
    pub full_time_availability: bool,
    pub entel_line: bool,
    pub no_party_membership: bool,
    pub no_institutional_conflicts: bool,
    pub no_final_sentence: bool,
    pub android_phone: bool,
    pub powerbank: bool,
}

impl Declarations {
    pub fn all_confirmed() -> Self {
        let mut declarations = Self::default();
        for declaration in Declaration::ALL {
            declarations.set(declaration, true);
        }
        declarations
    }

    pub fn get(&self, declaration: Declaration) -> bool {
        match declaration {
            Declaration::BolivianCitizen => self.bolivian_citizen,
            Declaration::OnElectoralRoll => self.on_electoral_roll,
            Declaration::IdCardCurrent => self.id_card_current,
            Declaration::FullTimeAvailability => self.full_time_availability,
            Declaration::EntelLine => self.entel_line,
            Declaration::NoPartyMembership => self.no_party_membership,
            Declaration::NoInstitutionalConflicts => self.no_institutional_conflicts,
            Declaration::NoFinalSentence => self.no_final_sentence,
            Declaration::AndroidPhone => self.android_phone,
            Declaration::Powerbank => self.powerbank,
        }
    }

    pub fn set(&mut self, declaration: Declaration, value: bool) {
        let slot = match declaration {
            Declaration::BolivianCitizen => &mut self.bolivian_citizen,
            Declaration::OnElectoralRoll => &mut self.on_electoral_roll,
            Declaration::IdCardCurrent => &mut self.id_card_current,
            Declaration::FullTimeAvailability => &mut self.full_time_availability,
            Declaration::EntelLine => &mut self.entel_line,
            Declaration::NoPartyMembership => &mut self.no_party_membership,
            Declaration::NoInstitutionalConflicts => &mut self.no_institutional_conflicts,
            Declaration::NoFinalSentence => &mut self.no_final_sentence,
            Declaration::AndroidPhone => &mut self.android_phone,
            Declaration::Powerbank => &mut self.powerbank,
        };
        *slot = value;
    }

    pub fn pending(&self) -> Vec<Declaration> {
        Declaration::ALL
            .into_iter()
            .filter(|declaration| !self.get(*declaration))
            .collect()
    }

    pub fn confirmed_count(&self) -> usize {
        Declaration::ALL.len() - self.pending().len()
    }

    pub fn is_complete(&self) -> bool {
        self.pending().is_empty()
    }
}

/// Document slots on the additional-data step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    IdentityCard,
    /// Screenshot of the "Yo Participo" non-membership check.
    ParticipationScreenshot,
    Curriculum,
    ExperienceCertificate,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 4] = [
        DocumentSlot::IdentityCard,
        DocumentSlot::ParticipationScreenshot,
        DocumentSlot::Curriculum,
        DocumentSlot::ExperienceCertificate,
    ];

    pub const MANDATORY: [DocumentSlot; 3] = [
        DocumentSlot::IdentityCard,
        DocumentSlot::ParticipationScreenshot,
        DocumentSlot::Curriculum,
    ];

    pub const fn is_mandatory(self) -> bool {
        !matches!(self, DocumentSlot::ExperienceCertificate)
    }

    /// Wire name, matching the serde representation.
    pub const fn key(self) -> &'static str {
        match self {
            DocumentSlot::IdentityCard => "identity_card",
            DocumentSlot::ParticipationScreenshot => "participation_screenshot",
            DocumentSlot::Curriculum => "curriculum",
            DocumentSlot::ExperienceCertificate => "experience_certificate",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key.trim())
    }

    pub const fn label(self) -> &'static str {
        match self {
            DocumentSlot::IdentityCard => "Identity card (both sides, single PDF)",
            DocumentSlot::ParticipationScreenshot => "Yo Participo screenshot",
            DocumentSlot::Curriculum => "Curriculum vitae",
            DocumentSlot::ExperienceCertificate => "Electoral experience certificate",
        }
    }

    pub const fn accepted_media_types(self) -> &'static [&'static str] {
        match self {
            DocumentSlot::ParticipationScreenshot => &["image/jpeg", "image/png"],
            _ => &["application/pdf"],
        }
    }

    /// Whether a declared media type (parameters ignored) fits this slot.
    pub fn accepts(self, media_type: &str) -> bool {
        match media_type.trim().parse::<mime::Mime>() {
            Ok(parsed) => self
                .accepted_media_types()
                .iter()
                .any(|accepted| *accepted == parsed.essence_str()),
            Err(_) => false,
        }
    }
}

/// Identifier handed out by the upload collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub u64);

/// A file picked on the applicant's device that the upload collaborator has not
/// confirmed yet.
///
/// Handles restored from a persisted snapshot are placeholders: they carry the
/// recorded metadata but no content, so the file has to be picked again before
/// its bytes can be submitted. Slots already holding an [`UploadId`] need no
/// re-upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    pub name: String,
    pub size: u64,
    pub media_type: String,
    #[serde(default)]
    pub last_modified: i64,
    #[serde(skip)]
    content: Option<Vec<u8>>,
}

impl LocalFile {
    pub fn with_content(
        name: impl Into<String>,
        media_type: impl Into<String>,
        last_modified: i64,
        content: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            size: content.len() as u64,
            media_type: media_type.into(),
            last_modified,
            content: Some(content),
        }
    }

    pub fn placeholder(
        name: impl Into<String>,
        size: u64,
        media_type: impl Into<String>,
        last_modified: i64,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            media_type: media_type.into(),
            last_modified,
            content: None,
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn into_content(self) -> Option<Vec<u8>> {
        self.content
    }

    pub fn is_placeholder(&self) -> bool {
        self.content.is_none()
    }
}

/// Value of a filled document slot.
///
/// Serializes as the bare upload id, or as the `{name, size, media_type,
/// last_modified}` descriptor of a pending file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileRef {
    Uploaded(UploadId),
    Local(LocalFile),
}

impl FileRef {
    pub fn upload_id(&self) -> Option<UploadId> {
        match self {
            FileRef::Uploaded(id) => Some(*id),
            FileRef::Local(_) => None,
        }
    }

    /// A restored handle whose bytes are gone.
    pub fn needs_reupload(&self) -> bool {
        matches!(self, FileRef::Local(file) if file.is_placeholder())
    }
}

/// Everything the applicant types, picks, or ticks across the form steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantForm {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub birth_date: Option<NaiveDate>,
    pub education: Option<EducationLevel>,
    pub career: String,
    pub city: String,
    pub zone: String,
    pub street: String,
    pub house_number: String,
    pub mobile: String,
    pub backup_phone: String,
    pub email: String,
    pub position: Option<Position>,
    pub general_experience: Option<GeneralExperience>,
    pub specific_experience: String,
    pub rural_experience: String,
    pub polling_station: Option<u64>,
    pub documents: BTreeMap<DocumentSlot, FileRef>,
    pub declarations: Declarations,
}

impl ApplicantForm {
    pub fn full_name(&self) -> String {
        [
            self.first_name.trim(),
            self.paternal_surname.trim(),
            self.maternal_surname.trim(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn document(&self, slot: DocumentSlot) -> Option<&FileRef> {
        self.documents.get(&slot)
    }

    pub fn set_document(&mut self, slot: DocumentSlot, value: Option<FileRef>) {
        match value {
            Some(value) => {
                self.documents.insert(slot, value);
            }
            None => {
                self.documents.remove(&slot);
            }
        }
    }

    pub fn set_general_experience(&mut self, experience: Option<GeneralExperience>) {
        self.general_experience = experience;
        self.normalize();
    }

    pub fn set_education(&mut self, education: Option<EducationLevel>) {
        self.education = education;
        self.normalize();
    }

    /// Clear fields that no longer apply given the fields they depend on.
    pub fn normalize(&mut self) {
        if self.general_experience == Some(GeneralExperience::No) {
            self.specific_experience.clear();
        }
        if self
            .education
            .map_or(true, EducationLevel::is_base_secondary)
        {
            self.career.clear();
        }
    }
}

/// Ordered registration steps; exactly one is current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Start,
    Personal,
    Additional,
    Confirmation,
    Review,
    Success,
    AlreadyRegistered,
}

impl Step {
    pub const fn label(self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Personal => "personal",
            Step::Additional => "additional",
            Step::Confirmation => "confirmation",
            Step::Review => "review",
            Step::Success => "success",
            Step::AlreadyRegistered => "already_registered",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Step::Success | Step::AlreadyRegistered)
    }

    /// Steps on which the verification key may still change.
    pub const fn accepts_identity_edits(self) -> bool {
        matches!(self, Step::Start | Step::Personal)
    }
}

/// Retrieval path of a registrant's receipt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptReference(pub String);

impl ReceiptReference {
    pub const PATH_PREFIX: &'static str = "/api/postulantes/pdf/";

    pub fn for_national_id(national_id: &str) -> Self {
        Self(format!("{}{}/", Self::PATH_PREFIX, national_id.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// National id encoded in a path built by [`ReceiptReference::for_national_id`].
    pub fn national_id(&self) -> Option<&str> {
        self.0
            .strip_prefix(Self::PATH_PREFIX)
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|id| !id.is_empty())
    }
}
