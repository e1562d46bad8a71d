use crate::infra::{load_station_catalog, memory_intake_service, MemoryIntakeService};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use sirepre::config::AppConfig;
use sirepre::error::AppError;
use sirepre::workflows::registration::{
    ApplicantForm, Declarations, DocumentSlot, EducationLevel, FileRef, FileSnapshotStore,
    FlowAction, GeneralExperience, IssuingAuthority, LocalFile, MemorySnapshotStore,
    PortalSession, Position, ReceiptReference, RegistrationBackend, RegistrationFlow, SlotUpdate,
    SnapshotStore, Step, SubmissionRequest, VerificationKey, STORAGE_KEY,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// National id (cedula) of the demo applicant
    #[arg(long, default_value = "1234567")]
    pub(crate) national_id: String,
    /// Issuing department code (LP, CB, SC, OR, PT, TJ, CH, BN, PD)
    #[arg(long, default_value = "LP")]
    pub(crate) issued_in: String,
    /// Mobile number typed on the additional step
    #[arg(long, default_value = "71234567")]
    pub(crate) mobile: String,
    /// Register the applicant before the flow starts to show the duplicate path
    #[arg(long)]
    pub(crate) duplicate: bool,
    /// Decline the designation terms on the confirmation step
    #[arg(long)]
    pub(crate) decline: bool,
    /// Simulate a closed registration call
    #[arg(long)]
    pub(crate) closed: bool,
    /// Persist the flow under PORTAL_SNAPSHOT_DIR so a later run resumes it
    #[arg(long)]
    pub(crate) persist: bool,
    /// Stop as soon as the flow reaches this step
    #[arg(long, value_enum)]
    pub(crate) stop_at: Option<StopAt>,
    /// Identity card PDF to use instead of the built-in sample
    #[arg(long)]
    pub(crate) identity_card: Option<PathBuf>,
    /// "Yo Participo" screenshot (JPEG or PNG) to use instead of the built-in sample
    #[arg(long)]
    pub(crate) screenshot: Option<PathBuf>,
    /// Curriculum PDF to use instead of the built-in sample
    #[arg(long)]
    pub(crate) curriculum: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum StopAt {
    Personal,
    Additional,
    Confirmation,
    Review,
}

impl StopAt {
    fn step(self) -> Step {
        match self {
            StopAt::Personal => Step::Personal,
            StopAt::Additional => Step::Additional,
            StopAt::Confirmation => Step::Confirmation,
            StopAt::Review => Step::Review,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let mut settings = config.portal.intake_settings();
    if args.closed {
        settings.open = false;
    }
    let stations = load_station_catalog(config.portal.stations_csv.as_deref())?;
    let service = memory_intake_service(settings, stations);
    let documents = DemoDocuments::load(&args)?;

    println!("SIREPRE registration demo");
    if args.duplicate {
        let receipt = service.register(prior_registration(&args, &documents))?;
        println!(
            "- Pre-registered {} as #{} to exercise the duplicate path",
            receipt.full_name, receipt.id.0
        );
    }

    let finished_on = if args.persist {
        let store = FileSnapshotStore::new(&config.portal.snapshot_dir);
        println!("- Snapshot file: {}", store.path_for(STORAGE_KEY).display());
        run_session(&service, store, &args, &documents)?
    } else {
        run_session(&service, MemorySnapshotStore::new(), &args, &documents)?
    };
    if args.persist && !finished_on.is_terminal() {
        println!("- Run again with --persist to resume from the {} step", finished_on.label());
    }
    Ok(())
}

/// Drive one portal session until a terminal step, the requested stop, or a rejection.
pub(crate) fn run_session<S: SnapshotStore>(
    service: &Arc<MemoryIntakeService>,
    store: S,
    args: &DemoArgs,
    documents: &DemoDocuments,
) -> Result<Step, AppError> {
    let mut flow = match PortalSession::open(service.clone(), store) {
        PortalSession::Closed { message } => {
            println!("- Portal closed: {message}");
            return Ok(Step::Start);
        }
        PortalSession::Open(flow) => flow,
    };

    if flow.step() != Step::Start {
        println!("- Resuming on the {} step", flow.step().label());
    }

    loop {
        let step = flow.step();
        if args.stop_at.map(StopAt::step) == Some(step) {
            println!("- Stopped on the {} step", step.label());
            return Ok(step);
        }

        let action = match step {
            Step::Start => FlowAction::Begin,
            Step::Personal => {
                flow.update_verification(|key| *key = verification(args))?;
                flow.update_form(fill_personal)?;
                FlowAction::SubmitIdentity
            }
            Step::Additional => {
                flow.update_form(|form| fill_additional(form, &args.mobile))?;
                place_documents(&mut flow, documents, args.persist)?;
                FlowAction::SubmitAdditional
            }
            Step::Confirmation => {
                reselect_documents(&mut flow, documents)?;
                if args.decline {
                    flow.dispatch(FlowAction::Decline)?;
                    println!("  confirmation: applicant declines the designation terms");
                    FlowAction::ConfirmDecline
                } else {
                    FlowAction::Agree
                }
            }
            Step::Review => {
                reselect_documents(&mut flow, documents)?;
                FlowAction::ConfirmReview
            }
            Step::Success | Step::AlreadyRegistered => break,
        };

        match flow.dispatch(action) {
            Ok(next) => println!("  {} --{:?}--> {}", step.label(), action, next.label()),
            Err(err) => {
                println!("  {} rejected {:?}: {}", step.label(), action, err);
                if let Some(errors) = err.field_errors() {
                    for (field, message) in errors.iter() {
                        println!("    - {field}: {message}");
                    }
                }
                return Ok(step);
            }
        }
    }

    report_outcome(service, flow.step(), flow.verification())?;
    Ok(flow.step())
}

fn report_outcome(
    service: &MemoryIntakeService,
    step: Step,
    verification: &VerificationKey,
) -> Result<(), AppError> {
    match step {
        Step::Success => {
            let rendered = service.receipt(&verification.national_id)?;
            println!(
                "- Registered; receipt {} ({} bytes)",
                rendered.file_name,
                rendered.bytes.len()
            );
            for line in String::from_utf8_lossy(&rendered.bytes).lines() {
                println!("    {line}");
            }
        }
        Step::AlreadyRegistered => println!(
            "- {} is already registered; receipt at {}",
            verification.display_id(),
            ReceiptReference::for_national_id(&verification.national_id).as_str()
        ),
        _ => {}
    }

    let statistics = service.statistics()?;
    println!("- Registrations stored: {}", statistics.total);
    Ok(())
}

fn place_documents<B, S>(
    flow: &mut RegistrationFlow<B, S>,
    documents: &DemoDocuments,
    keep_local: bool,
) -> Result<(), AppError>
where
    B: RegistrationBackend,
    S: SnapshotStore,
{
    for slot in DocumentSlot::MANDATORY {
        if matches!(flow.form().document(slot), Some(FileRef::Uploaded(_))) {
            continue;
        }
        let Some(file) = documents.file(slot) else {
            continue;
        };
        if keep_local {
            flow.attach_document(slot, file)?;
            println!("  additional: kept {} for submission", slot.label());
        } else {
            match flow.upload_document(slot, file)? {
                SlotUpdate::Uploaded(id) => {
                    println!("  additional: uploaded {} as #{}", slot.label(), id.0)
                }
                SlotUpdate::Pending => {
                    println!("  additional: {} will travel with the submission", slot.label())
                }
            }
        }
    }
    Ok(())
}

fn reselect_documents<B, S>(
    flow: &mut RegistrationFlow<B, S>,
    documents: &DemoDocuments,
) -> Result<(), AppError>
where
    B: RegistrationBackend,
    S: SnapshotStore,
{
    for slot in flow.slots_needing_reupload() {
        if let Some(file) = documents.file(slot) {
            flow.attach_document(slot, file)?;
            println!("  re-selected {} restored without content", slot.label());
        }
    }
    Ok(())
}

fn verification(args: &DemoArgs) -> VerificationKey {
    VerificationKey::new(
        args.national_id.trim(),
        "",
        IssuingAuthority::parse(&args.issued_in),
    )
}

fn fill_personal(form: &mut ApplicantForm) {
    form.first_name = "Maria".to_string();
    form.paternal_surname = "Condori".to_string();
    form.maternal_surname = "Flores".to_string();
    form.birth_date = NaiveDate::from_ymd_opt(1994, 8, 21);
    form.education = Some(EducationLevel::Universitario);
    form.career = "Ingenieria de Sistemas".to_string();
}

fn fill_additional(form: &mut ApplicantForm, mobile: &str) {
    form.city = "La Paz".to_string();
    form.zone = "Sopocachi".to_string();
    form.street = "Av. 6 de Agosto".to_string();
    form.house_number = "2170".to_string();
    form.mobile = mobile.to_string();
    form.email = "maria.condori@correo.bo".to_string();
    form.position = Some(Position::RuralTransmissionOperator);
    form.general_experience = Some(GeneralExperience::Yes);
    form.specific_experience = "Operadora de transmision, elecciones 2020".to_string();
    form.rural_experience = "Recinto rural de Achacachi".to_string();
    form.declarations = Declarations::all_confirmed();
}

fn prior_registration(args: &DemoArgs, documents: &DemoDocuments) -> SubmissionRequest {
    let mut form = ApplicantForm::default();
    fill_personal(&mut form);
    fill_additional(&mut form, "71234567");
    for slot in DocumentSlot::MANDATORY {
        form.set_document(slot, documents.file(slot).map(FileRef::Local));
    }
    SubmissionRequest {
        verification: verification(args),
        form,
        observation: None,
    }
}

/// Files the demo applicant picks for each mandatory slot.
pub(crate) struct DemoDocuments {
    identity_card: LocalFile,
    screenshot: LocalFile,
    curriculum: LocalFile,
}

impl DemoDocuments {
    pub(crate) fn load(args: &DemoArgs) -> Result<Self, AppError> {
        Ok(Self {
            identity_card: pick(args.identity_card.as_deref(), "ci.pdf", sample_pdf)?,
            screenshot: pick(args.screenshot.as_deref(), "yo-participo.png", sample_png)?,
            curriculum: pick(args.curriculum.as_deref(), "cv.pdf", sample_pdf)?,
        })
    }

    fn file(&self, slot: DocumentSlot) -> Option<LocalFile> {
        match slot {
            DocumentSlot::IdentityCard => Some(self.identity_card.clone()),
            DocumentSlot::ParticipationScreenshot => Some(self.screenshot.clone()),
            DocumentSlot::Curriculum => Some(self.curriculum.clone()),
            DocumentSlot::ExperienceCertificate => None,
        }
    }
}

fn pick(
    path: Option<&Path>,
    sample_name: &str,
    sample: fn() -> Vec<u8>,
) -> Result<LocalFile, AppError> {
    let Some(path) = path else {
        let media_type = mime_guess::from_path(sample_name).first_or_octet_stream();
        return Ok(LocalFile::with_content(
            sample_name,
            media_type.essence_str(),
            Utc::now().timestamp_millis(),
            sample(),
        ));
    };

    let bytes = fs::read(path)?;
    let modified = fs::metadata(path)?
        .modified()
        .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| sample_name.to_string());
    let media_type = mime_guess::from_path(path).first_or_octet_stream();

    Ok(LocalFile::with_content(
        name,
        media_type.essence_str(),
        modified,
        bytes,
    ))
}

fn sample_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n".to_vec()
}

fn sample_png() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]
}
