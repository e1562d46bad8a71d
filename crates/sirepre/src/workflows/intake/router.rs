use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartError, DefaultBodyLimit, FromRequest, Multipart, Path, Query,
        Request, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::report::ListingQuery;
use super::repository::{RegistrantRepository, RepositoryError, UploadStore};
use super::service::{IntakeService, IntakeServiceError};
use crate::workflows::registration::collaborators::SubmissionRequest;
use crate::workflows::registration::domain::{
    DocumentSlot, FileRef, IssuingAuthority, LocalFile, VerificationKey, MAX_DOCUMENT_BYTES,
};

/// Room for the form fields and multipart framing on top of the attached files.
const FORM_OVERHEAD: usize = 256 * 1024;
const UPLOAD_BODY_LIMIT: usize = MAX_DOCUMENT_BYTES as usize + FORM_OVERHEAD;
const SUBMISSION_BODY_LIMIT: usize =
    DocumentSlot::ALL.len() * MAX_DOCUMENT_BYTES as usize + FORM_OVERHEAD;

/// Multipart part carrying the single file of an upload.
const UPLOAD_FILE_PART: &str = "file";
/// Multipart part carrying the JSON submission; files travel in parts named by slot.
const SUBMISSION_PART: &str = "solicitud";

/// Router exposing the applicant and admin endpoints of the registration call.
pub fn intake_router<R, U>(service: Arc<IntakeService<R, U>>) -> Router
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    Router::new()
        .route("/api/health/", get(health_handler))
        .route("/api/postulantes/status/", get(status_handler::<R, U>))
        .route("/api/postulantes/existe/", get(lookup_handler::<R, U>))
        .route("/api/postulantes/recintos/", get(stations_handler::<R, U>))
        .route(
            "/api/postulantes/upload/",
            post(upload_handler::<R, U>).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/postulantes/",
            post(register_handler::<R, U>).layer(DefaultBodyLimit::max(SUBMISSION_BODY_LIMIT)),
        )
        .route("/api/postulantes/pdf/:ci/", get(receipt_handler::<R, U>))
        .route("/api/admin/postulantes/", get(listing_handler::<R, U>))
        .route(
            "/api/admin/postulantes/export/",
            get(export_handler::<R, U>),
        )
        .route("/api/admin/estadisticas/", get(statistics_handler::<R, U>))
        .with_state(service)
}

fn error_payload(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "success": false,
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}

fn multipart_failure(error: MultipartError) -> Response {
    error_payload(error.status(), error.body_text())
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|parsed| {
            parsed.type_() == mime::MULTIPART && parsed.subtype() == mime::FORM_DATA
        })
}

fn repository_failure(error: IntakeServiceError) -> Response {
    let status = match &error {
        IntakeServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_payload(status, error.to_string())
}

pub(crate) async fn health_handler() -> Response {
    let payload = json!({
        "status": "ok",
        "service": "sirepre",
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn status_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    let status = service.status();
    let payload = json!({
        "success": true,
        "sistema_activo": status.active,
        "mensaje": status.message,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupParams {
    cedula_identidad: Option<String>,
    #[serde(default)]
    complemento: Option<String>,
    #[serde(default)]
    expedicion: Option<String>,
}

pub(crate) async fn lookup_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
    Query(params): Query<LookupParams>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    let Some(national_id) = params
        .cedula_identidad
        .filter(|value| !value.trim().is_empty())
    else {
        return error_payload(StatusCode::BAD_REQUEST, "Faltan campos requeridos.");
    };

    let key = VerificationKey::new(
        national_id,
        params.complemento.unwrap_or_default(),
        params.expedicion.as_deref().and_then(IssuingAuthority::parse),
    );

    match service.lookup(&key) {
        Ok(found) => {
            let message = if found {
                "El postulante ya está registrado."
            } else {
                "El postulante no está registrado."
            };
            let payload = json!({
                "success": true,
                "existe": found,
                "mensaje": message,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(IntakeServiceError::Validation(_)) => {
            error_payload(StatusCode::BAD_REQUEST, "Faltan campos requeridos.")
        }
        Err(other) => repository_failure(other),
    }
}

/// Whole catalogue, unpaginated, for the station picker map.
pub(crate) async fn stations_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    let stations = service.stations().stations().collect::<Vec<_>>();
    let payload = json!({
        "success": true,
        "data": stations,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    #[serde(default)]
    name: Option<String>,
}

pub(crate) async fn upload_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
    Query(params): Query<UploadParams>,
    request: Request,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    let document = if is_multipart(request.headers()) {
        read_upload_part(request).await
    } else {
        read_raw_upload(request).await
    };
    let (file_name, media_type, bytes) = match document {
        Ok(document) => document,
        Err(response) => return response,
    };
    let name = params
        .name
        .or(file_name)
        .unwrap_or_else(|| "document".to_string());

    match service.upload(&name, &media_type, bytes) {
        Ok(id) => {
            let payload = json!({
                "success": true,
                "id": id,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error @ IntakeServiceError::UnsupportedMediaType(_)) => {
            error_payload(StatusCode::UNSUPPORTED_MEDIA_TYPE, error.to_string())
        }
        Err(error @ IntakeServiceError::PayloadTooLarge { .. }) => {
            error_payload(StatusCode::PAYLOAD_TOO_LARGE, error.to_string())
        }
        Err(error @ IntakeServiceError::EmptyUpload) => {
            error_payload(StatusCode::BAD_REQUEST, error.to_string())
        }
        Err(other) => repository_failure(other),
    }
}

type UploadedDocument = (Option<String>, String, Vec<u8>);

/// Raw body upload; the media type is the request's `Content-Type`.
async fn read_raw_upload(request: Request) -> Result<UploadedDocument, Response> {
    let media_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = Bytes::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    Ok((None, media_type, body.to_vec()))
}

/// Multipart upload; the document is the `file` part and carries its own media type.
async fn read_upload_part(request: Request) -> Result<UploadedDocument, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        if field.name() != Some(UPLOAD_FILE_PART) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let media_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_failure)?;
        return Ok((file_name, media_type, bytes.to_vec()));
    }

    Err(error_payload(
        StatusCode::BAD_REQUEST,
        "No se subió ningún archivo.",
    ))
}

/// Accepts the submission as JSON, or as multipart with the JSON in a
/// `solicitud` part and pending documents attached as parts named by slot.
pub(crate) async fn register_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
    request: Request,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    let submission = if is_multipart(request.headers()) {
        read_submission_parts(request).await
    } else {
        axum::Json::<SubmissionRequest>::from_request(request, &())
            .await
            .map(|axum::Json(submission)| submission)
            .map_err(IntoResponse::into_response)
    };
    let submission = match submission {
        Ok(submission) => submission,
        Err(response) => return response,
    };

    match service.register(submission) {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "message": "Postulante registrado exitosamente",
                "id": receipt.id,
                "pdfUrl": receipt.receipt,
                "nombreCompleto": receipt.full_name,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error @ IntakeServiceError::Duplicate) => {
            let payload = json!({
                "success": false,
                "kind": "duplicate",
                "message": error.to_string(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(IntakeServiceError::Validation(errors)) => {
            let payload = json!({
                "success": false,
                "kind": "other",
                "message": "Error al registrar postulante",
                "errors": errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(IntakeServiceError::Closed { message }) => {
            let payload = json!({
                "success": false,
                "kind": "other",
                "message": message,
            });
            (StatusCode::FORBIDDEN, axum::Json(payload)).into_response()
        }
        Err(other) => repository_failure(other),
    }
}

async fn read_submission_parts(request: Request) -> Result<SubmissionRequest, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut submission: Option<SubmissionRequest> = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == SUBMISSION_PART {
            let text = field.text().await.map_err(multipart_failure)?;
            let parsed = serde_json::from_str(&text).map_err(|err| {
                error_payload(
                    StatusCode::BAD_REQUEST,
                    format!("invalid '{SUBMISSION_PART}' part: {err}"),
                )
            })?;
            submission = Some(parsed);
            continue;
        }

        let Some(slot) = DocumentSlot::from_key(&name) else {
            return Err(error_payload(
                StatusCode::BAD_REQUEST,
                format!("unexpected part '{name}'"),
            ));
        };
        let file_name = field.file_name().unwrap_or(slot.key()).to_string();
        let media_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_failure)?;
        attachments.push((
            slot,
            LocalFile::with_content(file_name, media_type, 0, bytes.to_vec()),
        ));
    }

    let mut submission = submission
        .ok_or_else(|| error_payload(StatusCode::BAD_REQUEST, "Faltan campos requeridos."))?;
    for (slot, file) in attachments {
        submission
            .form
            .set_document(slot, Some(FileRef::Local(file)));
    }
    Ok(submission)
}

pub(crate) async fn receipt_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
    Path(national_id): Path<String>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    match service.receipt(&national_id) {
        Ok(receipt) => {
            let disposition = format!("inline; filename=\"{}\"", receipt.file_name);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, receipt.media_type.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                receipt.bytes,
            )
                .into_response()
        }
        Err(error @ IntakeServiceError::NotFound(_)) => {
            error_payload(StatusCode::NOT_FOUND, error.to_string())
        }
        Err(other) => repository_failure(other),
    }
}

pub(crate) async fn listing_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
    Query(query): Query<ListingQuery>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    match service.list(&query) {
        Ok(page) => {
            let payload = json!({
                "success": true,
                "data": page,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(other) => repository_failure(other),
    }
}

pub(crate) async fn export_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    let mut buffer = Vec::new();
    match service.export_csv(&mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"postulantes.csv\"",
                ),
            ],
            buffer,
        )
            .into_response(),
        Err(other) => repository_failure(other),
    }
}

pub(crate) async fn statistics_handler<R, U>(
    State(service): State<Arc<IntakeService<R, U>>>,
) -> Response
where
    R: RegistrantRepository + 'static,
    U: UploadStore + 'static,
{
    match service.statistics() {
        Ok(statistics) => {
            let payload = json!({
                "success": true,
                "data": statistics,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(other) => repository_failure(other),
    }
}
