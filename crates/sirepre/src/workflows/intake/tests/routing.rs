use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use super::common::*;
use crate::workflows::intake::domain::IntakeSettings;
use crate::workflows::intake::memory::InMemoryUploadStore;
use crate::workflows::intake::repository::{RegistrantRepository, UploadStore};
use crate::workflows::intake::router::{intake_router, status_handler};
use crate::workflows::intake::service::IntakeService;
use crate::workflows::registration::domain::{DocumentSlot, FileRef, LocalFile, UploadId};

fn router_for(service: MemoryService) -> Router {
    intake_router(Arc::new(service))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, payload: &impl serde::Serialize) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

const BOUNDARY: &str = "sirepre-form-boundary";

struct Part<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    media_type: Option<&'a str>,
    bytes: Vec<u8>,
}

impl<'a> Part<'a> {
    fn text(name: &'a str, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            file_name: None,
            media_type: None,
            bytes: value.into(),
        }
    }

    fn file(name: &'a str, file_name: &'a str, media_type: &'a str, bytes: Vec<u8>) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            media_type: Some(media_type),
            bytes,
        }
    }
}

fn post_multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(media_type) = part.media_type {
            body.extend_from_slice(format!("Content-Type: {media_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn status_reports_open_portal_and_message() {
    let (service, _, _) = build_service();

    let response = status_handler(State(Arc::new(service))).await;

    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["sistema_activo"], true);
    assert_eq!(body["mensaje"], "El sistema de postulación se ha cerrado.");
}

#[tokio::test]
async fn status_reports_closed_portal() {
    let (service, _, _) = build_service_with(closed_settings());
    let router = router_for(service);

    let response = router.oneshot(get("/api/postulantes/status/")).await.unwrap();

    let body = read_json_body(response).await;
    assert_eq!(body["sistema_activo"], false);
    assert_eq!(body["mensaje"], "Convocatoria cerrada");
}

#[tokio::test]
async fn lookup_route_reports_existence() {
    let (service, _, _) = build_service();
    service
        .register(request(&service, "1234567"))
        .expect("registration");
    let router = router_for(service);

    let found = router
        .clone()
        .oneshot(get(
            "/api/postulantes/existe/?cedula_identidad=1234567&complemento=&expedicion=LP",
        ))
        .await
        .unwrap();
    assert_status(&found, StatusCode::OK);
    assert_eq!(read_json_body(found).await["existe"], true);

    let missing = router
        .clone()
        .oneshot(get("/api/postulantes/existe/?cedula_identidad=7654321"))
        .await
        .unwrap();
    assert_eq!(read_json_body(missing).await["existe"], false);

    let incomplete = router
        .oneshot(get("/api/postulantes/existe/?complemento=1A"))
        .await
        .unwrap();
    assert_status(&incomplete, StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json_body(incomplete).await["error"],
        "Faltan campos requeridos."
    );
}

#[tokio::test]
async fn upload_route_stores_documents_by_content_type() {
    let (service, _, uploads) = build_service();
    let router = router_for(service);

    let accepted = router
        .clone()
        .oneshot(
            Request::post("/api/postulantes/upload/?name=ci.pdf")
                .header(header::CONTENT_TYPE, "application/pdf")
                .body(Body::from(pdf_bytes()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_status(&accepted, StatusCode::CREATED);
    assert_eq!(read_json_body(accepted).await["id"], 1);

    let rejected = router
        .clone()
        .oneshot(
            Request::post("/api/postulantes/upload/?name=notes.txt")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_status(&rejected, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let empty = router
        .oneshot(
            Request::post("/api/postulantes/upload/")
                .header(header::CONTENT_TYPE, "image/png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_status(&empty, StatusCode::BAD_REQUEST);
    assert_eq!(uploads.len(), 1);
}

#[tokio::test]
async fn upload_route_reads_the_file_part_of_a_form() {
    let (service, _, uploads) = build_service();
    let router = router_for(service);

    let accepted = router
        .clone()
        .oneshot(post_multipart(
            "/api/postulantes/upload/",
            &[
                Part::text("slot", "participation_screenshot"),
                Part::file("file", "yo-participo.png", "image/png", vec![0x89, b'P', b'N', b'G']),
            ],
        ))
        .await
        .unwrap();
    assert_status(&accepted, StatusCode::CREATED);
    assert_eq!(read_json_body(accepted).await["id"], 1);
    let stored = uploads.fetch(UploadId(1)).unwrap().expect("stored upload");
    assert_eq!(stored.name, "yo-participo.png");
    assert_eq!(stored.media_type, "image/png");

    let wrong_type = router
        .clone()
        .oneshot(post_multipart(
            "/api/postulantes/upload/",
            &[Part::file("file", "notes.txt", "text/plain", b"hello".to_vec())],
        ))
        .await
        .unwrap();
    assert_status(&wrong_type, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let without_file = router
        .oneshot(post_multipart(
            "/api/postulantes/upload/",
            &[Part::text("slot", "curriculum")],
        ))
        .await
        .unwrap();
    assert_status(&without_file, StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json_body(without_file).await["error"],
        "No se subió ningún archivo."
    );
    assert_eq!(uploads.len(), 1);
}

#[tokio::test]
async fn register_route_stores_attached_documents() {
    let (service, repository, uploads) = build_service();
    let mut submission = request(&service, "1234567");
    submission.form.set_document(
        DocumentSlot::IdentityCard,
        Some(FileRef::Local(LocalFile::placeholder(
            "ci.pdf",
            13,
            "application/pdf",
            1_700_000_000,
        ))),
    );
    let router = router_for(service);

    let response = router
        .oneshot(post_multipart(
            "/api/postulantes/",
            &[
                Part::text("solicitud", serde_json::to_vec(&submission).unwrap()),
                Part::file("identity_card", "ci.pdf", "application/pdf", pdf_bytes()),
            ],
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::CREATED);
    assert_eq!(read_json_body(response).await["pdfUrl"], "/api/postulantes/pdf/1234567/");
    assert_eq!(uploads.len(), 4);
    let record = repository
        .find_by_national_id("1234567")
        .unwrap()
        .expect("stored registrant");
    assert_eq!(
        record.form.document(DocumentSlot::IdentityCard),
        Some(&FileRef::Uploaded(UploadId(4)))
    );
}

#[tokio::test]
async fn register_route_without_attachment_asks_for_reupload() {
    let (service, _, _) = build_service();
    let mut submission = request(&service, "1234567");
    submission.form.set_document(
        DocumentSlot::Curriculum,
        Some(FileRef::Local(LocalFile::placeholder(
            "cv.pdf",
            13,
            "application/pdf",
            0,
        ))),
    );
    let router = router_for(service);

    let response = router
        .oneshot(post_multipart(
            "/api/postulantes/",
            &[Part::text("solicitud", serde_json::to_vec(&submission).unwrap())],
        ))
        .await
        .unwrap();

    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["errors"]["documents.curriculum"].is_string());
}

#[tokio::test]
async fn register_route_rejects_malformed_forms() {
    let (service, _, _) = build_service();
    let router = router_for(service);

    let missing_fields = router
        .clone()
        .oneshot(post_multipart(
            "/api/postulantes/",
            &[Part::file("curriculum", "cv.pdf", "application/pdf", pdf_bytes())],
        ))
        .await
        .unwrap();
    assert_status(&missing_fields, StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json_body(missing_fields).await["error"],
        "Faltan campos requeridos."
    );

    let unknown_part = router
        .oneshot(post_multipart(
            "/api/postulantes/",
            &[Part::file("passport", "passport.pdf", "application/pdf", pdf_bytes())],
        ))
        .await
        .unwrap();
    assert_status(&unknown_part, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_route_returns_receipt_then_conflict() {
    let (service, _, _) = build_service();
    let first = request(&service, "1234567");
    let second = request(&service, "1234567");
    let router = router_for(service);

    let created = router
        .clone()
        .oneshot(post_json("/api/postulantes/", &first))
        .await
        .unwrap();
    assert_status(&created, StatusCode::CREATED);
    let body = read_json_body(created).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], 1);
    assert_eq!(body["pdfUrl"], "/api/postulantes/pdf/1234567/");
    assert_eq!(body["nombreCompleto"], "Ana Quispe Mamani");

    let duplicate = router
        .oneshot(post_json("/api/postulantes/", &second))
        .await
        .unwrap();
    assert_status(&duplicate, StatusCode::CONFLICT);
    let body = read_json_body(duplicate).await;
    assert_eq!(body["kind"], "duplicate");
    assert_eq!(
        body["message"],
        "Ya existe un postulante con esta cédula de identidad y complemento"
    );
}

#[tokio::test]
async fn register_route_lists_field_errors() {
    let (service, _, _) = build_service();
    let mut invalid = request(&service, "1234567");
    invalid.form.mobile = "51234567".to_string();
    let router = router_for(service);

    let response = router
        .oneshot(post_json("/api/postulantes/", &invalid))
        .await
        .unwrap();

    assert_status(&response, StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "other");
    assert!(body["errors"]["mobile"].is_string());
}

#[tokio::test]
async fn register_route_is_forbidden_when_closed() {
    let (open, _, _) = build_service();
    let submission = request(&open, "1234567");
    let (service, _, _) = build_service_with(closed_settings());
    let router = router_for(service);

    let response = router
        .oneshot(post_json("/api/postulantes/", &submission))
        .await
        .unwrap();

    assert_status(&response, StatusCode::FORBIDDEN);
    assert_eq!(read_json_body(response).await["message"], "Convocatoria cerrada");
}

#[tokio::test]
async fn receipt_route_serves_rendered_document() {
    let (service, _, _) = build_service();
    service
        .register(request(&service, "1234567"))
        .expect("registration");
    let router = router_for(service);

    let response = router
        .clone()
        .oneshot(get("/api/postulantes/pdf/1234567/"))
        .await
        .unwrap();
    assert_status(&response, StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"comprobante_1234567.txt\""
    );
    assert!(response.headers().contains_key(header::CACHE_CONTROL));
    let text = read_text_body(response).await;
    assert!(text.contains("Ana Quispe Mamani"));

    let missing = router
        .oneshot(get("/api/postulantes/pdf/7654321/"))
        .await
        .unwrap();
    assert_status(&missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_list_export_and_summarize() {
    let (service, _, _) = build_service();
    for national_id in ["1000001", "1000002"] {
        service
            .register(request(&service, national_id))
            .expect("registration");
    }
    let router = router_for(service);

    let listing = router
        .clone()
        .oneshot(get("/api/admin/postulantes/?page=1&limit=1"))
        .await
        .unwrap();
    assert_status(&listing, StatusCode::OK);
    let body = read_json_body(listing).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));

    let export = router
        .clone()
        .oneshot(get("/api/admin/postulantes/export/"))
        .await
        .unwrap();
    assert_status(&export, StatusCode::OK);
    assert!(export.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let csv = read_text_body(export).await;
    assert_eq!(csv.lines().count(), 3);

    let statistics = router
        .oneshot(get("/api/admin/estadisticas/"))
        .await
        .unwrap();
    let body = read_json_body(statistics).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["declarations"]["powerbank"], 2);
    assert_eq!(
        body["data"]["last_24_hours"].as_array().map(Vec::len),
        Some(24)
    );
}

#[tokio::test]
async fn listing_past_the_last_page_is_empty() {
    let (service, _, _) = build_service();
    service
        .register(request(&service, "1000001"))
        .expect("registration");
    let router = router_for(service);

    let response = router
        .oneshot(get(&format!(
            "/api/admin/postulantes/?page={}&limit=20",
            usize::MAX
        )))
        .await
        .unwrap();

    assert_status(&response, StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn unavailable_repository_maps_to_service_unavailable() {
    let service = Arc::new(IntakeService::new(
        Arc::new(UnavailableRepository),
        Arc::new(InMemoryUploadStore::default()),
        IntakeSettings::default(),
    ));
    let router = intake_router(service);

    let response = router
        .oneshot(get("/api/postulantes/existe/?cedula_identidad=1234567"))
        .await
        .unwrap();

    assert_status(&response, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json_body(response).await["success"], false);
}
