//! Receipt documents handed back to registrants.
//!
//! The QR payload is the base64 encoding of a small JSON object identifying the
//! registrant; the renderer decides how the rest of the document looks.

use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;

use super::domain::RegistrantRecord;
use crate::workflows::registration::domain::Declaration;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("receipt payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("receipt layout failed: {0}")]
    Layout(#[from] std::fmt::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReceipt {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, record: &RegistrantRecord) -> Result<RenderedReceipt, RenderError>;
}

#[derive(Serialize)]
struct QrPayload<'a> {
    ci: &'a str,
    complemento: Option<String>,
    nombres: String,
    #[serde(rename = "fechaNacimiento")]
    fecha_nacimiento: Option<String>,
    #[serde(rename = "fechaPostulacion")]
    fecha_postulacion: String,
}

/// Base64 of the identifying JSON embedded in the receipt's QR code.
pub fn qr_payload(record: &RegistrantRecord) -> Result<String, RenderError> {
    let payload = QrPayload {
        ci: record.verification.national_id.trim(),
        complemento: record.verification.normalized_complement(),
        nombres: record.full_name(),
        fecha_nacimiento: record
            .form
            .birth_date
            .map(|date| date.format("%Y-%m-%d").to_string()),
        fecha_postulacion: record.registered_at.to_rfc3339(),
    };
    let json = serde_json::to_vec(&payload)?;
    Ok(BASE64.encode(json))
}

pub fn receipt_file_name(national_id: &str, extension: &str) -> String {
    format!("comprobante_{}.{extension}", national_id.trim())
}

/// Renders the receipt as a UTF-8 text document.
#[derive(Debug, Clone)]
pub struct PlainTextReceiptRenderer {
    title: String,
}

impl Default for PlainTextReceiptRenderer {
    fn default() -> Self {
        Self {
            title: "SIREPRE - COMPROBANTE DE POSTULACION".to_string(),
        }
    }
}

impl PlainTextReceiptRenderer {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl ReceiptRenderer for PlainTextReceiptRenderer {
    fn render(&self, record: &RegistrantRecord) -> Result<RenderedReceipt, RenderError> {
        let form = &record.form;
        let mut out = String::new();

        writeln!(out, "{}", self.title)?;
        writeln!(out, "{}", "=".repeat(self.title.chars().count()))?;
        writeln!(out, "Registro N.: {:06}", record.id.0)?;
        writeln!(
            out,
            "Fecha de registro: {}",
            record.registered_at.format("%d/%m/%Y %H:%M")
        )?;
        writeln!(out)?;
        writeln!(out, "Nombre completo: {}", record.full_name())?;
        writeln!(
            out,
            "Cedula de identidad: {}",
            record.verification.display_id()
        )?;
        if let Some(birth_date) = form.birth_date {
            writeln!(out, "Fecha de nacimiento: {}", birth_date.format("%d/%m/%Y"))?;
        }
        if let Some(education) = form.education {
            writeln!(out, "Grado de instruccion: {}", education.label())?;
        }
        if !form.career.is_empty() {
            writeln!(out, "Carrera: {}", form.career)?;
        }
        writeln!(out, "Celular: {}", form.mobile)?;
        writeln!(out, "Correo: {}", form.email)?;
        if let Some(position) = form.position {
            writeln!(out, "Cargo: {}", position.label())?;
        }
        writeln!(out)?;
        writeln!(out, "Requisitos:")?;
        for declaration in Declaration::ALL {
            let mark = if form.declarations.get(declaration) {
                "SI"
            } else {
                "NO"
            };
            writeln!(out, "  [{mark}] {}", declaration.label())?;
        }
        if let Some(observation) = &record.observation {
            writeln!(out)?;
            writeln!(out, "Observacion: {observation}")?;
        }
        writeln!(out)?;
        writeln!(out, "QR: {}", qr_payload(record)?)?;

        Ok(RenderedReceipt {
            file_name: receipt_file_name(&record.verification.national_id, "txt"),
            media_type: "text/plain; charset=utf-8",
            bytes: out.into_bytes(),
        })
    }
}
