//! Server side of the registration call.
//!
//! [`IntakeService`] owns the status flag, duplicate lookup, document uploads,
//! registration, receipts, the polling-station catalogue, and the admin views. It is
//! served over HTTP by [`intake_router`] and also implements the registration
//! collaborator traits so the flow can run against it in-process.

pub mod domain;
mod gateway;
pub mod memory;
pub mod receipt;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod stations;

#[cfg(test)]
mod tests;

pub use domain::{
    IntakeSettings, RegistrantId, RegistrantRecord, RegistrantSummary, RegistrationReceipt,
};
pub use memory::{InMemoryRegistrantRepository, InMemoryUploadStore};
pub use receipt::{
    qr_payload, PlainTextReceiptRenderer, ReceiptRenderer, RenderError, RenderedReceipt,
};
pub use report::{HourlyCount, ListingPage, ListingQuery, RegistrationStatistics};
pub use repository::{RegistrantRepository, RepositoryError, StoredUpload, UploadStore};
pub use router::intake_router;
pub use service::{IntakeService, IntakeServiceError};
pub use stations::{ImportSummary, PollingStation, StationCatalog};
