use metrics_exporter_prometheus::PrometheusHandle;
use sirepre::error::AppError;
use sirepre::workflows::intake::{
    InMemoryRegistrantRepository, InMemoryUploadStore, IntakeService, IntakeSettings,
    StationCatalog,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type MemoryIntakeService =
    IntakeService<InMemoryRegistrantRepository, InMemoryUploadStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Intake backend kept entirely in process memory.
pub(crate) fn memory_intake_service(
    settings: IntakeSettings,
    stations: StationCatalog,
) -> Arc<MemoryIntakeService> {
    Arc::new(
        IntakeService::new(
            Arc::new(InMemoryRegistrantRepository::default()),
            Arc::new(InMemoryUploadStore::default()),
            settings,
        )
        .with_stations(stations),
    )
}

/// Empty catalogue when no export is configured.
pub(crate) fn load_station_catalog(path: Option<&Path>) -> Result<StationCatalog, AppError> {
    let Some(path) = path else {
        return Ok(StationCatalog::default());
    };

    let (catalog, summary) = StationCatalog::from_path(path)?;
    info!(
        path = %path.display(),
        imported = summary.imported,
        skipped = summary.skipped,
        "polling stations loaded"
    );
    Ok(catalog)
}
