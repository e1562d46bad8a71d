use crate::cli::ServeArgs;
use crate::infra::{load_station_catalog, memory_intake_service, AppState};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use sirepre::config::AppConfig;
use sirepre::error::AppError;
use sirepre::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.closed {
        config.portal.open = false;
    }
    if let Some(stations) = args.stations.take() {
        config.portal.stations_csv = Some(stations);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let stations = load_station_catalog(config.portal.stations_csv.as_deref())?;
    let intake_service = memory_intake_service(config.portal.intake_settings(), stations);

    let app = with_application_routes(intake_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        portal_open = config.portal.open,
        "registration intake ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
