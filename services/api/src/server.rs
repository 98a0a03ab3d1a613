use crate::cli::ServeArgs;
use crate::infra::{in_memory_backends, AppState};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use intake_wizard::config::AppConfig;
use intake_wizard::error::AppError;
use intake_wizard::telemetry;
use intake_wizard::workflows::intake::IntakeWizardService;
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
    if args.lenient_submit {
        config.intake.enforce_completeness = false;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backends = in_memory_backends(&config.intake)?;
    let wizard_service = Arc::new(IntakeWizardService::new(
        backends.gateways,
        &config.intake,
    ));

    let app = with_intake_routes(wizard_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        enforce_completeness = config.intake.enforce_completeness,
        "intake wizard service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
