use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_lifecycle_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tenant_lifecycle::config::AppConfig;
use tenant_lifecycle::error::AppError;
use tenant_lifecycle::telemetry;
use tenant_lifecycle::workflows::lifecycle::Collaborators;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let collaborators = Collaborators::live(&config.lifecycle)?;
    if !collaborators.dispatcher.is_configured() {
        warn!("deployment dispatch is not configured; tenant creations will be marked failed");
    }
    if config.lifecycle.status_tokens.is_empty() {
        warn!("no STATUS_API_TOKENS configured; every lifecycle request will be rejected");
    }
    let api = Arc::new(collaborators.api(&config.lifecycle));

    let app = with_lifecycle_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tenant lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
