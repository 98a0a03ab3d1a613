use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use intake_wizard::workflows::intake::{
    intake_router, IntakeWizardService, StepId, StepSchema, SubStepId,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlueprintStepView {
    pub(crate) number: u8,
    pub(crate) key: StepId,
    pub(crate) title: &'static str,
    pub(crate) sub_steps: Vec<SubStepId>,
}

impl BlueprintStepView {
    fn from_schema(schema: &StepSchema) -> Self {
        Self {
            number: schema.id.number(),
            key: schema.id,
            title: schema.id.label(),
            sub_steps: schema.sub_steps.iter().map(|sub_step| sub_step.id).collect(),
        }
    }
}

pub(crate) fn with_intake_routes(service: Arc<IntakeWizardService>) -> axum::Router {
    let steps: Arc<Vec<BlueprintStepView>> = Arc::new(
        service
            .blueprint()
            .steps()
            .iter()
            .map(BlueprintStepView::from_schema)
            .collect(),
    );

    intake_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/blueprint",
            axum::routing::get(move || blueprint_endpoint(steps.clone())),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn blueprint_endpoint(
    steps: Arc<Vec<BlueprintStepView>>,
) -> Json<serde_json::Value> {
    Json(json!({ "steps": steps.as_slice() }))
}
