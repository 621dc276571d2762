use crate::config::Config;
use crate::features::chat::{process_chat_message, ChatResponse};
use crate::features::comparison::{self, compare_vehicles, save_comparison, ComparisonResult, SavedComparison};
use crate::features::environmental::{
    self, calculate_environmental_impact, compare_environmental_impact,
    eco_friendly_recommendations, EcoVehicle,
};
use crate::features::maintenance::{
    self, generate_maintenance_prediction, maintenance_history, service_reminders,
    ServiceReminder,
};
use crate::features::price_analysis::{analyze_price_history, PriceAnalysisResult};
use crate::features::AdvisorContext;
use crate::ai_models::{EnvironmentalImpact, MaintenancePrediction};
use crate::identity::{current_requester, IdentityResolver};
use crate::metrics::EnvironmentalComparisonEntry;
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub advisor: AdvisorContext,
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppState {
    async fn requester(&self, headers: &HeaderMap) -> Option<Uuid> {
        current_requester(self.identity.as_ref(), headers).await
    }
}

/// Every `/api/v1` route. Rate limiting and the other transport layers are added in `main`.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/vehicles/:id/maintenance", post(predict_maintenance))
        .route(
            "/api/v1/vehicles/:id/maintenance/history",
            get(get_maintenance_history),
        )
        .route(
            "/api/v1/vehicles/:id/maintenance/reminders",
            get(get_service_reminders),
        )
        .route(
            "/api/v1/vehicles/:id/environmental-impact",
            post(environmental_impact),
        )
        .route("/api/v1/eco-recommendations", get(eco_recommendations))
        .route("/api/v1/environmental/compare", post(environmental_compare))
        .route("/api/v1/vehicles/:id/price-analysis", post(price_analysis))
        .route("/api/v1/comparisons/analyze", post(analyze_comparison))
        .route("/api/v1/comparisons", post(store_comparison))
}

/// GET /health
///
/// Reports the service as degraded (503) when the database stops answering.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = crate::db::ping(&state.db).await;
    let (status, label) = if database_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "autovolt-api",
            "version": env!("CARGO_PKG_VERSION"),
            "database": if database_ok { "up" } else { "down" },
            "model": state.config.gemini_model,
        })),
    )
}

/// POST /api/v1/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ActionResult<ChatResponse>> {
    tracing::info!(
        "POST /chat - {} chars, {} prior turn(s)",
        request.message.len(),
        request.history.len()
    );

    let result = process_chat_message(&state.advisor, &request.message, &request.history).await;
    Json(ActionResult::from_result(Feature::Chat, result))
}

/// POST /api/v1/vehicles/:id/maintenance
pub async fn predict_maintenance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Json<ActionResult<MaintenancePrediction>> {
    tracing::info!("POST /vehicles/{}/maintenance", id);

    let requester = state.requester(&headers).await;
    let result = generate_maintenance_prediction(&state.advisor, id, requester).await;
    Json(ActionResult::from_result(Feature::MaintenancePrediction, result))
}

/// GET /api/v1/vehicles/:id/maintenance/history
pub async fn get_maintenance_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Json<ActionResult<Vec<AnalysisRecord>>> {
    tracing::debug!("GET /vehicles/{}/maintenance/history", id);

    let requester = state.requester(&headers).await;
    let result = maintenance_history(&state.advisor, id, requester).await;
    Json(ActionResult::from_operation(
        "maintenance history",
        maintenance::HISTORY_FAILURE,
        result,
    ))
}

/// GET /api/v1/vehicles/:id/maintenance/reminders
pub async fn get_service_reminders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<ActionResult<Vec<ServiceReminder>>> {
    tracing::debug!("GET /vehicles/{}/maintenance/reminders", id);

    let result = service_reminders(&state.advisor, id, Utc::now()).await;
    Json(ActionResult::from_operation(
        "service reminders",
        maintenance::REMINDERS_FAILURE,
        result,
    ))
}

/// POST /api/v1/vehicles/:id/environmental-impact
pub async fn environmental_impact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Json<ActionResult<EnvironmentalImpact>> {
    tracing::info!("POST /vehicles/{}/environmental-impact", id);

    let requester = state.requester(&headers).await;
    let result = calculate_environmental_impact(&state.advisor, id, requester).await;
    Json(ActionResult::from_result(Feature::EnvironmentalImpact, result))
}

/// GET /api/v1/eco-recommendations?maxPrice=&bodyType=
pub async fn eco_recommendations(
    State(state): State<Arc<AppState>>,
    Query(criteria): Query<EcoCriteria>,
) -> Json<ActionResult<Vec<EcoVehicle>>> {
    tracing::debug!("GET /eco-recommendations - {:?}", criteria);

    let result = eco_friendly_recommendations(&state.advisor, &criteria).await;
    Json(ActionResult::from_operation(
        "eco-friendly recommendations",
        environmental::ECO_FAILURE,
        result,
    ))
}

/// POST /api/v1/environmental/compare
pub async fn environmental_compare(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VehicleIdsRequest>,
) -> Json<ActionResult<Vec<EnvironmentalComparisonEntry>>> {
    tracing::debug!("POST /environmental/compare - {} id(s)", request.car_ids.len());

    let result = compare_environmental_impact(&state.advisor, &request.car_ids).await;
    Json(ActionResult::from_operation(
        "environmental comparison",
        environmental::COMPARE_FAILURE,
        result,
    ))
}

/// POST /api/v1/vehicles/:id/price-analysis
pub async fn price_analysis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Json<ActionResult<PriceAnalysisResult>> {
    tracing::info!("POST /vehicles/{}/price-analysis", id);

    let requester = state.requester(&headers).await;
    let result = analyze_price_history(&state.advisor, id, requester, Utc::now().year()).await;
    Json(ActionResult::from_result(Feature::PriceAnalysis, result))
}

/// POST /api/v1/comparisons/analyze
pub async fn analyze_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<VehicleIdsRequest>,
) -> Json<ActionResult<ComparisonResult>> {
    tracing::info!("POST /comparisons/analyze - {:?}", request.car_ids);

    let requester = state.requester(&headers).await;
    let result = compare_vehicles(
        &state.advisor,
        &request.car_ids,
        requester,
        Utc::now().year(),
    )
    .await;
    Json(ActionResult::from_result(Feature::Comparison, result))
}

/// POST /api/v1/comparisons
pub async fn store_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SaveComparisonRequest>,
) -> Json<ActionResult<SavedComparison>> {
    tracing::info!("POST /comparisons - {:?}", request.car_ids);

    let requester = state.requester(&headers).await;
    let result = save_comparison(&state.advisor, requester, &request.car_ids, request.data).await;
    Json(ActionResult::from_operation(
        "save comparison",
        comparison::SAVE_FAILURE,
        result,
    ))
}
