use serde::Serialize;
use uuid::Uuid;

use super::AdvisorContext;
use crate::ai_models::EnvironmentalImpact;
use crate::errors::AppError;
use crate::metrics::{environmental_comparison, EnvironmentalComparisonEntry};
use crate::models::{AnalysisKind, EcoCriteria, VehicleRecord};
use crate::pipeline::run_model_stage;
use crate::prompts::environmental_prompt;
use crate::query::VehicleQuery;
use crate::vehicles::require_vehicle;

pub const ECO_FAILURE: &str = "Failed to fetch eco-friendly recommendations";
pub const COMPARE_FAILURE: &str = "Failed to compare environmental impact";

/// Estimates the carbon footprint and green score of a vehicle.
pub async fn calculate_environmental_impact(
    ctx: &AdvisorContext,
    vehicle_id: Uuid,
    requester: Option<Uuid>,
) -> Result<EnvironmentalImpact, AppError> {
    let vehicle = require_vehicle(ctx.vehicles.as_ref(), vehicle_id).await?;

    let prompt = environmental_prompt(&vehicle);
    let impact: EnvironmentalImpact = run_model_stage(ctx.model.as_ref(), &prompt).await?;

    ctx.persist(
        AnalysisKind::EnvironmentalImpact,
        requester,
        &[vehicle.id],
        &impact,
    )
    .await;

    Ok(impact)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EcoVehicle {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub formatted_price: String,
    pub fuel_type: String,
    pub green_score: Option<f64>,
    pub images: Vec<String>,
}

/// Up to five electric or hybrid vehicles, highest green score first.
pub async fn eco_friendly_recommendations(
    ctx: &AdvisorContext,
    criteria: &EcoCriteria,
) -> Result<Vec<EcoVehicle>, AppError> {
    let vehicles = ctx
        .vehicles
        .find_vehicles(&VehicleQuery::eco_friendly(criteria))
        .await?;

    Ok(vehicles
        .into_iter()
        .map(|v: VehicleRecord| EcoVehicle {
            formatted_price: ctx.pricing.format_price(v.price),
            id: v.id,
            make: v.make,
            model: v.model,
            year: v.year,
            price: v.price,
            fuel_type: v.fuel_type,
            green_score: v.green_score,
            images: v.images,
        })
        .collect())
}

/// Side-by-side green scores of the given vehicles, from stored data only.
pub async fn compare_environmental_impact(
    ctx: &AdvisorContext,
    vehicle_ids: &[Uuid],
) -> Result<Vec<EnvironmentalComparisonEntry>, AppError> {
    if vehicle_ids.is_empty() {
        return Ok(Vec::new());
    }

    let vehicles = ctx
        .vehicles
        .find_vehicles(&VehicleQuery::by_ids(vehicle_ids))
        .await?;

    Ok(environmental_comparison(&vehicles))
}
