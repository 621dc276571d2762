use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::AdvisorContext;
use crate::ai_models::VehicleComparisonReport;
use crate::errors::AppError;
use crate::metrics::{five_year_costs, CostAnalysis};
use crate::models::{AnalysisKind, NewAnalysisRecord, VehicleRecord};
use crate::pipeline::run_model_stage;
use crate::prompts::comparison_prompt;
use crate::query::VehicleQuery;

pub const SAVE_FAILURE: &str = "Failed to save comparison";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleBasics {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub formatted_price: String,
    /// First listing image, if any.
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalSummary {
    pub id: Uuid,
    pub green_score: f64,
    pub metrics: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub basics: Vec<VehicleBasics>,
    pub comparison: VehicleComparisonReport,
    pub cost_analysis: Vec<CostAnalysis>,
    pub environmental: Vec<EnvironmentalSummary>,
}

/// Compares two or more listed vehicles: model-written feature and value analysis plus
/// five-year ownership costs.
pub async fn compare_vehicles(
    ctx: &AdvisorContext,
    vehicle_ids: &[Uuid],
    requester: Option<Uuid>,
    current_year: i32,
) -> Result<ComparisonResult, AppError> {
    let mut ids = vehicle_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() < 2 {
        return Err(AppError::BadRequest(
            "Select at least two vehicles to compare".to_string(),
        ));
    }

    let vehicles = ctx.vehicles.find_vehicles(&VehicleQuery::by_ids(&ids)).await?;
    match vehicles.len() {
        0 => return Err(AppError::NotFound("No cars found".to_string())),
        1 => {
            return Err(AppError::BadRequest(
                "Select at least two vehicles to compare".to_string(),
            ))
        }
        _ => {}
    }

    let prompt = comparison_prompt(&vehicles);
    let comparison: VehicleComparisonReport = run_model_stage(ctx.model.as_ref(), &prompt).await?;

    let found_ids: Vec<Uuid> = vehicles.iter().map(|v| v.id).collect();
    ctx.persist(AnalysisKind::Comparison, requester, &found_ids, &comparison)
        .await;

    Ok(ComparisonResult {
        basics: vehicles.iter().map(|v| basics(v, ctx)).collect(),
        cost_analysis: vehicles
            .iter()
            .map(|v| five_year_costs(v, &ctx.costs, current_year))
            .collect(),
        environmental: vehicles
            .iter()
            .map(|v| EnvironmentalSummary {
                id: v.id,
                green_score: v.green_score.unwrap_or(0.0),
                metrics: v
                    .environmental_metrics
                    .clone()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            })
            .collect(),
        comparison,
    })
}

fn basics(vehicle: &VehicleRecord, ctx: &AdvisorContext) -> VehicleBasics {
    VehicleBasics {
        id: vehicle.id,
        make: vehicle.make.clone(),
        model: vehicle.model.clone(),
        year: vehicle.year,
        price: vehicle.price,
        formatted_price: ctx.pricing.format_price(vehicle.price),
        image: vehicle.images.first().cloned(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedComparison {
    pub id: Uuid,
    pub car_ids: Vec<Uuid>,
}

/// Stores a comparison the requester chose to keep.
///
/// Unlike the automatic records written by the features, a failed write is reported.
pub async fn save_comparison(
    ctx: &AdvisorContext,
    requester: Option<Uuid>,
    vehicle_ids: &[Uuid],
    data: Value,
) -> Result<SavedComparison, AppError> {
    let user_id =
        requester.ok_or_else(|| AppError::Unauthorized("saving needs a requester".to_string()))?;
    if vehicle_ids.is_empty() {
        return Err(AppError::BadRequest("No vehicles to save".to_string()));
    }

    let id = ctx
        .analyses
        .create_analysis_record(NewAnalysisRecord {
            kind: AnalysisKind::Comparison,
            user_id,
            vehicle_ids: vehicle_ids.to_vec(),
            payload: data,
        })
        .await?;

    Ok(SavedComparison {
        id,
        car_ids: vehicle_ids.to_vec(),
    })
}
