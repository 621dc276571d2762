use serde::Serialize;
use uuid::Uuid;

use super::AdvisorContext;
use crate::ai_models::PriceAnalysisReport;
use crate::errors::AppError;
use crate::metrics::{
    average_price, depreciation_rate, price_distribution, projected_values, PriceDistribution,
    PricePoint, ProjectedValue,
};
use crate::models::AnalysisKind;
use crate::pipeline::run_model_stage;
use crate::prompts::price_analysis_prompt;
use crate::query::VehicleQuery;
use crate::vehicles::require_vehicle;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Depreciation {
    pub rate: f64,
    pub projected_values: Vec<ProjectedValue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketComparison {
    pub similar_cars: Vec<PricePoint>,
    pub average_price: f64,
    /// `None` when no similar vehicle is listed.
    pub price_distribution: Option<PriceDistribution>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysisResult {
    pub current_price: f64,
    pub formatted_price: String,
    pub analysis: PriceAnalysisReport,
    pub depreciation: Depreciation,
    pub market_comparison: MarketComparison,
}

/// Market position, depreciation curve and buying advice for a listed vehicle.
pub async fn analyze_price_history(
    ctx: &AdvisorContext,
    vehicle_id: Uuid,
    requester: Option<Uuid>,
    current_year: i32,
) -> Result<PriceAnalysisResult, AppError> {
    let vehicle = require_vehicle(ctx.vehicles.as_ref(), vehicle_id).await?;

    let similar = ctx
        .vehicles
        .find_vehicles(&VehicleQuery::similar_to(&vehicle))
        .await?;
    // Listings without a price (stored as 0) would drag the market figures down
    let similar: Vec<PricePoint> = similar
        .iter()
        .filter(|v| v.price > 0.0)
        .map(PricePoint::from)
        .collect();
    let prices: Vec<f64> = similar.iter().map(|p| p.price).collect();

    let rate = depreciation_rate(PricePoint::from(&vehicle), &similar);
    let average = average_price(&prices);
    tracing::debug!(
        "{} has {} similar listing(s), depreciation {:.4}",
        vehicle.display_name(),
        similar.len(),
        rate
    );

    let prompt = price_analysis_prompt(&vehicle, &similar, average, rate);
    let analysis: PriceAnalysisReport = run_model_stage(ctx.model.as_ref(), &prompt).await?;

    ctx.persist(AnalysisKind::PriceAnalysis, requester, &[vehicle.id], &analysis)
        .await;

    Ok(PriceAnalysisResult {
        current_price: vehicle.price,
        formatted_price: ctx.pricing.format_price(vehicle.price),
        analysis,
        depreciation: Depreciation {
            rate,
            projected_values: projected_values(vehicle.price, rate, current_year),
        },
        market_comparison: MarketComparison {
            price_distribution: price_distribution(&prices),
            average_price: average,
            similar_cars: similar,
        },
    })
}
