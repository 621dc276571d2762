use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::lenient_serde as lenient;

// ============ Features ============

/// The five model-backed features served by the advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Chat,
    Comparison,
    EnvironmentalImpact,
    MaintenancePrediction,
    PriceAnalysis,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Chat => "chat",
            Feature::Comparison => "comparison",
            Feature::EnvironmentalImpact => "environmental_impact",
            Feature::MaintenancePrediction => "maintenance_prediction",
            Feature::PriceAnalysis => "price_analysis",
        }
    }

    /// Top-level keys the model output must carry for this feature.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Feature::Chat => &["preferences"],
            Feature::Comparison => &["featureComparison", "valueAnalysis", "recommendation"],
            Feature::EnvironmentalImpact => {
                &["carbonFootprint", "greenScore", "environmentalMetrics"]
            }
            Feature::MaintenancePrediction => &["nextServices", "maintenanceSchedule"],
            Feature::PriceAnalysis => &[
                "marketValue",
                "priceAnalysis",
                "buyingRecommendation",
                "seasonalTrends",
            ],
        }
    }

    /// Shown when the model answered but its output could not be used.
    pub fn parse_failure_message(self) -> &'static str {
        match self {
            Feature::Chat => "Failed to parse AI response",
            Feature::Comparison => "Failed to parse comparison data",
            Feature::EnvironmentalImpact => "Failed to parse environmental data",
            Feature::MaintenancePrediction => "Failed to parse maintenance prediction",
            Feature::PriceAnalysis => "Failed to parse price analysis",
        }
    }

    /// Shown for every other failure of the feature.
    pub fn process_failure_message(self) -> &'static str {
        match self {
            Feature::Chat => "Failed to process your message. Please try again.",
            Feature::Comparison => "Failed to compare vehicles",
            Feature::EnvironmentalImpact => "Failed to calculate environmental impact",
            Feature::MaintenancePrediction => "Failed to generate maintenance prediction",
            Feature::PriceAnalysis => "Failed to analyze price",
        }
    }
}

// ============ Database Models ============

/// Row shape of the `cars` table.
///
/// Prices are stored as NUMERIC and converted to `f64` once, in [`VehicleRecord::from`].
#[derive(Debug, Clone, FromRow)]
pub struct VehicleRow {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: Option<BigDecimal>,
    pub mileage: Option<i32>,
    pub fuel_type: String,
    pub transmission: Option<String>,
    pub body_type: Option<String>,
    pub seats: Option<i32>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub images: Vec<String>,
    pub green_score: Option<f64>,
    pub environmental_metrics: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// A vehicle listed by the dealership. Read-only to the advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    /// List price in USD.
    pub price: f64,
    pub mileage: Option<i32>,
    pub fuel_type: String,
    pub transmission: Option<String>,
    pub body_type: Option<String>,
    pub seats: Option<i32>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub images: Vec<String>,
    pub green_score: Option<f64>,
    pub environmental_metrics: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<VehicleRow> for VehicleRecord {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.id,
            make: row.make,
            model: row.model,
            year: row.year,
            price: row.price.as_ref().and_then(|p| p.to_f64()).unwrap_or(0.0),
            mileage: row.mileage,
            fuel_type: row.fuel_type,
            transmission: row.transmission,
            body_type: row.body_type,
            seats: row.seats,
            description: row.description,
            color: row.color,
            images: row.images,
            green_score: row.green_score,
            environmental_metrics: row.environmental_metrics,
            created_at: row.created_at,
        }
    }
}

impl VehicleRecord {
    /// Display name such as "2022 Tesla Model Y".
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    pub fn is_electric(&self) -> bool {
        self.fuel_type.eq_ignore_ascii_case("electric")
    }
}

/// Kind of a persisted analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    MaintenancePrediction,
    EnvironmentalImpact,
    PriceAnalysis,
    Comparison,
}

impl AnalysisKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::MaintenancePrediction => "maintenance_prediction",
            AnalysisKind::EnvironmentalImpact => "environmental_impact",
            AnalysisKind::PriceAnalysis => "price_analysis",
            AnalysisKind::Comparison => "comparison",
        }
    }
}

/// A stored analysis, attributed to one requester and one or more vehicles.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub kind: String,
    pub user_id: Uuid,
    pub vehicle_ids: Vec<Uuid>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Input for a new append-only analysis record.
#[derive(Debug, Clone)]
pub struct NewAnalysisRecord {
    pub kind: AnalysisKind,
    pub user_id: Uuid,
    pub vehicle_ids: Vec<Uuid>,
    pub payload: Value,
}

// ============ Search Criteria ============

/// Vehicle search criteria extracted from free text.
///
/// Every field is optional; an absent field never constrains a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceFilter {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub fuel_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub body_type: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub make: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub min_price: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub max_price: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_i32")]
    pub min_year: Option<i32>,
    #[serde(deserialize_with = "lenient::opt_i32")]
    pub max_year: Option<i32>,
}

impl PreferenceFilter {
    pub fn is_empty(&self) -> bool {
        *self == PreferenceFilter::default()
    }
}

/// Criteria for eco-friendly recommendations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EcoCriteria {
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub max_price: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub body_type: Option<String>,
}

// ============ API Request/Response Models ============

/// Uniform result envelope returned by every feature.
///
/// Serializes as `{ "success": true, "data": ... }` or `{ "success": false, "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult<T> {
    Success { success: bool, data: T },
    Failure { success: bool, error: String },
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        ActionResult::Success {
            success: true,
            data,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ActionResult::Failure {
            success: false,
            error: error.into(),
        }
    }

    /// Logs `err` and converts it to the caller-facing message of `feature`.
    pub fn from_error(feature: Feature, err: &AppError) -> Self {
        err.log(feature);
        Self::failure(err.user_message(feature))
    }

    /// Like [`ActionResult::from_result`] for operations that do not call the model.
    pub fn from_operation(
        operation: &str,
        failure_message: &str,
        result: Result<T, AppError>,
    ) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                tracing::error!("{} failed: {}", operation, e);
                Self::failure(e.caller_message(failure_message))
            }
        }
    }

    pub fn from_result(feature: Feature, result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(feature, &e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ActionResult::Success { data, .. } => Some(data),
            ActionResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionResult::Success { .. } => None,
            ActionResult::Failure { error, .. } => Some(error),
        }
    }
}

/// One prior message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Request body of the chat endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Request body for endpoints operating on several vehicles.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleIdsRequest {
    pub car_ids: Vec<Uuid>,
}

/// Request body for saving a comparison the caller already has.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveComparisonRequest {
    pub car_ids: Vec<Uuid>,
    pub data: Value,
}
