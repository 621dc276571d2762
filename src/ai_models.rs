//! Typed records produced from language-model output, one per feature.
//!
//! Each record is the result of validating a decoded JSON object: required top-level
//! sections have no serde default, so their absence fails construction, while leaves are
//! lenient (see [`crate::lenient_serde`]). Unknown keys are ignored.

use serde::de::DeserializeOwned;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::lenient_serde as lenient;
use crate::models::{Feature, PreferenceFilter};

/// A record that can be built from the model output of one feature.
pub trait FeaturePayload: DeserializeOwned + Serialize + Send + 'static {
    const FEATURE: Feature;
}

/// Priority or impact level as reported by the model. Anything unrecognized is `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "Option<Value>")]
pub enum Level {
    High,
    #[default]
    Medium,
    Low,
}

impl From<Option<Value>> for Level {
    fn from(value: Option<Value>) -> Self {
        match value.as_ref().and_then(Value::as_str).map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("high") => Level::High,
            Some(v) if v.eq_ignore_ascii_case("low") => Level::Low,
            _ => Level::Medium,
        }
    }
}

// ============ Chat ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModelReply {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
    pub preferences: PreferenceFilter,
    #[serde(default, deserialize_with = "lenient::bool")]
    pub should_ask_more: bool,
}

impl FeaturePayload for ChatModelReply {
    const FEATURE: Feature = Feature::Chat;
}

// ============ Maintenance ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenancePrediction {
    #[serde(deserialize_with = "list")]
    pub next_services: Vec<ServiceItem>,
    #[serde(default, deserialize_with = "list")]
    pub parts_replacement: Vec<PartReplacement>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pub total_maintenance_cost: f64,
    pub maintenance_schedule: MaintenanceSchedule,
}

impl FeaturePayload for MaintenancePrediction {
    const FEATURE: Feature = Feature::MaintenancePrediction;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceItem {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub service_name: Option<String>,
    /// Odometer reading at which the service is due.
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub due_at: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    pub estimated_cost: f64,
    pub priority: Level,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartReplacement {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub part_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub recommended_replacement_mileage: Option<f64>,
    #[serde(deserialize_with = "lenient::f64")]
    pub estimated_cost: f64,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSchedule {
    #[serde(deserialize_with = "lenient::string_list")]
    pub immediate: Vec<String>,
    #[serde(rename = "next3Months", deserialize_with = "lenient::string_list")]
    pub next_3_months: Vec<String>,
    #[serde(rename = "next6Months", deserialize_with = "lenient::string_list")]
    pub next_6_months: Vec<String>,
    #[serde(rename = "next12Months", deserialize_with = "lenient::string_list")]
    pub next_12_months: Vec<String>,
}

// ============ Environmental impact ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalImpact {
    pub carbon_footprint: CarbonFootprint,
    pub green_score: GreenScore,
    pub environmental_metrics: EnvironmentalMetrics,
}

impl FeaturePayload for EnvironmentalImpact {
    const FEATURE: Feature = Feature::EnvironmentalImpact;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbonFootprint {
    /// Kilograms of CO2 per year.
    #[serde(rename = "annualCO2Emissions", deserialize_with = "lenient::f64")]
    pub annual_co2_emissions: f64,
    #[serde(rename = "lifetimeCO2Emissions", deserialize_with = "lenient::f64")]
    pub lifetime_co2_emissions: f64,
    #[serde(rename = "comparisonToAverage", deserialize_with = "lenient::f64")]
    pub comparison_to_average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenScore {
    #[serde(default, deserialize_with = "lenient::f64")]
    pub score: f64,
    #[serde(default = "default_max_score", deserialize_with = "max_score")]
    pub max_score: f64,
    #[serde(default, deserialize_with = "list")]
    pub factors: Vec<GreenFactor>,
}

impl Default for GreenScore {
    fn default() -> Self {
        Self {
            score: 0.0,
            max_score: default_max_score(),
            factors: Vec::new(),
        }
    }
}

fn default_max_score() -> f64 {
    100.0
}

fn max_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient::opt_f64(deserializer)?.unwrap_or_else(default_max_score))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenFactor {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::f64")]
    pub score: f64,
    pub impact: Level,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentalMetrics {
    #[serde(deserialize_with = "lenient::f64")]
    pub fuel_efficiency: f64,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub emissions_category: Option<String>,
    #[serde(deserialize_with = "lenient::f64")]
    pub renewable_compatibility: f64,
}

// ============ Price analysis ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysisReport {
    pub market_value: MarketValue,
    pub price_analysis: PriceAssessment,
    pub buying_recommendation: BuyingRecommendation,
    pub seasonal_trends: SeasonalTrends,
}

impl FeaturePayload for PriceAnalysisReport {
    const FEATURE: Feature = Feature::PriceAnalysis;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketValue {
    #[serde(deserialize_with = "lenient::f64")]
    pub estimated_value: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub confidence: f64,
    pub price_range: PriceRange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRange {
    #[serde(deserialize_with = "lenient::f64")]
    pub low: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub high: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceAssessment {
    #[serde(deserialize_with = "lenient::bool")]
    pub is_price_competitive: bool,
    /// EXCELLENT, GOOD, FAIR or HIGH.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub value_rating: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuyingRecommendation {
    /// BUY_NOW, WAIT or NEGOTIATE.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub recommendation: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub reasoning: Vec<String>,
    #[serde(deserialize_with = "lenient::f64")]
    pub potential_savings: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeasonalTrends {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub best_month_to_buy: Option<String>,
    #[serde(deserialize_with = "lenient::f64")]
    pub price_variation: f64,
    #[serde(deserialize_with = "lenient::string_list")]
    pub seasonal_factors: Vec<String>,
}

// ============ Comparison ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleComparisonReport {
    pub feature_comparison: FeatureComparison,
    /// Keyed by vehicle id as the model echoed it.
    pub value_analysis: BTreeMap<String, ValueAssessment>,
    pub recommendation: ComparisonRecommendation,
}

impl FeaturePayload for VehicleComparisonReport {
    const FEATURE: Feature = Feature::Comparison;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureComparison {
    #[serde(deserialize_with = "lenient::string_list")]
    pub common: Vec<String>,
    pub unique: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueAssessment {
    #[serde(deserialize_with = "lenient::string_list")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub weaknesses: Vec<String>,
    #[serde(deserialize_with = "lenient::f64")]
    pub value_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComparisonRecommendation {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub best_value: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub best_performance: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub best_efficiency: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub reasoning: Vec<String>,
}

/// An array of records where null means empty and a single object means one element.
/// Any other shape, or an element that does not build, is an error.
fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| list_item(item).map_err(D::Error::custom))
            .collect(),
        Some(item @ Value::Object(_)) => Ok(vec![list_item(item).map_err(D::Error::custom)?]),
        Some(other) => Err(D::Error::custom(format!(
            "expected a list of objects, got {}",
            other
        ))),
    }
}

fn list_item<T: DeserializeOwned>(item: Value) -> Result<T, String> {
    match item {
        Value::Object(_) => serde_json::from_value(item).map_err(|e| e.to_string()),
        other => Err(format!("expected an object list element, got {}", other)),
    }
}
