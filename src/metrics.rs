//! Numeric analytics derived from vehicle records.
//!
//! Every function here is pure. Anything that depends on the calendar takes the current
//! year as an argument instead of reading the clock.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::VehicleRecord;

/// Yearly depreciation assumed when no comparable vehicle supports an estimate.
pub const DEFAULT_DEPRECIATION_RATE: f64 = 0.15;
/// Years covered by value projections and ownership cost breakdowns.
pub const PROJECTION_YEARS: u32 = 5;

/// Price and model year of a comparable vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub price: f64,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<i32>,
}

impl From<&VehicleRecord> for PricePoint {
    fn from(vehicle: &VehicleRecord) -> Self {
        Self {
            price: vehicle.price,
            year: vehicle.year,
            mileage: vehicle.mileage,
        }
    }
}

/// Mean yearly price drop of `subject` relative to strictly older comparables.
///
/// Comparables of the same or a newer model year are excluded. Returns
/// [`DEFAULT_DEPRECIATION_RATE`] when none qualify or the subject price is not positive.
pub fn depreciation_rate(subject: PricePoint, comparables: &[PricePoint]) -> f64 {
    if subject.price <= 0.0 {
        return DEFAULT_DEPRECIATION_RATE;
    }

    let yearly_drops: Vec<f64> = comparables
        .iter()
        .filter_map(|comparable| {
            let age_difference = subject.year - comparable.year;
            (age_difference > 0).then(|| {
                (subject.price - comparable.price) / subject.price / f64::from(age_difference)
            })
        })
        .collect();

    if yearly_drops.is_empty() {
        DEFAULT_DEPRECIATION_RATE
    } else {
        yearly_drops.iter().sum::<f64>() / yearly_drops.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedValue {
    pub year: i32,
    pub projected_value: f64,
}

/// Value after k = 1..=5 years: `price * (1 - rate)^k`, labelled `current_year + k`.
pub fn projected_values(price: f64, rate: f64, current_year: i32) -> Vec<ProjectedValue> {
    (1..=PROJECTION_YEARS as i32)
        .map(|k| ProjectedValue {
            year: current_year + k,
            projected_value: price * (1.0 - rate).powi(k),
        })
        .collect()
}

/// Running-cost assumptions used by the fuel and ownership estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostAssumptions {
    pub annual_miles: f64,
    pub electric_kwh_per_100mi: f64,
    /// USD per kWh.
    pub electricity_price: f64,
    pub combustion_mpg: f64,
    /// USD per gallon.
    pub fuel_price: f64,
    /// Share of the purchase price lost per year in ownership breakdowns.
    pub yearly_depreciation: f64,
    /// Share of the purchase price spent on maintenance per year.
    pub yearly_maintenance: f64,
}

impl Default for CostAssumptions {
    fn default() -> Self {
        Self {
            annual_miles: 12000.0,
            electric_kwh_per_100mi: 30.0,
            electricity_price: 0.14,
            combustion_mpg: 25.0,
            fuel_price: 3.50,
            yearly_depreciation: 0.15,
            yearly_maintenance: 0.05,
        }
    }
}

/// Yearly energy cost in USD.
pub fn annual_fuel_cost(fuel_type: &str, assumptions: &CostAssumptions) -> f64 {
    if fuel_type.eq_ignore_ascii_case("electric") {
        (assumptions.annual_miles / 100.0)
            * assumptions.electric_kwh_per_100mi
            * assumptions.electricity_price
    } else {
        (assumptions.annual_miles / assumptions.combustion_mpg) * assumptions.fuel_price
    }
}

/// Yearly insurance premium in USD.
pub fn insurance_estimate(vehicle_year: i32, price: f64, current_year: i32) -> f64 {
    const BASE_RATE: f64 = 1200.0;

    let age = f64::from(current_year - vehicle_year);
    let age_multiplier = (1.0 - age * 0.05).max(0.8);
    let value_multiplier = 1.0 + (price / 50000.0) * 0.2;

    BASE_RATE * age_multiplier * value_multiplier
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OwnershipCosts {
    pub depreciation: f64,
    pub maintenance: f64,
    pub fuel: f64,
    pub insurance: f64,
}

impl OwnershipCosts {
    pub fn total(&self) -> f64 {
        self.depreciation + self.maintenance + self.fuel + self.insurance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnalysis {
    pub car_id: Uuid,
    pub initial_price: f64,
    pub five_year_costs: OwnershipCosts,
}

/// Five-year ownership cost breakdown of one vehicle.
pub fn five_year_costs(
    vehicle: &VehicleRecord,
    assumptions: &CostAssumptions,
    current_year: i32,
) -> CostAnalysis {
    let years = f64::from(PROJECTION_YEARS);
    let price = vehicle.price;

    CostAnalysis {
        car_id: vehicle.id,
        initial_price: price,
        five_year_costs: OwnershipCosts {
            depreciation: price * assumptions.yearly_depreciation * years,
            maintenance: price * assumptions.yearly_maintenance * years,
            fuel: annual_fuel_cost(&vehicle.fuel_type, assumptions) * years,
            insurance: insurance_estimate(vehicle.year, price, current_year) * years,
        },
    }
}

/// Arithmetic mean, `0.0` for an empty list.
pub fn average_price(prices: &[f64]) -> f64 {
    if prices.is_empty() {
        0.0
    } else {
        prices.iter().sum::<f64>() / prices.len() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceDistribution {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub quartiles: Quartiles,
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

/// Min, max, median and nearest-rank quartiles. `None` for an empty list.
pub fn price_distribution(prices: &[f64]) -> Option<PriceDistribution> {
    let mut sorted: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let median = median_of_sorted(&sorted);

    Some(PriceDistribution {
        min: sorted[0],
        max: sorted[n - 1],
        median,
        quartiles: Quartiles {
            q1: sorted[n / 4],
            q2: median,
            q3: sorted[(3 * n) / 4],
        },
    })
}

/// One row of an environmental comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalComparisonEntry {
    pub id: Uuid,
    pub name: String,
    pub fuel_type: String,
    pub green_score: f64,
    /// Difference to the mean green score of the compared set.
    pub green_score_delta: f64,
    pub metrics: Value,
}

/// Green scores of `vehicles` side by side, with each score's distance from the set mean.
///
/// Missing scores count as `0`, missing metrics as an empty object.
pub fn environmental_comparison(vehicles: &[VehicleRecord]) -> Vec<EnvironmentalComparisonEntry> {
    let scores: Vec<f64> = vehicles
        .iter()
        .map(|v| v.green_score.unwrap_or(0.0))
        .collect();
    let mean = average_price(&scores);

    vehicles
        .iter()
        .zip(scores)
        .map(|(vehicle, score)| EnvironmentalComparisonEntry {
            id: vehicle.id,
            name: vehicle.display_name(),
            fuel_type: vehicle.fuel_type.clone(),
            green_score: score,
            green_score_delta: score - mean,
            metrics: vehicle
                .environmental_metrics
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
        })
        .collect()
}
