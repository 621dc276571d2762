//! Vehicle search predicates.
//!
//! A [`VehicleQuery`] is a conjunction of optional [`Clause`]s plus a feature-defined order
//! and page size. It renders to parameterized SQL for the `cars` table and can also be
//! evaluated in memory, which keeps the predicate semantics testable without a database.

use sqlx::{Postgres, QueryBuilder};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::models::{EcoCriteria, PreferenceFilter, VehicleRecord};

pub const CHAT_RECOMMENDATION_LIMIT: u32 = 3;
pub const ECO_RECOMMENDATION_LIMIT: u32 = 5;
pub const SIMILAR_VEHICLE_LIMIT: u32 = 50;
/// Model years on either side of the subject that count as "similar".
pub const SIMILAR_YEAR_WINDOW: i32 = 2;

pub const ECO_FUEL_TYPES: [&str; 2] = ["Electric", "Hybrid"];

const VEHICLE_COLUMNS: &str = "id, make, model, year, price, mileage, fuel_type, transmission, \
     body_type, seats, description, color, images, green_score, environmental_metrics, created_at";

/// One predicate over a vehicle row.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Case-insensitive substring match on make.
    MakeContains(String),
    MakeEquals(String),
    ModelEquals(String),
    BodyTypeEquals(String),
    FuelTypeEquals(String),
    FuelTypeIn(Vec<String>),
    PriceAtLeast(f64),
    PriceAtMost(f64),
    YearAtLeast(i32),
    YearAtMost(i32),
    IdIn(Vec<Uuid>),
    IdNot(Uuid),
}

impl Clause {
    fn push_sql(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Clause::MakeContains(make) => {
                builder.push("make ILIKE '%' || ");
                builder.push_bind(escape_like(make));
                builder.push(" || '%'");
            }
            Clause::MakeEquals(make) => {
                builder.push("make = ");
                builder.push_bind(make.clone());
            }
            Clause::ModelEquals(model) => {
                builder.push("model = ");
                builder.push_bind(model.clone());
            }
            Clause::BodyTypeEquals(body_type) => {
                builder.push("body_type = ");
                builder.push_bind(body_type.clone());
            }
            Clause::FuelTypeEquals(fuel_type) => {
                builder.push("fuel_type = ");
                builder.push_bind(fuel_type.clone());
            }
            Clause::FuelTypeIn(fuel_types) => {
                builder.push("fuel_type = ANY(");
                builder.push_bind(fuel_types.clone());
                builder.push(")");
            }
            Clause::PriceAtLeast(price) => {
                builder.push("price >= ");
                builder.push_bind(*price);
                builder.push("::numeric");
            }
            Clause::PriceAtMost(price) => {
                builder.push("price <= ");
                builder.push_bind(*price);
                builder.push("::numeric");
            }
            Clause::YearAtLeast(year) => {
                builder.push("year >= ");
                builder.push_bind(*year);
            }
            Clause::YearAtMost(year) => {
                builder.push("year <= ");
                builder.push_bind(*year);
            }
            Clause::IdIn(ids) => {
                builder.push("id = ANY(");
                builder.push_bind(ids.clone());
                builder.push(")");
            }
            Clause::IdNot(id) => {
                builder.push("id <> ");
                builder.push_bind(*id);
            }
        }
    }

    /// Evaluates the clause against an in-memory record with the same semantics as the SQL.
    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        match self {
            Clause::MakeContains(make) => vehicle
                .make
                .to_lowercase()
                .contains(&make.to_lowercase()),
            Clause::MakeEquals(make) => vehicle.make == *make,
            Clause::ModelEquals(model) => vehicle.model == *model,
            Clause::BodyTypeEquals(body_type) => {
                vehicle.body_type.as_deref() == Some(body_type.as_str())
            }
            Clause::FuelTypeEquals(fuel_type) => vehicle.fuel_type == *fuel_type,
            Clause::FuelTypeIn(fuel_types) => fuel_types.iter().any(|f| *f == vehicle.fuel_type),
            Clause::PriceAtLeast(price) => vehicle.price >= *price,
            Clause::PriceAtMost(price) => vehicle.price <= *price,
            Clause::YearAtLeast(year) => vehicle.year >= *year,
            Clause::YearAtMost(year) => vehicle.year <= *year,
            Clause::IdIn(ids) => ids.contains(&vehicle.id),
            Clause::IdNot(id) => vehicle.id != *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently listed first.
    NewestFirst,
    /// Highest green score first, unscored vehicles last.
    GreenScoreDesc,
}

impl SortOrder {
    fn sql(self) -> &'static str {
        match self {
            SortOrder::NewestFirst => "created_at DESC",
            SortOrder::GreenScoreDesc => "green_score DESC NULLS LAST",
        }
    }

    fn compare(self, a: &VehicleRecord, b: &VehicleRecord) -> Ordering {
        match self {
            SortOrder::NewestFirst => b.created_at.cmp(&a.created_at),
            SortOrder::GreenScoreDesc => match (a.green_score, b.green_score) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleQuery {
    pub clauses: Vec<Clause>,
    pub order: SortOrder,
    pub limit: Option<u32>,
}

impl VehicleQuery {
    /// Chat recommendations: the three newest vehicles matching the extracted preferences.
    pub fn recommendations(prefs: &PreferenceFilter) -> Self {
        Self {
            clauses: preference_clauses(prefs),
            order: SortOrder::NewestFirst,
            limit: Some(CHAT_RECOMMENDATION_LIMIT),
        }
    }

    /// Electric and hybrid vehicles, greenest first.
    pub fn eco_friendly(criteria: &EcoCriteria) -> Self {
        let mut clauses = vec![Clause::FuelTypeIn(
            ECO_FUEL_TYPES.iter().map(|f| f.to_string()).collect(),
        )];
        if let Some(max_price) = criteria.max_price.filter(|p| *p > 0.0) {
            clauses.push(Clause::PriceAtMost(max_price));
        }
        if let Some(body_type) = &criteria.body_type {
            clauses.push(Clause::BodyTypeEquals(body_type.clone()));
        }

        Self {
            clauses,
            order: SortOrder::GreenScoreDesc,
            limit: Some(ECO_RECOMMENDATION_LIMIT),
        }
    }

    /// Same make and model within [`SIMILAR_YEAR_WINDOW`] model years, excluding the subject.
    pub fn similar_to(vehicle: &VehicleRecord) -> Self {
        Self {
            clauses: vec![
                Clause::MakeEquals(vehicle.make.clone()),
                Clause::ModelEquals(vehicle.model.clone()),
                Clause::YearAtLeast(vehicle.year - SIMILAR_YEAR_WINDOW),
                Clause::YearAtMost(vehicle.year + SIMILAR_YEAR_WINDOW),
                Clause::IdNot(vehicle.id),
            ],
            order: SortOrder::NewestFirst,
            limit: Some(SIMILAR_VEHICLE_LIMIT),
        }
    }

    pub fn by_ids(ids: &[Uuid]) -> Self {
        Self {
            clauses: vec![Clause::IdIn(ids.to_vec())],
            order: SortOrder::NewestFirst,
            limit: None,
        }
    }

    /// Renders the query as parameterized SQL over the `cars` table.
    pub fn to_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM cars", VEHICLE_COLUMNS));

        for (i, clause) in self.clauses.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            clause.push_sql(&mut builder);
        }

        builder.push(" ORDER BY ");
        builder.push(self.order.sql());

        if let Some(limit) = self.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }

        builder
    }

    /// The SQL text with `$n` placeholders, for logging and tests.
    pub fn sql(&self) -> String {
        self.to_sql().sql().to_string()
    }

    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        self.clauses.iter().all(|clause| clause.matches(vehicle))
    }

    /// Filters, orders and limits `vehicles` in memory.
    pub fn apply(&self, vehicles: &[VehicleRecord]) -> Vec<VehicleRecord> {
        let mut selected: Vec<VehicleRecord> = vehicles
            .iter()
            .filter(|v| self.matches(v))
            .cloned()
            .collect();
        selected.sort_by(|a, b| self.order.compare(a, b));
        if let Some(limit) = self.limit {
            selected.truncate(limit as usize);
        }
        selected
    }
}

/// One clause per constraining preference field, in field order.
///
/// Absent fields produce no clause. Zero or negative numeric bounds are treated as absent,
/// since the extractor uses them as placeholders for "not mentioned".
pub fn preference_clauses(prefs: &PreferenceFilter) -> Vec<Clause> {
    let mut clauses = Vec::new();

    if let Some(make) = &prefs.make {
        clauses.push(Clause::MakeContains(make.clone()));
    }
    if let Some(body_type) = &prefs.body_type {
        clauses.push(Clause::BodyTypeEquals(body_type.clone()));
    }
    if let Some(fuel_type) = &prefs.fuel_type {
        clauses.push(Clause::FuelTypeEquals(fuel_type.clone()));
    }
    if let Some(min_price) = prefs.min_price.filter(|p| *p > 0.0) {
        clauses.push(Clause::PriceAtLeast(min_price));
    }
    if let Some(max_price) = prefs.max_price.filter(|p| *p > 0.0) {
        clauses.push(Clause::PriceAtMost(max_price));
    }
    if let Some(min_year) = prefs.min_year.filter(|y| *y > 0) {
        clauses.push(Clause::YearAtLeast(min_year));
    }
    if let Some(max_year) = prefs.max_year.filter(|y| *y > 0) {
        clauses.push(Clause::YearAtMost(max_year));
    }

    clauses
}

/// Escapes `%`, `_` and `\` so user text matches literally inside a LIKE pattern.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
