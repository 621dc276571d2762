/// End-to-end feature tests over in-memory collaborators
/// The model, inventory, analysis store and identity directory are all fakes; everything
/// between them (prompts, sanitizing, decoding, validation, queries, metrics, persistence
/// and the caller-facing envelope) is the real code
use async_trait::async_trait;
use autovolt_api::ai_models::{EnvironmentalImpact, Level, MaintenancePrediction};
use autovolt_api::config::Config;
use autovolt_api::db_storage::AnalysisStore;
use autovolt_api::errors::AppError;
use autovolt_api::features::chat::process_chat_message;
use autovolt_api::features::comparison::{self, compare_vehicles, save_comparison};
use autovolt_api::features::environmental::{
    self, calculate_environmental_impact, compare_environmental_impact,
    eco_friendly_recommendations,
};
use autovolt_api::features::maintenance::{
    self, generate_maintenance_prediction, maintenance_history, service_reminders,
};
use autovolt_api::features::price_analysis::analyze_price_history;
use autovolt_api::features::AdvisorContext;
use autovolt_api::gemini_client::LanguageModel;
use autovolt_api::handlers::{self, AppState};
use autovolt_api::identity::{IdentityResolver, REQUESTER_HEADER};
use autovolt_api::models::{
    ActionResult, AnalysisKind, AnalysisRecord, EcoCriteria, Feature, NewAnalysisRecord,
    VehicleRecord,
};
use autovolt_api::pricing::PricingConfig;
use autovolt_api::query::VehicleQuery;
use autovolt_api::vehicles::VehicleRepository;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ============ Fakes ============

/// Answers every prompt with the same text (or error) and remembers the prompts.
struct ScriptedModel {
    reply: Result<String, fn() -> AppError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn answering(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(make_error: fn() -> AppError) -> Self {
        Self {
            reply: Err(make_error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make_error) => Err(make_error()),
        }
    }
}

/// Inventory that evaluates queries with their in-memory semantics.
struct Inventory(Vec<VehicleRecord>);

#[async_trait]
impl VehicleRepository for Inventory {
    async fn find_vehicles(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, AppError> {
        Ok(query.apply(&self.0))
    }

    async fn find_vehicle_by_id(&self, id: Uuid) -> Result<Option<VehicleRecord>, AppError> {
        Ok(self.0.iter().find(|v| v.id == id).cloned())
    }
}

#[derive(Default)]
struct MemoryStore {
    fail_writes: bool,
    records: Mutex<Vec<AnalysisRecord>>,
}

impl MemoryStore {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    fn records(&self) -> Vec<AnalysisRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn create_analysis_record(&self, record: NewAnalysisRecord) -> Result<Uuid, AppError> {
        if self.fail_writes {
            return Err(AppError::PersistenceError(
                "connection reset by peer".to_string(),
            ));
        }

        let mut records = self.records.lock().unwrap();
        let id = Uuid::new_v4();
        // Strictly increasing timestamps keep "newest first" deterministic
        let created_at = Utc::now() + ChronoDuration::seconds(records.len() as i64);
        records.push(AnalysisRecord {
            id,
            kind: record.kind.as_str().to_string(),
            user_id: record.user_id,
            vehicle_ids: record.vehicle_ids,
            payload: record.payload,
            created_at,
        });
        Ok(id)
    }

    async fn recent_analyses(
        &self,
        kind: AnalysisKind,
        user_id: Uuid,
        vehicle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AnalysisRecord>, AppError> {
        let mut matching: Vec<AnalysisRecord> = self
            .records()
            .into_iter()
            .filter(|r| {
                r.kind == kind.as_str() && r.user_id == user_id && r.vehicle_ids.contains(&vehicle_id)
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn latest_analysis_for_vehicle(
        &self,
        kind: AnalysisKind,
        vehicle_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, AppError> {
        Ok(self
            .records()
            .into_iter()
            .filter(|r| r.kind == kind.as_str() && r.vehicle_ids.contains(&vehicle_id))
            .max_by_key(|r| r.created_at))
    }
}

struct FixedIdentity(Option<Uuid>);

#[async_trait]
impl IdentityResolver for FixedIdentity {
    async fn resolve(&self, _external_id: &str) -> Result<Option<Uuid>, AppError> {
        Ok(self.0)
    }
}

// ============ Fixtures ============

fn listed_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A vehicle listed `days_ago` days before [`listed_at`].
#[allow(clippy::too_many_arguments)]
fn car(
    make: &str,
    model: &str,
    year: i32,
    price: f64,
    fuel_type: &str,
    body_type: &str,
    green_score: Option<f64>,
    days_ago: i64,
) -> VehicleRecord {
    VehicleRecord {
        id: Uuid::new_v4(),
        make: make.to_string(),
        model: model.to_string(),
        year,
        price,
        mileage: Some(12_000),
        fuel_type: fuel_type.to_string(),
        transmission: Some("Automatic".to_string()),
        body_type: Some(body_type.to_string()),
        seats: Some(5),
        description: None,
        color: Some("White".to_string()),
        images: vec![format!("https://cdn.example.com/{}-{}.jpg", make, model)],
        green_score,
        environmental_metrics: green_score.map(|s| json!({ "co2PerKm": 100.0 - s })),
        created_at: listed_at() - ChronoDuration::days(days_ago),
    }
}

fn showroom() -> Vec<VehicleRecord> {
    vec![
        car("Tesla", "Model Y", 2023, 39_990.0, "Electric", "SUV", Some(92.0), 1),
        car("Hyundai", "Ioniq 5", 2023, 38_500.0, "Electric", "SUV", Some(90.0), 2),
        car("Kia", "EV6", 2022, 36_000.0, "Electric", "SUV", Some(88.0), 3),
        car("Ford", "Mustang Mach-E", 2022, 35_000.0, "Electric", "SUV", Some(85.0), 10),
        car("Rivian", "R1S", 2023, 74_000.0, "Electric", "SUV", Some(80.0), 0),
        car("Toyota", "RAV4", 2023, 31_000.0, "Gasoline", "SUV", Some(40.0), 0),
        car("Toyota", "Prius", 2022, 28_000.0, "Hybrid", "Hatchback", Some(75.0), 4),
        car("Nissan", "Leaf", 2021, 22_000.0, "Electric", "Hatchback", None, 5),
    ]
}

struct Harness {
    ctx: AdvisorContext,
    model: Arc<ScriptedModel>,
    store: Arc<MemoryStore>,
    vehicles: Vec<VehicleRecord>,
}

fn harness(model: ScriptedModel, store: MemoryStore, vehicles: Vec<VehicleRecord>) -> Harness {
    let model = Arc::new(model);
    let store = Arc::new(store);
    let ctx = AdvisorContext::new(
        model.clone(),
        Arc::new(Inventory(vehicles.clone())),
        store.clone(),
        PricingConfig::default(),
    );
    Harness {
        ctx,
        model,
        store,
        vehicles,
    }
}

fn find<'a>(vehicles: &'a [VehicleRecord], model: &str) -> &'a VehicleRecord {
    vehicles.iter().find(|v| v.model == model).unwrap()
}

const MAINTENANCE_JSON: &str = r#"```json
{
  "nextServices": [
    {"serviceName": "Tire rotation", "dueAt": "17,000", "estimatedCost": "$80", "priority": "medium"},
    {"serviceName": "Cabin air filter", "dueAt": 24000, "estimatedCost": 60, "priority": "LOW"}
  ],
  "partsReplacement": {"partName": "Wiper blades", "recommendedReplacementMileage": 20000, "estimatedCost": 45},
  "totalMaintenanceCost": "1,250",
  "maintenanceSchedule": {
    "immediate": ["Brake fluid check"],
    "next3Months": ["Tire rotation"],
    "next6Months": "Cabin air filter",
    "next12Months": ["Coolant service"]
  }
}
```"#;

const ENVIRONMENTAL_JSON: &str = r#"{
  "carbonFootprint": {"annualCO2Emissions": "0", "lifetimeCO2Emissions": 0, "comparisonToAverage": -100},
  "greenScore": {"score": 91, "maxScore": 100, "factors": [{"name": "Zero tailpipe emissions", "score": 40, "impact": "high"}]},
  "environmentalMetrics": {"fuelEfficiency": "120", "emissionsCategory": "ZEV", "renewableCompatibility": 95}
}"#;

// ============ Chat ============

#[tokio::test]
async fn chat_recommends_only_matching_electric_suvs() {
    let model = ScriptedModel::answering(
        "```json\n{\"message\": \"Great choice! Electric SUVs are practical and efficient.\", \"preferences\": {\"fuelType\": \"Electric\", \"bodyType\": \"SUV\", \"maxPrice\": 40000, \"make\": null, \"minPrice\": null, \"minYear\": null, \"maxYear\": null}, \"shouldAskMore\": false}\n```",
    );
    let h = harness(model, MemoryStore::default(), showroom());

    let result = ActionResult::from_result(
        Feature::Chat,
        process_chat_message(&h.ctx, "I want an electric SUV under $40000", &[]).await,
    );

    assert!(result.is_success());
    let chat = result.data().unwrap();
    assert_eq!(chat.preferences.fuel_type.as_deref(), Some("Electric"));
    assert_eq!(chat.preferences.body_type.as_deref(), Some("SUV"));
    assert_eq!(chat.preferences.max_price, Some(40000.0));

    // Four vehicles qualify; the three most recently listed are returned
    let models: Vec<&str> = chat.recommendations.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["Model Y", "Ioniq 5", "EV6"]);
    for rec in &chat.recommendations {
        let listed = h.vehicles.iter().find(|v| v.id == rec.id).unwrap();
        assert_eq!(listed.fuel_type, "Electric");
        assert_eq!(listed.body_type.as_deref(), Some("SUV"));
        assert!(listed.price <= 40000.0);
    }
    assert_eq!(chat.recommendations[0].price, "$39,990.00");
    assert!(chat
        .message
        .ends_with("Here are some cars that match your preferences:"));

    let prompts = h.model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("I want an electric SUV under $40000"));
}

#[tokio::test]
async fn chat_without_preferences_asks_follow_up_and_lists_newest() {
    let model = ScriptedModel::answering(
        r#"{"message": "Happy to help you find a car.", "preferences": {"fuelType": null, "bodyType": "", "make": "null", "maxPrice": 0}, "shouldAskMore": true}"#,
    );
    let h = harness(model, MemoryStore::default(), showroom());

    let chat = process_chat_message(&h.ctx, "hi", &[]).await.unwrap();

    assert_eq!(chat.preferences.make, None);
    assert_eq!(chat.preferences.body_type, None);
    assert!(chat.message.contains(
        "could you tell me your preferred car brand, type of vehicle, budget range?"
    ));
    let models: Vec<&str> = chat.recommendations.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["R1S", "RAV4", "Model Y"]);
}

#[tokio::test]
async fn chat_model_timeout_gives_generic_message() {
    let model = ScriptedModel::failing(|| AppError::Timeout(Duration::from_secs(30)));
    let h = harness(model, MemoryStore::default(), showroom());

    let result = ActionResult::from_result(
        Feature::Chat,
        process_chat_message(&h.ctx, "anything", &[]).await,
    );

    assert_eq!(
        result.error(),
        Some("Failed to process your message. Please try again.")
    );
}

#[tokio::test]
async fn chat_prose_reply_gives_parse_message() {
    let model = ScriptedModel::answering("I'd be glad to help! What's your budget?");
    let h = harness(model, MemoryStore::default(), showroom());

    let result = ActionResult::from_result(
        Feature::Chat,
        process_chat_message(&h.ctx, "hello", &[]).await,
    );

    assert_eq!(result.error(), Some("Failed to parse AI response"));
}

// ============ Maintenance ============

#[tokio::test]
async fn maintenance_prediction_survives_storage_failure() {
    let h = harness(
        ScriptedModel::answering(MAINTENANCE_JSON),
        MemoryStore::failing(),
        showroom(),
    );
    let id = find(&h.vehicles, "Model Y").id;

    let result = ActionResult::from_result(
        Feature::MaintenancePrediction,
        generate_maintenance_prediction(&h.ctx, id, Some(Uuid::new_v4())).await,
    );

    assert!(result.is_success());
    let prediction: &MaintenancePrediction = result.data().unwrap();
    assert_eq!(prediction.next_services.len(), 2);
    assert_eq!(prediction.next_services[0].due_at, Some(17000.0));
    assert_eq!(prediction.next_services[1].priority, Level::Low);
    assert_eq!(prediction.parts_replacement.len(), 1);
    assert_eq!(prediction.total_maintenance_cost, 1250.0);
    assert_eq!(prediction.maintenance_schedule.next_6_months, vec!["Cabin air filter"]);
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn maintenance_prediction_feeds_history_and_reminders() {
    let h = harness(
        ScriptedModel::answering(MAINTENANCE_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "Ioniq 5").id;
    let user = Uuid::new_v4();

    for _ in 0..7 {
        generate_maintenance_prediction(&h.ctx, id, Some(user))
            .await
            .unwrap();
    }
    // Anonymous predictions are not recorded
    generate_maintenance_prediction(&h.ctx, id, None).await.unwrap();
    assert_eq!(h.store.records().len(), 7);

    let history = maintenance_history(&h.ctx, id, Some(user)).await.unwrap();
    assert_eq!(history.len(), maintenance::HISTORY_LIMIT as usize);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));
    assert!(history.iter().all(|r| r.kind == "maintenance_prediction"));

    let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
    let reminders = service_reminders(&h.ctx, id, now).await.unwrap();
    assert_eq!(reminders.len(), 3);
    assert_eq!(reminders[0].service, "Brake fluid check");
    assert_eq!(reminders[0].due_date, now);
    assert_eq!(reminders[0].priority, Level::High);
    assert_eq!(
        reminders[1].due_date,
        Utc.with_ymd_and_hms(2024, 4, 15, 8, 0, 0).unwrap()
    );
    assert_eq!(reminders[1].priority, Level::Medium);
    assert_eq!(
        reminders[2].due_date,
        Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).unwrap()
    );
    assert_eq!(reminders[2].priority, Level::Low);
}

#[tokio::test]
async fn maintenance_for_unknown_vehicle_never_calls_model() {
    let h = harness(
        ScriptedModel::answering(MAINTENANCE_JSON),
        MemoryStore::default(),
        showroom(),
    );

    let result = ActionResult::from_result(
        Feature::MaintenancePrediction,
        generate_maintenance_prediction(&h.ctx, Uuid::new_v4(), None).await,
    );

    assert_eq!(result.error(), Some("Car not found"));
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn maintenance_missing_schedule_is_a_parse_failure() {
    let h = harness(
        ScriptedModel::answering(r#"{"nextServices": [], "totalMaintenanceCost": 0}"#),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "EV6").id;

    let result = ActionResult::from_result(
        Feature::MaintenancePrediction,
        generate_maintenance_prediction(&h.ctx, id, Some(Uuid::new_v4())).await,
    );

    assert_eq!(result.error(), Some("Failed to parse maintenance prediction"));
    assert!(h.store.records().is_empty());
}

#[tokio::test]
async fn maintenance_history_and_reminders_report_their_preconditions() {
    let h = harness(
        ScriptedModel::answering(MAINTENANCE_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "EV6").id;

    let history = ActionResult::from_operation(
        "maintenance history",
        maintenance::HISTORY_FAILURE,
        maintenance_history(&h.ctx, id, None).await,
    );
    assert_eq!(history.error(), Some("Unauthorized"));

    let reminders = ActionResult::from_operation(
        "service reminders",
        maintenance::REMINDERS_FAILURE,
        service_reminders(&h.ctx, id, Utc::now()).await,
    );
    assert_eq!(reminders.error(), Some("No maintenance prediction found"));
}

// ============ Environmental ============

#[tokio::test]
async fn environmental_impact_is_typed_and_recorded() {
    let h = harness(
        ScriptedModel::answering(ENVIRONMENTAL_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "Model Y").id;
    let user = Uuid::new_v4();

    let impact: EnvironmentalImpact = calculate_environmental_impact(&h.ctx, id, Some(user))
        .await
        .unwrap();

    assert_eq!(impact.green_score.score, 91.0);
    assert_eq!(impact.green_score.factors[0].impact, Level::High);
    assert_eq!(impact.environmental_metrics.fuel_efficiency, 120.0);

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "environmental_impact");
    assert_eq!(records[0].vehicle_ids, vec![id]);
    assert_eq!(records[0].payload["greenScore"]["score"], json!(91.0));
}

#[tokio::test]
async fn environmental_impact_missing_keys_is_a_parse_failure() {
    let h = harness(
        ScriptedModel::answering(r#"{"carbonFootprint": {}, "greenScore": {"score": 50}}"#),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "Prius").id;

    let result = ActionResult::from_result(
        Feature::EnvironmentalImpact,
        calculate_environmental_impact(&h.ctx, id, None).await,
    );

    assert_eq!(result.error(), Some("Failed to parse environmental data"));
}

#[tokio::test]
async fn eco_recommendations_are_green_and_within_budget() {
    let h = harness(
        ScriptedModel::failing(|| AppError::ModelUnavailable("not used".to_string())),
        MemoryStore::default(),
        showroom(),
    );

    let all = eco_friendly_recommendations(&h.ctx, &EcoCriteria::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
    assert!(all
        .iter()
        .all(|v| v.fuel_type == "Electric" || v.fuel_type == "Hybrid"));
    assert_eq!(all[0].model, "Model Y");
    assert!(all
        .windows(2)
        .all(|pair| pair[0].green_score >= pair[1].green_score));

    let criteria: EcoCriteria =
        serde_json::from_value(json!({ "maxPrice": "30000", "bodyType": "Hatchback" })).unwrap();
    let budget = eco_friendly_recommendations(&h.ctx, &criteria).await.unwrap();
    let models: Vec<&str> = budget.iter().map(|v| v.model.as_str()).collect();
    // Unscored vehicles sort last
    assert_eq!(models, vec!["Prius", "Leaf"]);
    assert_eq!(budget[1].formatted_price, "$22,000.00");
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn environmental_comparison_reports_distance_from_mean() {
    let h = harness(
        ScriptedModel::answering("{}"),
        MemoryStore::default(),
        showroom(),
    );
    let ids = vec![
        find(&h.vehicles, "Model Y").id,
        find(&h.vehicles, "RAV4").id,
    ];

    let entries = compare_environmental_impact(&h.ctx, &ids).await.unwrap();
    assert_eq!(entries.len(), 2);
    let tesla = entries.iter().find(|e| e.id == ids[0]).unwrap();
    let toyota = entries.iter().find(|e| e.id == ids[1]).unwrap();
    assert_eq!(tesla.green_score_delta, 26.0);
    assert_eq!(toyota.green_score_delta, -26.0);
    assert_eq!(tesla.name, "2023 Tesla Model Y");

    let none = ActionResult::from_operation(
        "environmental comparison",
        environmental::COMPARE_FAILURE,
        compare_environmental_impact(&h.ctx, &[]).await,
    );
    assert_eq!(none.data().map(Vec::len), Some(0));
}

// ============ Price analysis ============

#[tokio::test]
async fn price_analysis_combines_model_report_with_market_metrics() {
    let mut vehicles = vec![
        car("Honda", "Civic", 2023, 30_000.0, "Gasoline", "Sedan", Some(45.0), 5),
        car("Honda", "Civic", 2021, 25_000.0, "Gasoline", "Sedan", Some(40.0), 6),
        car("Honda", "Civic", 2024, 32_000.0, "Gasoline", "Sedan", Some(46.0), 1),
        // Outside the model-year window
        car("Honda", "Civic", 2018, 15_000.0, "Gasoline", "Sedan", Some(35.0), 2),
        car("Honda", "Accord", 2023, 33_000.0, "Gasoline", "Sedan", Some(44.0), 3),
    ];
    vehicles.extend(showroom());
    let report = r#"{
        "marketValue": {"estimatedValue": "29,500", "confidence": 0.8, "priceRange": {"low": 28000, "high": 31000}},
        "priceAnalysis": {"isPriceCompetitive": "yes", "valueRating": "GOOD", "factors": "Low mileage"},
        "buyingRecommendation": {"recommendation": "NEGOTIATE", "reasoning": ["Slightly above market"], "potentialSavings": 500},
        "seasonalTrends": {"bestMonthToBuy": "December", "priceVariation": "3%", "seasonalFactors": []}
    }"#;
    let h = harness(ScriptedModel::answering(report), MemoryStore::default(), vehicles);
    let subject = h.vehicles[0].id;
    let user = Uuid::new_v4();

    let result = analyze_price_history(&h.ctx, subject, Some(user), 2024)
        .await
        .unwrap();

    assert_eq!(result.current_price, 30_000.0);
    assert_eq!(result.formatted_price, "$30,000.00");
    assert_eq!(result.analysis.market_value.estimated_value, 29_500.0);
    assert!(result.analysis.price_analysis.is_price_competitive);
    assert_eq!(result.analysis.seasonal_trends.price_variation, 3.0);

    // Only the 2021 listing is older: (30000 - 25000) / 30000 / 2
    assert!((result.depreciation.rate - 0.083_333).abs() < 1e-5);
    let first = result.depreciation.projected_values[0];
    assert_eq!(first.year, 2025);
    assert!((first.projected_value - 27_500.0).abs() < 1e-6);

    let market = &result.market_comparison;
    assert_eq!(market.similar_cars.len(), 2);
    assert_eq!(market.average_price, 28_500.0);
    let distribution = market.price_distribution.unwrap();
    assert_eq!(distribution.min, 25_000.0);
    assert_eq!(distribution.max, 32_000.0);

    let prompt = &h.model.prompts()[0];
    assert!(prompt.contains("2023 Honda Civic"));

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "price_analysis");
}

#[tokio::test]
async fn unpriced_listings_are_left_out_of_market_figures() {
    let vehicles = vec![
        car("Honda", "Civic", 2023, 30_000.0, "Gasoline", "Sedan", Some(45.0), 5),
        car("Honda", "Civic", 2021, 25_000.0, "Gasoline", "Sedan", Some(40.0), 6),
        car("Honda", "Civic", 2024, 32_000.0, "Gasoline", "Sedan", Some(46.0), 1),
        // NULL price in the cars table
        car("Honda", "Civic", 2022, 0.0, "Gasoline", "Sedan", None, 2),
    ];
    let h = harness(
        ScriptedModel::answering(
            r#"{"marketValue": {}, "priceAnalysis": {}, "buyingRecommendation": {}, "seasonalTrends": {}}"#,
        ),
        MemoryStore::default(),
        vehicles,
    );
    let subject = h.vehicles[0].id;

    let result = analyze_price_history(&h.ctx, subject, None, 2024).await.unwrap();

    let market = &result.market_comparison;
    assert_eq!(market.similar_cars.len(), 2);
    assert!(market.similar_cars.iter().all(|p| p.price > 0.0));
    assert_eq!(market.average_price, 28_500.0);
    assert_eq!(market.price_distribution.unwrap().min, 25_000.0);
    assert!((result.depreciation.rate - 0.083_333).abs() < 1e-5);
}

#[tokio::test]
async fn price_analysis_without_comparables_uses_default_rate() {
    let h = harness(
        ScriptedModel::answering(
            r#"{"marketValue": {}, "priceAnalysis": {}, "buyingRecommendation": {}, "seasonalTrends": {}}"#,
        ),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "R1S").id;

    let result = analyze_price_history(&h.ctx, id, None, 2024).await.unwrap();

    assert_eq!(result.depreciation.rate, 0.15);
    assert!(result.market_comparison.similar_cars.is_empty());
    assert_eq!(result.market_comparison.average_price, 0.0);
    assert!(result.market_comparison.price_distribution.is_none());
}

// ============ Comparison ============

const COMPARISON_JSON: &str = r#"```json
{
  "featureComparison": {"common": ["All-wheel drive", "Heat pump"], "unique": {"Tesla Model Y": ["Supercharger access"]}},
  "valueAnalysis": {"Tesla Model Y": {"strengths": ["Range"], "weaknesses": "Ride comfort", "valueScore": "8.5"}},
  "recommendation": {"bestValue": "Hyundai Ioniq 5", "bestPerformance": "Tesla Model Y", "bestEfficiency": "Hyundai Ioniq 5", "reasoning": ["Fast charging"]}
}
```"#;

#[tokio::test]
async fn comparison_adds_costs_and_environmental_data() {
    let h = harness(
        ScriptedModel::answering(COMPARISON_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let ids = vec![
        find(&h.vehicles, "Model Y").id,
        find(&h.vehicles, "Ioniq 5").id,
        find(&h.vehicles, "Model Y").id,
    ];
    let user = Uuid::new_v4();

    let result = compare_vehicles(&h.ctx, &ids, Some(user), 2024).await.unwrap();

    assert_eq!(result.basics.len(), 2);
    assert_eq!(result.cost_analysis.len(), 2);
    assert_eq!(result.environmental.len(), 2);
    assert!(result.basics.iter().all(|b| b.image.is_some()));
    assert_eq!(
        result.comparison.value_analysis["Tesla Model Y"].value_score,
        8.5
    );
    for costs in &result.cost_analysis {
        let breakdown = costs.five_year_costs;
        assert!(breakdown.total() > costs.initial_price * 0.75);
        assert_eq!(breakdown.depreciation, costs.initial_price * 0.15 * 5.0);
    }

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "comparison");
    assert_eq!(records[0].vehicle_ids.len(), 2);
}

#[tokio::test]
async fn comparison_needs_two_known_vehicles() {
    let h = harness(
        ScriptedModel::answering(COMPARISON_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let known = find(&h.vehicles, "Model Y").id;

    let single = ActionResult::from_result(
        Feature::Comparison,
        compare_vehicles(&h.ctx, &[known, known], None, 2024).await,
    );
    assert_eq!(single.error(), Some("Select at least two vehicles to compare"));

    let unknown = ActionResult::from_result(
        Feature::Comparison,
        compare_vehicles(&h.ctx, &[Uuid::new_v4(), Uuid::new_v4()], None, 2024).await,
    );
    assert_eq!(unknown.error(), Some("No cars found"));

    let one_known = ActionResult::from_result(
        Feature::Comparison,
        compare_vehicles(&h.ctx, &[known, Uuid::new_v4()], None, 2024).await,
    );
    assert_eq!(
        one_known.error(),
        Some("Select at least two vehicles to compare")
    );
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn saving_a_comparison_needs_a_requester_and_reports_failures() {
    let ok = harness(
        ScriptedModel::answering("{}"),
        MemoryStore::default(),
        showroom(),
    );
    let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
    let data = json!({ "winner": "Tesla Model Y" });

    let anonymous = ActionResult::from_operation(
        "save comparison",
        comparison::SAVE_FAILURE,
        save_comparison(&ok.ctx, None, &ids, data.clone()).await,
    );
    assert_eq!(anonymous.error(), Some("Unauthorized"));

    let user = Uuid::new_v4();
    let saved = save_comparison(&ok.ctx, Some(user), &ids, data.clone())
        .await
        .unwrap();
    assert_eq!(saved.car_ids, ids);
    assert_eq!(ok.store.records()[0].id, saved.id);
    assert_eq!(ok.store.records()[0].payload, data);

    let broken = harness(
        ScriptedModel::answering("{}"),
        MemoryStore::failing(),
        showroom(),
    );
    let failed = ActionResult::from_operation(
        "save comparison",
        comparison::SAVE_FAILURE,
        save_comparison(&broken.ctx, Some(user), &ids, data).await,
    );
    assert_eq!(failed.error(), Some("Failed to save comparison"));
}

// ============ HTTP handlers ============

fn app_state(h: &Harness, requester: Option<Uuid>) -> Arc<AppState> {
    let config = Config::from_vars(|key| match key {
        "DATABASE_URL" => Some("postgres://127.0.0.1:1/autovolt".to_string()),
        "GEMINI_API_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .unwrap();
    let db = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy(&config.database_url)
        .unwrap();

    Arc::new(AppState {
        db,
        config,
        advisor: h.ctx.clone(),
        identity: Arc::new(FixedIdentity(requester)),
    })
}

#[tokio::test]
async fn maintenance_handler_attributes_record_to_requester() {
    let h = harness(
        ScriptedModel::answering(MAINTENANCE_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let user = Uuid::new_v4();
    let id = find(&h.vehicles, "Leaf").id;
    let mut headers = HeaderMap::new();
    headers.insert(REQUESTER_HEADER, HeaderValue::from_static("auth0|driver-42"));

    let response =
        handlers::predict_maintenance(State(app_state(&h, Some(user))), headers, Path(id)).await;

    let body = serde_json::to_value(&response.0).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["maintenanceSchedule"]["immediate"][0], "Brake fluid check");
    assert_eq!(h.store.records()[0].user_id, user);
}

#[tokio::test]
async fn handler_without_requester_header_stays_anonymous() {
    let h = harness(
        ScriptedModel::answering(MAINTENANCE_JSON),
        MemoryStore::default(),
        showroom(),
    );
    let id = find(&h.vehicles, "Leaf").id;

    let response = handlers::get_maintenance_history(
        State(app_state(&h, Some(Uuid::new_v4()))),
        HeaderMap::new(),
        Path(id),
    )
    .await;

    let body = serde_json::to_value(&response.0).unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));
}

#[tokio::test]
async fn health_reports_unreachable_database() {
    let h = harness(
        ScriptedModel::answering("{}"),
        MemoryStore::default(),
        showroom(),
    );

    let (status, body) = handlers::health(State(app_state(&h, None))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.0["status"], "degraded");
    assert_eq!(body.0["service"], "autovolt-api");
}
