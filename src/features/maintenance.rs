use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::AdvisorContext;
use crate::ai_models::{Level, MaintenancePrediction, MaintenanceSchedule};
use crate::errors::AppError;
use crate::models::{AnalysisKind, AnalysisRecord};
use crate::pipeline::run_model_stage;
use crate::prompts::maintenance_prompt;
use crate::vehicles::require_vehicle;

pub const HISTORY_LIMIT: i64 = 5;
pub const HISTORY_FAILURE: &str = "Failed to fetch maintenance history";
pub const REMINDERS_FAILURE: &str = "Failed to generate service reminders";

/// Predicts upcoming services for a vehicle and records the prediction for the requester.
pub async fn generate_maintenance_prediction(
    ctx: &AdvisorContext,
    vehicle_id: Uuid,
    requester: Option<Uuid>,
) -> Result<MaintenancePrediction, AppError> {
    let vehicle = require_vehicle(ctx.vehicles.as_ref(), vehicle_id).await?;

    let prompt = maintenance_prompt(&vehicle);
    let prediction: MaintenancePrediction = run_model_stage(ctx.model.as_ref(), &prompt).await?;

    tracing::info!(
        "Predicted {} service(s) for {}",
        prediction.next_services.len(),
        vehicle.display_name()
    );

    ctx.persist(
        AnalysisKind::MaintenancePrediction,
        requester,
        &[vehicle.id],
        &prediction,
    )
    .await;

    Ok(prediction)
}

/// The requester's latest predictions for a vehicle, newest first.
pub async fn maintenance_history(
    ctx: &AdvisorContext,
    vehicle_id: Uuid,
    requester: Option<Uuid>,
) -> Result<Vec<AnalysisRecord>, AppError> {
    let user_id = requester
        .ok_or_else(|| AppError::Unauthorized("maintenance history needs a requester".to_string()))?;

    ctx.analyses
        .recent_analyses(
            AnalysisKind::MaintenancePrediction,
            user_id,
            vehicle_id,
            HISTORY_LIMIT,
        )
        .await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReminder {
    pub service: String,
    pub due_date: DateTime<Utc>,
    pub priority: Level,
}

/// Reminders built from the most recent prediction stored for a vehicle.
pub async fn service_reminders(
    ctx: &AdvisorContext,
    vehicle_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<ServiceReminder>, AppError> {
    let record = ctx
        .analyses
        .latest_analysis_for_vehicle(AnalysisKind::MaintenancePrediction, vehicle_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No maintenance prediction found".to_string()))?;

    let schedule: MaintenanceSchedule = record
        .payload
        .get("maintenanceSchedule")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| {
            AppError::InternalError(format!(
                "stored prediction {} has a malformed schedule: {}",
                record.id, e
            ))
        })?
        .unwrap_or_default();

    Ok(build_reminders(&schedule, now))
}

/// Immediate items are due now (HIGH), three-month items in three months (MEDIUM) and
/// six-month items in six months (LOW). Twelve-month items get no reminder yet.
pub fn build_reminders(schedule: &MaintenanceSchedule, now: DateTime<Utc>) -> Vec<ServiceReminder> {
    let in_months = |months: u32| now.checked_add_months(Months::new(months)).unwrap_or(now);

    let buckets = [
        (&schedule.immediate, now, Level::High),
        (&schedule.next_3_months, in_months(3), Level::Medium),
        (&schedule.next_6_months, in_months(6), Level::Low),
    ];

    buckets
        .into_iter()
        .flat_map(|(services, due_date, priority)| {
            services.iter().map(move |service| ServiceReminder {
                service: service.clone(),
                due_date,
                priority,
            })
        })
        .collect()
}
