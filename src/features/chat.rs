use serde::Serialize;
use uuid::Uuid;

use super::AdvisorContext;
use crate::ai_models::ChatModelReply;
use crate::errors::AppError;
use crate::models::{ChatTurn, PreferenceFilter, VehicleRecord};
use crate::pipeline::run_model_stage;
use crate::pricing::PricingConfig;
use crate::prompts::chat_prompt;
use crate::query::VehicleQuery;

/// A recommended vehicle with its price formatted for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedVehicle {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: String,
    pub fuel_type: String,
    pub body_type: Option<String>,
    pub images: Vec<String>,
}

impl RecommendedVehicle {
    fn from_record(vehicle: VehicleRecord, pricing: &PricingConfig) -> Self {
        Self {
            price: pricing.format_price(vehicle.price),
            id: vehicle.id,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            fuel_type: vehicle.fuel_type,
            body_type: vehicle.body_type,
            images: vehicle.images,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    pub preferences: PreferenceFilter,
    pub recommendations: Vec<RecommendedVehicle>,
}

/// Answers a chat message with extracted preferences and up to three matching vehicles.
pub async fn process_chat_message(
    ctx: &AdvisorContext,
    message: &str,
    history: &[ChatTurn],
) -> Result<ChatResponse, AppError> {
    let prompt = chat_prompt(message, history);
    let reply: ChatModelReply = run_model_stage(ctx.model.as_ref(), &prompt).await?;

    let query = VehicleQuery::recommendations(&reply.preferences);
    let vehicles = ctx.vehicles.find_vehicles(&query).await?;
    tracing::info!(
        "Chat matched {} vehicle(s) with {} clause(s)",
        vehicles.len(),
        query.clauses.len()
    );

    let message = compose_reply(&reply, !vehicles.is_empty());
    let recommendations = vehicles
        .into_iter()
        .map(|v| RecommendedVehicle::from_record(v, &ctx.pricing))
        .collect();

    Ok(ChatResponse {
        message,
        preferences: reply.preferences,
        recommendations,
    })
}

/// The model's message, followed by a follow-up question for missing preferences and an
/// introduction to the recommendations when there are any.
pub fn compose_reply(reply: &ChatModelReply, has_recommendations: bool) -> String {
    let mut message = reply.message.clone().unwrap_or_default();

    if reply.should_ask_more {
        let prefs = &reply.preferences;
        let mut missing = Vec::new();
        if prefs.make.is_none() {
            missing.push("preferred car brand");
        }
        if prefs.body_type.is_none() {
            missing.push("type of vehicle");
        }
        if prefs.max_price.filter(|p| *p > 0.0).is_none() {
            missing.push("budget range");
        }

        if !missing.is_empty() {
            message.push_str(&format!(
                "\n\nTo help you better, could you tell me your {}?",
                missing.join(", ")
            ));
        }
    }

    if has_recommendations {
        message.push_str("\n\nHere are some cars that match your preferences:");
    }

    message
}
