//! Feature services.
//!
//! Each feature loads what it needs from the inventory, runs the shared model stage,
//! derives metrics and persists a record on a best-effort basis. Collaborators are passed
//! in through [`AdvisorContext`]; the wall clock is read by the HTTP layer and handed down.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db_storage::{persist_best_effort, AnalysisStore, PersistOutcome};
use crate::gemini_client::LanguageModel;
use crate::metrics::CostAssumptions;
use crate::models::AnalysisKind;
use crate::pricing::PricingConfig;
use crate::vehicles::VehicleRepository;

pub mod chat;
pub mod comparison;
pub mod environmental;
pub mod maintenance;
pub mod price_analysis;

/// Collaborators shared by every feature.
#[derive(Clone)]
pub struct AdvisorContext {
    pub model: Arc<dyn LanguageModel>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub pricing: PricingConfig,
    pub costs: CostAssumptions,
}

impl AdvisorContext {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        vehicles: Arc<dyn VehicleRepository>,
        analyses: Arc<dyn AnalysisStore>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            model,
            vehicles,
            analyses,
            pricing,
            costs: CostAssumptions::default(),
        }
    }

    /// Serializes `payload` and stores it if the requester is known.
    pub(crate) async fn persist<T: Serialize>(
        &self,
        kind: AnalysisKind,
        requester: Option<Uuid>,
        vehicle_ids: &[Uuid],
        payload: &T,
    ) -> PersistOutcome {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Could not serialize {} record: {}", kind.as_str(), e);
                return PersistOutcome::Failed;
            }
        };

        persist_best_effort(
            self.analyses.as_ref(),
            kind,
            requester,
            vehicle_ids,
            payload,
        )
        .await
    }
}
