use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{AnalysisKind, AnalysisRecord, NewAnalysisRecord};

/// Append-only store of analysis records.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Writes a new record and returns its id. Records are never updated or deleted.
    async fn create_analysis_record(&self, record: NewAnalysisRecord) -> Result<Uuid, AppError>;

    /// Latest `limit` records of `kind` written for `user_id` about `vehicle_id`, newest first.
    async fn recent_analyses(
        &self,
        kind: AnalysisKind,
        user_id: Uuid,
        vehicle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AnalysisRecord>, AppError>;

    /// Latest record of `kind` about `vehicle_id`, regardless of requester.
    async fn latest_analysis_for_vehicle(
        &self,
        kind: AnalysisKind,
        vehicle_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, AppError>;
}

/// PostgreSQL storage for the `analysis_records` table.
pub struct AnalysisStorage {
    pool: PgPool,
}

impl AnalysisStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for AnalysisStorage {
    async fn create_analysis_record(&self, record: NewAnalysisRecord) -> Result<Uuid, AppError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO analysis_records (id, kind, user_id, vehicle_ids, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.kind.as_str())
        .bind(record.user_id)
        .bind(&record.vehicle_ids)
        .bind(&record.payload)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("inserting {} record", record.kind.as_str()))?;

        tracing::info!(
            "Stored {} record {} for user {}",
            record.kind.as_str(),
            id,
            record.user_id
        );

        Ok(id)
    }

    async fn recent_analyses(
        &self,
        kind: AnalysisKind,
        user_id: Uuid,
        vehicle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AnalysisRecord>, AppError> {
        sqlx::query_as::<_, AnalysisRecord>(
            r#"
            SELECT id, kind, user_id, vehicle_ids, payload, created_at
            FROM analysis_records
            WHERE kind = $1 AND user_id = $2 AND $3 = ANY(vehicle_ids)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(kind.as_str())
        .bind(user_id)
        .bind(vehicle_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("loading analysis history")
    }

    async fn latest_analysis_for_vehicle(
        &self,
        kind: AnalysisKind,
        vehicle_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, AppError> {
        sqlx::query_as::<_, AnalysisRecord>(
            r#"
            SELECT id, kind, user_id, vehicle_ids, payload, created_at
            FROM analysis_records
            WHERE kind = $1 AND $2 = ANY(vehicle_ids)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading latest analysis")
    }
}

/// What happened to a best-effort write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored(Uuid),
    /// No requester identity, nothing to attribute the record to.
    Skipped,
    /// The write failed and was logged.
    Failed,
}

/// Stores an analysis record if a requester is known, never failing the caller.
///
/// Storage errors are logged and reported as [`PersistOutcome::Failed`]; the primary
/// result of the feature is returned regardless.
pub async fn persist_best_effort(
    store: &dyn AnalysisStore,
    kind: AnalysisKind,
    requester: Option<Uuid>,
    vehicle_ids: &[Uuid],
    payload: Value,
) -> PersistOutcome {
    let Some(user_id) = requester else {
        tracing::debug!("No requester identity, skipping {} record", kind.as_str());
        return PersistOutcome::Skipped;
    };

    let record = NewAnalysisRecord {
        kind,
        user_id,
        vehicle_ids: vehicle_ids.to_vec(),
        payload,
    };

    match store.create_analysis_record(record).await {
        Ok(id) => PersistOutcome::Stored(id),
        Err(e) => {
            tracing::error!("Failed to store {} record: {}", kind.as_str(), e);
            PersistOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        written: Mutex<Vec<NewAnalysisRecord>>,
    }

    #[async_trait]
    impl AnalysisStore for RecordingStore {
        async fn create_analysis_record(
            &self,
            record: NewAnalysisRecord,
        ) -> Result<Uuid, AppError> {
            if self.fail {
                return Err(AppError::PersistenceError("disk full".to_string()));
            }
            self.written.lock().unwrap().push(record);
            Ok(Uuid::new_v4())
        }

        async fn recent_analyses(
            &self,
            _kind: AnalysisKind,
            _user_id: Uuid,
            _vehicle_id: Uuid,
            _limit: i64,
        ) -> Result<Vec<AnalysisRecord>, AppError> {
            Ok(vec![])
        }

        async fn latest_analysis_for_vehicle(
            &self,
            _kind: AnalysisKind,
            _vehicle_id: Uuid,
        ) -> Result<Option<AnalysisRecord>, AppError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn skips_without_identity() {
        let store = RecordingStore::default();
        let outcome = persist_best_effort(
            &store,
            AnalysisKind::PriceAnalysis,
            None,
            &[Uuid::new_v4()],
            json!({}),
        )
        .await;

        assert_eq!(outcome, PersistOutcome::Skipped);
        assert!(store.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stores_with_identity() {
        let store = RecordingStore::default();
        let user = Uuid::new_v4();
        let car = Uuid::new_v4();

        let outcome = persist_best_effort(
            &store,
            AnalysisKind::MaintenancePrediction,
            Some(user),
            &[car],
            json!({"totalMaintenanceCost": 900}),
        )
        .await;

        assert!(matches!(outcome, PersistOutcome::Stored(_)));
        let written = store.written.lock().unwrap();
        assert_eq!(written[0].user_id, user);
        assert_eq!(written[0].vehicle_ids, vec![car]);
        assert_eq!(written[0].kind, AnalysisKind::MaintenancePrediction);
    }

    #[tokio::test]
    async fn storage_error_is_swallowed() {
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let outcome = persist_best_effort(
            &store,
            AnalysisKind::EnvironmentalImpact,
            Some(Uuid::new_v4()),
            &[Uuid::new_v4()],
            json!({}),
        )
        .await;

        assert_eq!(outcome, PersistOutcome::Failed);
    }
}
