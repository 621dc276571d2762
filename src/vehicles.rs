use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{VehicleRecord, VehicleRow};
use crate::query::VehicleQuery;

/// Read access to the dealership inventory.
#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn find_vehicles(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, AppError>;

    async fn find_vehicle_by_id(&self, id: Uuid) -> Result<Option<VehicleRecord>, AppError>;
}

/// Inventory backed by the `cars` table.
pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    async fn find_vehicles(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, AppError> {
        let mut builder = query.to_sql();
        tracing::debug!("Vehicle query: {}", builder.sql());

        let rows: Vec<VehicleRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("searching vehicles")?;

        Ok(rows.into_iter().map(VehicleRecord::from).collect())
    }

    async fn find_vehicle_by_id(&self, id: Uuid) -> Result<Option<VehicleRecord>, AppError> {
        let mut builder = VehicleQuery::by_ids(&[id]).to_sql();

        let row: Option<VehicleRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("loading vehicle {}", id))?;

        Ok(row.map(VehicleRecord::from))
    }
}

/// Loads a vehicle or fails with the caller-facing "Car not found".
pub async fn require_vehicle(
    vehicles: &dyn VehicleRepository,
    id: Uuid,
) -> Result<VehicleRecord, AppError> {
    vehicles
        .find_vehicle_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Car not found".to_string()))
}
