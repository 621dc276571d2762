//! Requester identity.
//!
//! Authentication happens upstream; the auth layer forwards the caller's external id in the
//! [`REQUESTER_HEADER`] header. Requests without it are anonymous, which only disables
//! persistence and the history endpoints.

use async_trait::async_trait;
use axum::http::HeaderMap;
use moka::future::Cache;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};

pub const REQUESTER_HEADER: &str = "x-requester-id";

/// Maps an upstream identity to a local user id.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, external_id: &str) -> Result<Option<Uuid>, AppError>;
}

/// User lookup over the `users` table with a short-lived cache.
///
/// Only found users are cached; an unknown id is looked up again next time, so a user
/// created upstream is recognized on their next request.
pub struct UserDirectory {
    pool: PgPool,
    cache: Cache<String, Uuid>,
}

impl UserDirectory {
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(300))
            .max_capacity(10_000)
            .build();

        Self { pool, cache }
    }
}

#[async_trait]
impl IdentityResolver for UserDirectory {
    async fn resolve(&self, external_id: &str) -> Result<Option<Uuid>, AppError> {
        if let Some(cached) = self.cache.get(external_id).await {
            return Ok(Some(cached));
        }

        let user_id = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM users WHERE external_auth_id = $1 LIMIT 1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .context("resolving requester")?
        .map(|(id,)| id);

        self.remember(external_id, user_id).await;
        Ok(user_id)
    }
}

impl UserDirectory {
    async fn remember(&self, external_id: &str, user_id: Option<Uuid>) {
        match user_id {
            Some(id) => self.cache.insert(external_id.to_string(), id).await,
            None => tracing::debug!("No user for requester {}", external_id),
        }
    }
}

/// External requester id from the forwarded header, if present and non-blank.
pub fn requester_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUESTER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolves the requester of a request to a user id.
///
/// Lookup failures are logged and treated as anonymous.
pub async fn current_requester(resolver: &dyn IdentityResolver, headers: &HeaderMap) -> Option<Uuid> {
    let external_id = requester_from_headers(headers)?;

    match resolver.resolve(&external_id).await {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!("Could not resolve requester {}: {}", external_id, e);
            None
        }
    }
}
