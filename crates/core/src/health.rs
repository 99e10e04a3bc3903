//! Health reporting
//!
//! Overall boolean status plus per-dependency status, serialized as the
//! health endpoint response body. No bearing on reconciliation correctness.

use serde::Serialize;
use sqlx::PgPool;

/// Status of one dependency
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub name: String,
    pub status: bool,
}

/// Aggregated health response
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: bool,
    pub resources: Vec<ResourceStatus>,
}

impl HealthReport {
    pub fn from_resources(resources: Vec<ResourceStatus>) -> Self {
        Self {
            status: resources.iter().all(|r| r.status),
            resources,
        }
    }
}

/// Probe database connectivity
pub async fn database_healthy(pool: &PgPool) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health probe failed");
            false
        }
    }
}
