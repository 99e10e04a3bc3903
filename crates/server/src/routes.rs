//! HTTP surface: health check plus the gated debug write route

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use redis::aio::ConnectionManager;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use collector_core::{
    database_healthy, HealthReport, Invoice, NewInvoice, PgEntityStore, ResourceStatus,
};

use crate::consumer::queue_healthy;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub store: PgEntityStore,
}

pub fn create_router(state: AppState, enable_debug_endpoints: bool) -> Router {
    let mut router = Router::new().route("/health", get(health_check));

    if enable_debug_endpoints {
        tracing::warn!("Debug endpoints enabled; do not run this in production");
        router = router.route("/debug/invoice", post(debug_write_invoice));
    }

    router.with_state(state)
}

/// Overall boolean status plus per-dependency status; 500 when degraded
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthReport::from_resources(vec![
        ResourceStatus {
            name: "database".to_string(),
            status: database_healthy(&state.pool).await,
        },
        ResourceStatus {
            name: "queue".to_string(),
            status: queue_healthy(&state.redis).await,
        },
    ]);

    let code = if report.status {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(report))
}

#[derive(Debug, Deserialize)]
struct DebugInvoiceRequest {
    external_id: String,
    owner_id: i64,
    user_id: Uuid,
    address_id: Option<Uuid>,
    total_price: f64,
}

/// Raw invoice insert bypassing reconciliation. Only mounted when
/// `ENABLE_DEBUG_ENDPOINTS=true`.
async fn debug_write_invoice(
    State(state): State<AppState>,
    Json(req): Json<DebugInvoiceRequest>,
) -> Result<Json<Invoice>, (StatusCode, String)> {
    let invoice = state
        .store
        .insert_raw_invoice(NewInvoice {
            external_id: req.external_id,
            owner_id: req.owner_id,
            user_id: req.user_id,
            address_id: req.address_id,
            total_price: req.total_price,
        })
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(invoice))
}
