use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Router};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::auth::require_api_key;
use shared::{ApiKeyConfig, PageParams, PageResult, ServiceError};
use uuid::Uuid;

use crate::models::Payment;
use crate::service::{CreatePaymentRequest, PaymentService, WebhookRequest};
use crate::store::PgPaymentStore;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PaymentService<PgPaymentStore>>,
    pub auth: ApiKeyConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    pub order_id: Uuid,
    pub amount: BigDecimal,
    pub expired_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/api/v1/payment", post(create_payment))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/payment", get(list_payments))
        .route("/api/v1/payment/webhook", post(webhook))
        .route("/api/v1/payment/:uuid", get(get_payment))
        .merge(internal)
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<(StatusCode, Json<Payment>), ServiceError> {
    let payment = state
        .service
        .create_payment(CreatePaymentRequest {
            order_id: body.order_id,
            amount: body.amount,
            expired_at: body.expired_at,
            description: body.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn webhook(
    State(state): State<AppState>,
    Json(body): Json<WebhookRequest>,
) -> Result<StatusCode, ServiceError> {
    state.service.webhook(body).await?;
    Ok(StatusCode::OK)
}

async fn get_payment(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<Payment>, ServiceError> {
    Ok(Json(state.service.get_payment(uuid).await?))
}

async fn list_payments(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<PageResult<Payment>>, ServiceError> {
    Ok(Json(state.service.list_payments(page).await?))
}

async fn health_check() -> &'static str {
    "OK"
}
