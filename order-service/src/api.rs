use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use shared::{PageParams, PageResult, ServiceError};
use uuid::Uuid;

use crate::clients::{HttpFieldClient, HttpPaymentClient};
use crate::models::Order;
use crate::orchestrator::OrderService;
use crate::store::PgOrderStore;

pub type Service = OrderService<PgOrderStore, HttpFieldClient, HttpPaymentClient>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub field_schedule_id: Uuid,
}

/// Caller identity as injected by the gateway in front of this service.
fn user_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| ServiceError::Unauthorized("missing or invalid user identity".into()))
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/order", post(create_order).get(list_orders))
        .route("/api/v1/order/user", get(list_orders_by_user))
        .route("/api/v1/order/:uuid", get(get_order))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ServiceError> {
    let user = user_id(&headers)?;
    let order = state
        .service
        .create_order(user, request.field_schedule_id, bearer(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<Order>, ServiceError> {
    Ok(Json(state.service.get_order(uuid).await?))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<PageResult<Order>>, ServiceError> {
    Ok(Json(state.service.list_orders(page).await?))
}

async fn list_orders_by_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Order>>, ServiceError> {
    let user = user_id(&headers)?;
    Ok(Json(state.service.list_orders_by_user(user).await?))
}

async fn health_check() -> &'static str {
    "OK"
}
