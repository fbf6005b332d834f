use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use shared::auth::require_api_key;
use shared::{ApiKeyConfig, PageParams, PageResult, ScheduleStatus, ServiceError};
use uuid::Uuid;

use crate::models::{Field, SlotDetail, TimeWindow};
use crate::service::ScheduleService;
use crate::store::{BookingOutcome, PgScheduleStore};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScheduleService<PgScheduleStore>>,
    pub auth: ApiKeyConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    pub name: String,
    pub price_per_hour: BigDecimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateWindowRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateSchedulesRequest {
    pub field_id: Uuid,
    pub date: NaiveDate,
    pub time_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateOneMonthRequest {
    pub field_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BookingQuery {
    pub field_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct MoveScheduleRequest {
    pub date: NaiveDate,
    pub time_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub field_schedule_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub uuid: Uuid,
    pub field_id: Uuid,
    pub field_name: String,
    pub date: NaiveDate,
    pub price_per_hour: BigDecimal,
    pub status: ScheduleStatus,
    pub time: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<SlotDetail> for ScheduleResponse {
    type Error = ServiceError;

    fn try_from(detail: SlotDetail) -> Result<Self, ServiceError> {
        let status = detail.schedule.status()?;
        let time = detail.time_range();
        Ok(Self {
            uuid: detail.schedule.uuid,
            field_id: detail.field.uuid,
            field_name: detail.field.name,
            date: detail.schedule.date,
            price_per_hour: detail.field.price_per_hour,
            status,
            time,
            created_at: detail.schedule.created_at,
            updated_at: detail.schedule.updated_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GeneratedResponse {
    pub created: usize,
}

#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    pub field_schedule_id: Uuid,
    pub status: ScheduleStatus,
    pub already_booked: bool,
}

pub fn create_router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/api/v1/field/schedule/status", patch(update_status))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/field", get(list_fields).post(create_field))
        .route("/api/v1/field/time", get(list_windows).post(create_window))
        .route(
            "/api/v1/field/schedule",
            get(list_schedules).post(create_schedules),
        )
        .route("/api/v1/field/schedule/one-month", post(generate_one_month))
        .route("/api/v1/field/schedule/lists", get(list_for_booking))
        .route(
            "/api/v1/field/schedule/:uuid",
            get(get_schedule).patch(move_schedule).delete(delete_schedule),
        )
        .merge(internal)
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

async fn create_field(
    State(state): State<AppState>,
    Json(request): Json<CreateFieldRequest>,
) -> Result<(StatusCode, Json<Field>), ServiceError> {
    let field = state
        .service
        .create_field(request.name, request.price_per_hour)
        .await?;
    Ok((StatusCode::CREATED, Json(field)))
}

async fn list_fields(State(state): State<AppState>) -> Result<Json<Vec<Field>>, ServiceError> {
    Ok(Json(state.service.list_fields().await?))
}

async fn create_window(
    State(state): State<AppState>,
    Json(request): Json<CreateWindowRequest>,
) -> Result<(StatusCode, Json<TimeWindow>), ServiceError> {
    let window = state
        .service
        .create_window(request.start_time, request.end_time)
        .await?;
    Ok((StatusCode::CREATED, Json(window)))
}

async fn list_windows(
    State(state): State<AppState>,
) -> Result<Json<Vec<TimeWindow>>, ServiceError> {
    Ok(Json(state.service.list_windows().await?))
}

async fn generate_one_month(
    State(state): State<AppState>,
    Json(request): Json<GenerateOneMonthRequest>,
) -> Result<(StatusCode, Json<GeneratedResponse>), ServiceError> {
    let created = state.service.generate_one_month(request.field_id).await?;
    Ok((StatusCode::CREATED, Json(GeneratedResponse { created })))
}

async fn create_schedules(
    State(state): State<AppState>,
    Json(request): Json<CreateSchedulesRequest>,
) -> Result<(StatusCode, Json<GeneratedResponse>), ServiceError> {
    let created = state
        .service
        .create_schedules(request.field_id, request.date, request.time_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(GeneratedResponse { created })))
}

async fn list_schedules(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> Result<Json<PageResult<ScheduleResponse>>, ServiceError> {
    let result = state.service.list_slots(page).await?;
    let data = result
        .data
        .into_iter()
        .map(ScheduleResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(PageResult {
        total_page: result.total_page,
        total_data: result.total_data,
        next_page: result.next_page,
        previous_page: result.previous_page,
        page: result.page,
        limit: result.limit,
        data,
    }))
}

async fn list_for_booking(
    State(state): State<AppState>,
    Query(query): Query<BookingQuery>,
) -> Result<Json<Vec<ScheduleResponse>>, ServiceError> {
    let slots = state
        .service
        .list_for_booking(query.field_id, query.date)
        .await?;
    let data = slots
        .into_iter()
        .map(ScheduleResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(data))
}

async fn get_schedule(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<ScheduleResponse>, ServiceError> {
    let slot = state.service.get_slot(uuid).await?;
    Ok(Json(slot.try_into()?))
}

async fn move_schedule(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Json(request): Json<MoveScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ServiceError> {
    let slot = state
        .service
        .move_slot(uuid, request.date, request.time_id)
        .await?;
    Ok(Json(slot.try_into()?))
}

async fn delete_schedule(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.service.delete_slot(uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_status(
    State(state): State<AppState>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateStatusResponse>, ServiceError> {
    let outcome = state.service.mark_booked(request.field_schedule_id).await?;
    Ok(Json(UpdateStatusResponse {
        field_schedule_id: request.field_schedule_id,
        status: ScheduleStatus::Booked,
        already_booked: outcome == BookingOutcome::AlreadyBooked,
    }))
}

async fn health_check() -> &'static str {
    "OK"
}
