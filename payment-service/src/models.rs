use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use shared::{PaymentStatus, ServiceError, ServiceResult};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::payments)]
pub struct Payment {
    pub id: i32,
    pub uuid: Uuid,
    pub order_id: Uuid,
    pub amount: BigDecimal,
    pub payment_link: String,
    pub expired_at: Option<DateTime<Utc>>,
    pub status: String,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub bank: Option<String>,
    pub va_number: Option<String>,
    pub acquirer: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn status(&self) -> ServiceResult<PaymentStatus> {
        self.status.parse().map_err(ServiceError::Persistence)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
pub struct NewPayment {
    pub uuid: Uuid,
    pub order_id: Uuid,
    pub amount: BigDecimal,
    pub payment_link: String,
    pub expired_at: Option<DateTime<Utc>>,
    pub status: String,
    pub description: Option<String>,
}

/// Settlement fields written by the webhook, in one transaction with the
/// outbox row. `None` fields are left untouched by diesel.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::payments)]
pub struct SettlementChangeset {
    pub status: String,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub bank: Option<String>,
    pub va_number: Option<String>,
    pub acquirer: Option<String>,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct DbOutboxEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub processed: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::outbox_events)]
pub struct NewOutboxEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
}
