use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{PageParams, PaymentStatus, ServiceError, ServiceResult, SettlementEvent};
use uuid::Uuid;

use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, payment: NewPayment) -> ServiceResult<Payment>;
    async fn find_by_uuid(&self, uuid: Uuid) -> ServiceResult<Payment>;
    /// Latest payment for an order, if any.
    async fn find_by_order(&self, order_id: Uuid) -> ServiceResult<Option<Payment>>;
    async fn list(&self, page: PageParams) -> ServiceResult<(Vec<Payment>, i64)>;
    /// Writes the settlement fields and enqueues the event in the outbox in
    /// one transaction. A payment that is already settled is left untouched
    /// and no event is enqueued.
    async fn apply_settlement(
        &self,
        payment_uuid: Uuid,
        changeset: SettlementChangeset,
        event: &SettlementEvent,
    ) -> ServiceResult<Payment>;
}

pub struct PgPaymentStore {
    pool: DbPool,
}

impl PgPaymentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> ServiceResult<PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.map_err(ServiceError::persistence)
    }
}

fn storage_error(err: diesel::result::Error) -> ServiceError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            ServiceError::Conflict("payment already exists".into())
        }
        other => ServiceError::persistence(other),
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn create(&self, payment: NewPayment) -> ServiceResult<Payment> {
        let mut conn = self.conn().await?;
        diesel::insert_into(payments::table)
            .values(&payment)
            .get_result(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> ServiceResult<Payment> {
        let mut conn = self.conn().await?;
        payments::table
            .filter(payments::uuid.eq(uuid))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?
            .ok_or(ServiceError::NotFound("payment"))
    }

    async fn find_by_order(&self, order_id: Uuid) -> ServiceResult<Option<Payment>> {
        let mut conn = self.conn().await?;
        payments::table
            .filter(payments::order_id.eq(order_id))
            .order(payments::id.desc())
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)
    }

    async fn list(&self, page: PageParams) -> ServiceResult<(Vec<Payment>, i64)> {
        let mut conn = self.conn().await?;
        let total: i64 = payments::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(storage_error)?;
        let rows = payments::table
            .order(payments::created_at.desc())
            .limit(page.limit)
            .offset(page.offset())
            .load(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok((rows, total))
    }

    async fn apply_settlement(
        &self,
        payment_uuid: Uuid,
        changeset: SettlementChangeset,
        event: &SettlementEvent,
    ) -> ServiceResult<Payment> {
        let mut conn = self.conn().await?;
        let event_data = serde_json::to_value(event).map_err(ServiceError::persistence)?;
        let aggregate_id = event.order_id;

        conn.transaction::<Payment, anyhow::Error, _>(|conn| {
            Box::pin(async move {
                // Conditional update: a settled payment is immutable, even
                // under concurrent webhook deliveries.
                let updated = diesel::update(
                    payments::table
                        .filter(payments::uuid.eq(payment_uuid))
                        .filter(payments::status.ne(PaymentStatus::Settled.as_str())),
                )
                .set((&changeset, payments::updated_at.eq(diesel::dsl::now)))
                .execute(conn)
                .await?;

                if updated > 0 {
                    let outbox_event = NewOutboxEvent {
                        id: Uuid::new_v4(),
                        aggregate_id,
                        event_type: "PaymentStatusChanged".to_string(),
                        event_data,
                    };
                    diesel::insert_into(outbox_events::table)
                        .values(&outbox_event)
                        .execute(conn)
                        .await?;
                }

                let payment = payments::table
                    .filter(payments::uuid.eq(payment_uuid))
                    .first(conn)
                    .await?;
                Ok(payment)
            })
        })
        .await
        .map_err(ServiceError::persistence)
    }
}
