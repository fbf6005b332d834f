use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::{PageParams, ServiceError, ServiceResult};
use uuid::Uuid;

use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Next value of the per-day order sequence. Must be safe under
    /// concurrent order creation.
    async fn next_seq(&self, day: NaiveDate) -> ServiceResult<i32>;
    async fn create(&self, order: NewOrder) -> ServiceResult<Order>;
    async fn find_by_uuid(&self, uuid: Uuid) -> ServiceResult<Order>;
    async fn list(&self, page: PageParams) -> ServiceResult<(Vec<Order>, i64)>;
    async fn list_by_user(&self, user_id: Uuid) -> ServiceResult<Vec<Order>>;
    async fn set_payment_link(&self, uuid: Uuid, link: &str) -> ServiceResult<()>;
    async fn update_status(
        &self,
        uuid: Uuid,
        status: OrderStatus,
        is_paid: bool,
    ) -> ServiceResult<()>;
}

pub struct PgOrderStore {
    pool: DbPool,
}

impl PgOrderStore {
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
            ServiceError::Conflict("order already exists".into())
        }
        other => ServiceError::persistence(other),
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn next_seq(&self, day: NaiveDate) -> ServiceResult<i32> {
        let mut conn = self.conn().await?;
        // Single atomic upsert; two concurrent creations get distinct values.
        diesel::insert_into(order_counters::table)
            .values((order_counters::day.eq(day), order_counters::last_seq.eq(1)))
            .on_conflict(order_counters::day)
            .do_update()
            .set(order_counters::last_seq.eq(order_counters::last_seq + 1))
            .returning(order_counters::last_seq)
            .get_result(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn create(&self, order: NewOrder) -> ServiceResult<Order> {
        let mut conn = self.conn().await?;
        diesel::insert_into(orders::table)
            .values(&order)
            .get_result(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn find_by_uuid(&self, uuid: Uuid) -> ServiceResult<Order> {
        let mut conn = self.conn().await?;
        orders::table
            .filter(orders::uuid.eq(uuid))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?
            .ok_or(ServiceError::NotFound("order"))
    }

    async fn list(&self, page: PageParams) -> ServiceResult<(Vec<Order>, i64)> {
        let mut conn = self.conn().await?;
        let total: i64 = orders::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(storage_error)?;
        let rows = orders::table
            .order(orders::created_at.desc())
            .limit(page.limit)
            .offset(page.offset())
            .load(&mut conn)
            .await
            .map_err(storage_error)?;
        Ok((rows, total))
    }

    async fn list_by_user(&self, user_id: Uuid) -> ServiceResult<Vec<Order>> {
        let mut conn = self.conn().await?;
        orders::table
            .filter(orders::user_id.eq(user_id))
            .order(orders::created_at.desc())
            .load(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn set_payment_link(&self, uuid: Uuid, link: &str) -> ServiceResult<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(orders::table.filter(orders::uuid.eq(uuid)))
            .set((
                orders::payment_link.eq(link),
                orders::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        if updated == 0 {
            return Err(ServiceError::NotFound("order"));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        uuid: Uuid,
        status: OrderStatus,
        is_paid: bool,
    ) -> ServiceResult<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(orders::table.filter(orders::uuid.eq(uuid)))
            .set((
                orders::status.eq(status.as_str()),
                orders::is_paid.eq(is_paid),
                orders::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        if updated == 0 {
            return Err(ServiceError::NotFound("order"));
        }
        Ok(())
    }
}
