use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::{PageParams, ScheduleStatus, ServiceError, ServiceResult};
use uuid::Uuid;

use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

/// Outcome of the conditional Available -> Booked transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked,
    /// The slot was already Booked. Settlement retries hit this; it is not
    /// an error.
    AlreadyBooked,
}

/// Storage seam for schedules and the field/time-window catalog. The
/// Postgres implementation is the production one; tests run against an
/// in-memory implementation.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create_field(&self, field: NewField) -> ServiceResult<Field>;
    async fn list_fields(&self) -> ServiceResult<Vec<Field>>;
    async fn find_field(&self, uuid: Uuid) -> ServiceResult<Field>;

    async fn create_window(&self, window: NewTimeWindow) -> ServiceResult<TimeWindow>;
    async fn list_windows(&self) -> ServiceResult<Vec<TimeWindow>>;
    async fn find_window(&self, uuid: Uuid) -> ServiceResult<TimeWindow>;

    async fn find_by_date_and_window(
        &self,
        field_id: i32,
        date: NaiveDate,
        time_id: i32,
    ) -> ServiceResult<Option<FieldSchedule>>;
    async fn create_slots(&self, slots: Vec<NewFieldSchedule>) -> ServiceResult<usize>;
    async fn find_slot(&self, uuid: Uuid) -> ServiceResult<SlotDetail>;
    async fn list_slots(&self, page: PageParams) -> ServiceResult<(Vec<SlotDetail>, i64)>;
    /// Slots for one field on one date, ordered by window start time.
    async fn list_by_field_and_date(
        &self,
        field_id: i32,
        date: NaiveDate,
    ) -> ServiceResult<Vec<SlotDetail>>;
    async fn move_slot(&self, uuid: Uuid, date: NaiveDate, time_id: i32) -> ServiceResult<()>;
    /// Compare-and-set `status = Booked where uuid = ? and status = Available`.
    async fn mark_booked(&self, uuid: Uuid) -> ServiceResult<BookingOutcome>;
    async fn delete_slot(&self, uuid: Uuid) -> ServiceResult<()>;
}

pub struct PgScheduleStore {
    pool: DbPool,
}

impl PgScheduleStore {
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
            ServiceError::Conflict("field schedule already exists".into())
        }
        other => ServiceError::persistence(other),
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn create_field(&self, field: NewField) -> ServiceResult<Field> {
        let mut conn = self.conn().await?;
        diesel::insert_into(fields::table)
            .values(&field)
            .get_result(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn list_fields(&self) -> ServiceResult<Vec<Field>> {
        let mut conn = self.conn().await?;
        fields::table
            .order(fields::id.asc())
            .load(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn find_field(&self, uuid: Uuid) -> ServiceResult<Field> {
        let mut conn = self.conn().await?;
        fields::table
            .filter(fields::uuid.eq(uuid))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?
            .ok_or(ServiceError::NotFound("field"))
    }

    async fn create_window(&self, window: NewTimeWindow) -> ServiceResult<TimeWindow> {
        let mut conn = self.conn().await?;
        diesel::insert_into(times::table)
            .values(&window)
            .get_result(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn list_windows(&self) -> ServiceResult<Vec<TimeWindow>> {
        let mut conn = self.conn().await?;
        times::table
            .order(times::start_time.asc())
            .load(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn find_window(&self, uuid: Uuid) -> ServiceResult<TimeWindow> {
        let mut conn = self.conn().await?;
        times::table
            .filter(times::uuid.eq(uuid))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?
            .ok_or(ServiceError::NotFound("time window"))
    }

    async fn find_by_date_and_window(
        &self,
        field_id: i32,
        date: NaiveDate,
        time_id: i32,
    ) -> ServiceResult<Option<FieldSchedule>> {
        let mut conn = self.conn().await?;
        field_schedules::table
            .filter(field_schedules::field_id.eq(field_id))
            .filter(field_schedules::date.eq(date))
            .filter(field_schedules::time_id.eq(time_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)
    }

    async fn create_slots(&self, slots: Vec<NewFieldSchedule>) -> ServiceResult<usize> {
        let mut conn = self.conn().await?;
        diesel::insert_into(field_schedules::table)
            .values(&slots)
            .execute(&mut conn)
            .await
            .map_err(storage_error)
    }

    async fn find_slot(&self, uuid: Uuid) -> ServiceResult<SlotDetail> {
        let mut conn = self.conn().await?;
        let row: Option<(FieldSchedule, Field, TimeWindow)> = field_schedules::table
            .inner_join(fields::table)
            .inner_join(times::table)
            .filter(field_schedules::uuid.eq(uuid))
            .select((
                field_schedules::all_columns,
                fields::all_columns,
                times::all_columns,
            ))
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?;
        let (schedule, field, window) = row.ok_or(ServiceError::NotFound("field schedule"))?;
        Ok(SlotDetail {
            schedule,
            field,
            window,
        })
    }

    async fn list_slots(&self, page: PageParams) -> ServiceResult<(Vec<SlotDetail>, i64)> {
        let mut conn = self.conn().await?;
        let total: i64 = field_schedules::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(storage_error)?;

        let rows: Vec<(FieldSchedule, Field, TimeWindow)> = field_schedules::table
            .inner_join(fields::table)
            .inner_join(times::table)
            .select((
                field_schedules::all_columns,
                fields::all_columns,
                times::all_columns,
            ))
            .order(field_schedules::created_at.desc())
            .limit(page.limit)
            .offset(page.offset())
            .load(&mut conn)
            .await
            .map_err(storage_error)?;

        Ok((
            rows.into_iter()
                .map(|(schedule, field, window)| SlotDetail {
                    schedule,
                    field,
                    window,
                })
                .collect(),
            total,
        ))
    }

    async fn list_by_field_and_date(
        &self,
        field_id: i32,
        date: NaiveDate,
    ) -> ServiceResult<Vec<SlotDetail>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(FieldSchedule, Field, TimeWindow)> = field_schedules::table
            .inner_join(fields::table)
            .inner_join(times::table)
            .filter(field_schedules::field_id.eq(field_id))
            .filter(field_schedules::date.eq(date))
            .select((
                field_schedules::all_columns,
                fields::all_columns,
                times::all_columns,
            ))
            .order(times::start_time.asc())
            .load(&mut conn)
            .await
            .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|(schedule, field, window)| SlotDetail {
                schedule,
                field,
                window,
            })
            .collect())
    }

    async fn move_slot(&self, uuid: Uuid, date: NaiveDate, time_id: i32) -> ServiceResult<()> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(field_schedules::table.filter(field_schedules::uuid.eq(uuid)))
            .set((
                field_schedules::date.eq(date),
                field_schedules::time_id.eq(time_id),
                field_schedules::updated_at.eq(diesel::dsl::now),
            ))
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        if updated == 0 {
            return Err(ServiceError::NotFound("field schedule"));
        }
        Ok(())
    }

    async fn mark_booked(&self, uuid: Uuid) -> ServiceResult<BookingOutcome> {
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            field_schedules::table
                .filter(field_schedules::uuid.eq(uuid))
                .filter(field_schedules::status.eq(ScheduleStatus::Available.code())),
        )
        .set((
            field_schedules::status.eq(ScheduleStatus::Booked.code()),
            field_schedules::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)
        .await
        .map_err(storage_error)?;

        if updated > 0 {
            return Ok(BookingOutcome::Booked);
        }

        // The conditional update matched nothing: either the slot is gone or
        // something already booked it.
        let status: Option<i32> = field_schedules::table
            .filter(field_schedules::uuid.eq(uuid))
            .select(field_schedules::status)
            .first(&mut conn)
            .await
            .optional()
            .map_err(storage_error)?;

        match status {
            None => Err(ServiceError::NotFound("field schedule")),
            Some(_) => Ok(BookingOutcome::AlreadyBooked),
        }
    }

    async fn delete_slot(&self, uuid: Uuid) -> ServiceResult<()> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(field_schedules::table.filter(field_schedules::uuid.eq(uuid)))
            .execute(&mut conn)
            .await
            .map_err(storage_error)?;
        if deleted == 0 {
            return Err(ServiceError::NotFound("field schedule"));
        }
        Ok(())
    }
}
