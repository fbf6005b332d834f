use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{Insertable, Queryable};
use serde::Serialize;
use shared::{ScheduleStatus, ServiceResult};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::fields)]
pub struct FieldRow {
    pub id: i32,
    pub uuid: Uuid,
    pub name: String,
    pub price_per_hour: BigDecimal,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// `diesel`'s `Queryable` derive expands to `use diesel::row::{Row, Field};`,
// which shadows a struct literally named `Field` and breaks the derive. The
// row type is therefore named `FieldRow`; `Field` stays its public name via
// this alias so every call site is unchanged.
pub use self::FieldRow as Field;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::fields)]
pub struct NewField {
    pub uuid: Uuid,
    pub name: String,
    pub price_per_hour: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::times)]
pub struct TimeWindow {
    pub id: i32,
    pub uuid: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::times)]
pub struct NewTimeWindow {
    pub uuid: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = crate::schema::field_schedules)]
pub struct FieldSchedule {
    pub id: i32,
    pub uuid: Uuid,
    pub field_id: i32,
    pub time_id: i32,
    pub date: NaiveDate,
    pub status: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FieldSchedule {
    pub fn status(&self) -> ServiceResult<ScheduleStatus> {
        ScheduleStatus::from_code(self.status)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::field_schedules)]
pub struct NewFieldSchedule {
    pub uuid: Uuid,
    pub field_id: i32,
    pub time_id: i32,
    pub date: NaiveDate,
    pub status: i32,
}

impl NewFieldSchedule {
    pub fn available(field_id: i32, time_id: i32, date: NaiveDate) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            field_id,
            time_id,
            date,
            status: ScheduleStatus::Available.code(),
        }
    }
}

/// A slot joined with the field and time window it belongs to; what the
/// store hands back for anything user-facing.
#[derive(Debug, Clone)]
pub struct SlotDetail {
    pub schedule: FieldSchedule,
    pub field: Field,
    pub window: TimeWindow,
}

impl SlotDetail {
    pub fn time_range(&self) -> String {
        format!(
            "{} - {}",
            self.window.start_time.format("%H:%M"),
            self.window.end_time.format("%H:%M")
        )
    }
}
