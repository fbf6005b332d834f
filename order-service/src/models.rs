use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use shared::{PaymentStatus, ServiceError, ServiceResult};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    AwaitingPayment,
    Paid,
    Expired,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Expired | Self::Failed)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "awaiting_payment" => Ok(Self::AwaitingPayment),
            "paid" => Ok(Self::Paid),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown order status {other:?}")),
        }
    }
}

impl From<PaymentStatus> for OrderStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Initial | PaymentStatus::Pending => Self::AwaitingPayment,
            PaymentStatus::Settled => Self::Paid,
            PaymentStatus::Expired => Self::Expired,
            PaymentStatus::Failed => Self::Failed,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ORD-<5-digit sequence>-<YYYYMMDD>`. The format is shared with stored
/// historical data and must not drift.
pub fn order_code(seq: i32, day: NaiveDate) -> String {
    format!("ORD-{:05}-{}", seq, day.format("%Y%m%d"))
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = crate::schema::orders)]
pub struct Order {
    pub id: i32,
    pub uuid: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub field_schedule_id: Uuid,
    pub amount: BigDecimal,
    pub date: NaiveDate,
    pub status: String,
    pub is_paid: bool,
    pub payment_link: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn status(&self) -> ServiceResult<OrderStatus> {
        self.status.parse().map_err(ServiceError::Persistence)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub uuid: Uuid,
    pub code: String,
    pub user_id: Uuid,
    pub field_schedule_id: Uuid,
    pub amount: BigDecimal,
    pub date: NaiveDate,
    pub status: String,
    pub is_paid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_code_is_zero_padded_with_the_compact_date() {
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(order_code(1, day), "ORD-00001-20240701");
        assert_eq!(order_code(42, day), "ORD-00042-20240701");
        assert_eq!(order_code(99_999, day), "ORD-99999-20240701");
    }

    #[test]
    fn settlement_statuses_map_onto_order_statuses() {
        assert_eq!(OrderStatus::from(PaymentStatus::Settled), OrderStatus::Paid);
        assert_eq!(
            OrderStatus::from(PaymentStatus::Expired),
            OrderStatus::Expired
        );
        assert_eq!(OrderStatus::from(PaymentStatus::Failed), OrderStatus::Failed);
        assert_eq!(
            OrderStatus::from(PaymentStatus::Pending),
            OrderStatus::AwaitingPayment
        );
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Created,
            OrderStatus::AwaitingPayment,
            OrderStatus::Paid,
            OrderStatus::Expired,
            OrderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
