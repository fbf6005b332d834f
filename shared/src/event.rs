use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default topic the payment service publishes settlement events to.
pub const SETTLEMENT_TOPIC: &str = "payment-service-callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initial,
    Pending,
    Settled,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Pending => "pending",
            Self::Settled => "settled",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// A settled payment never changes again; expiry and failure are final
    /// for that payment record as well.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Expired | Self::Failed)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "pending" => Ok(Self::Pending),
            "settled" => Ok(Self::Settled),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status {other:?}")),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published by the payment service once per payment-status change and
/// consumed by the order service. Keyed by `order_id` on the wire; carried
/// metadata is whatever the gateway reported at settlement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub bank: Option<String>,
    pub va_number: Option<String>,
    pub acquirer: Option<String>,
}

impl SettlementEvent {
    /// Partition key: all events for one order land on one partition so a
    /// single order's settlement history is consumed in order.
    pub fn key(&self) -> String {
        self.order_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_json() {
        let event = SettlementEvent {
            payment_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            status: PaymentStatus::Settled,
            transaction_id: Some("txn-123".into()),
            paid_at: Some(Utc::now()),
            bank: Some("bca".into()),
            va_number: None,
            acquirer: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        let decoded: SettlementEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.order_id, event.order_id);
        assert_eq!(decoded.status, PaymentStatus::Settled);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Settled).unwrap(),
            "\"settled\""
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(PaymentStatus::Settled.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
    }
}
