use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{PageParams, PageResult, PaymentStatus, ServiceError, ServiceResult, SettlementEvent};
use tracing::info;
use uuid::Uuid;

use crate::models::{NewPayment, Payment, SettlementChangeset};
use crate::store::PaymentStore;

/// Notification body the gateway posts to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRequest {
    pub order_id: Uuid,
    pub transaction_status: String,
    pub transaction_id: Option<String>,
    pub transaction_time: Option<DateTime<Utc>>,
    pub bank: Option<String>,
    pub va_number: Option<String>,
    pub acquirer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub amount: BigDecimal,
    pub expired_at: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

fn map_gateway_status(transaction_status: &str) -> ServiceResult<PaymentStatus> {
    match transaction_status {
        "pending" => Ok(PaymentStatus::Pending),
        "settlement" | "capture" => Ok(PaymentStatus::Settled),
        "expire" => Ok(PaymentStatus::Expired),
        "deny" | "cancel" => Ok(PaymentStatus::Failed),
        other => Err(ServiceError::Validation(format!(
            "unknown transaction status {other:?}"
        ))),
    }
}

pub struct PaymentService<S> {
    store: S,
    link_base_url: String,
}

impl<S: PaymentStore> PaymentService<S> {
    pub fn new(store: S, link_base_url: String) -> Self {
        Self {
            store,
            link_base_url,
        }
    }

    /// Creates the payment record and mints its link. At most one payment
    /// that can still be paid exists per order.
    pub async fn create_payment(&self, request: CreatePaymentRequest) -> ServiceResult<Payment> {
        if request.amount <= BigDecimal::from(0) {
            return Err(ServiceError::Validation("amount must be positive".into()));
        }

        if let Some(existing) = self.store.find_by_order(request.order_id).await? {
            let status = existing.status()?;
            let lapsed = existing
                .expired_at
                .map(|at| at <= Utc::now())
                .unwrap_or(false);
            match status {
                PaymentStatus::Settled => {
                    return Err(ServiceError::Conflict("order is already paid".into()))
                }
                PaymentStatus::Initial | PaymentStatus::Pending if !lapsed => {
                    return Err(ServiceError::Conflict(
                        "an active payment already exists for this order".into(),
                    ))
                }
                _ => {}
            }
        }

        let uuid = Uuid::new_v4();
        let payment = self
            .store
            .create(NewPayment {
                uuid,
                order_id: request.order_id,
                amount: request.amount,
                payment_link: format!("{}/{}", self.link_base_url.trim_end_matches('/'), uuid),
                expired_at: request.expired_at,
                status: PaymentStatus::Initial.as_str().to_string(),
                description: request.description,
            })
            .await?;

        info!(payment = %payment.uuid, order = %payment.order_id, "payment link created");
        Ok(payment)
    }

    pub async fn get_payment(&self, uuid: Uuid) -> ServiceResult<Payment> {
        self.store.find_by_uuid(uuid).await
    }

    pub async fn list_payments(&self, page: PageParams) -> ServiceResult<PageResult<Payment>> {
        page.validate()?;
        let (payments, total) = self.store.list(page).await?;
        Ok(PageResult::new(page, total, payments))
    }

    /// Maps the gateway notification onto the local payment and enqueues
    /// exactly one settlement event per status change. Replays of an
    /// already-settled payment and repeats of the current status are
    /// no-ops.
    pub async fn webhook(&self, request: WebhookRequest) -> ServiceResult<Payment> {
        let status = map_gateway_status(&request.transaction_status)?;

        let payment = self
            .store
            .find_by_order(request.order_id)
            .await?
            .ok_or(ServiceError::NotFound("payment"))?;

        let current = payment.status()?;
        if current == PaymentStatus::Settled || current == status {
            info!(
                payment = %payment.uuid,
                status = %current,
                "webhook replay, nothing to apply"
            );
            return Ok(payment);
        }

        let changeset = SettlementChangeset {
            status: status.as_str().to_string(),
            transaction_id: request.transaction_id.clone(),
            paid_at: request.transaction_time,
            bank: request.bank.clone(),
            va_number: request.va_number.clone(),
            acquirer: request.acquirer.clone(),
        };
        let event = SettlementEvent {
            payment_id: payment.uuid,
            order_id: payment.order_id,
            status,
            transaction_id: request.transaction_id,
            paid_at: request.transaction_time,
            bank: request.bank,
            va_number: request.va_number,
            acquirer: request.acquirer,
        };

        let payment = self
            .store
            .apply_settlement(payment.uuid, changeset, &event)
            .await?;
        info!(payment = %payment.uuid, status = %status, "settlement applied");
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemState {
        payments: Vec<Payment>,
        outbox: Vec<SettlementEvent>,
        next_id: i32,
    }

    #[derive(Default)]
    struct MemPaymentStore {
        state: Mutex<MemState>,
    }

    impl MemPaymentStore {
        fn outbox(&self) -> Vec<SettlementEvent> {
            self.state.lock().unwrap().outbox.clone()
        }
    }

    #[async_trait]
    impl PaymentStore for MemPaymentStore {
        async fn create(&self, payment: NewPayment) -> ServiceResult<Payment> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let created = Payment {
                id: state.next_id,
                uuid: payment.uuid,
                order_id: payment.order_id,
                amount: payment.amount,
                payment_link: payment.payment_link,
                expired_at: payment.expired_at,
                status: payment.status,
                transaction_id: None,
                paid_at: None,
                bank: None,
                va_number: None,
                acquirer: None,
                description: payment.description,
                created_at: None,
                updated_at: None,
            };
            state.payments.push(created.clone());
            Ok(created)
        }

        async fn find_by_uuid(&self, uuid: Uuid) -> ServiceResult<Payment> {
            self.state
                .lock()
                .unwrap()
                .payments
                .iter()
                .find(|p| p.uuid == uuid)
                .cloned()
                .ok_or(ServiceError::NotFound("payment"))
        }

        async fn find_by_order(&self, order_id: Uuid) -> ServiceResult<Option<Payment>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .payments
                .iter()
                .filter(|p| p.order_id == order_id)
                .max_by_key(|p| p.id)
                .cloned())
        }

        async fn list(&self, page: PageParams) -> ServiceResult<(Vec<Payment>, i64)> {
            let state = self.state.lock().unwrap();
            let total = state.payments.len() as i64;
            let rows = state
                .payments
                .iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .cloned()
                .collect();
            Ok((rows, total))
        }

        async fn apply_settlement(
            &self,
            payment_uuid: Uuid,
            changeset: SettlementChangeset,
            event: &SettlementEvent,
        ) -> ServiceResult<Payment> {
            let mut state = self.state.lock().unwrap();
            let payment = state
                .payments
                .iter_mut()
                .find(|p| p.uuid == payment_uuid)
                .ok_or(ServiceError::NotFound("payment"))?;
            if payment.status != PaymentStatus::Settled.as_str() {
                payment.status = changeset.status;
                payment.transaction_id = changeset.transaction_id;
                payment.paid_at = changeset.paid_at;
                payment.bank = changeset.bank;
                payment.va_number = changeset.va_number;
                payment.acquirer = changeset.acquirer;
                let snapshot = payment.clone();
                state.outbox.push(event.clone());
                return Ok(snapshot);
            }
            Ok(payment.clone())
        }
    }

    fn service() -> PaymentService<MemPaymentStore> {
        PaymentService::new(MemPaymentStore::default(), "https://pay.example.com".into())
    }

    fn create_request(order_id: Uuid) -> CreatePaymentRequest {
        CreatePaymentRequest {
            order_id,
            amount: BigDecimal::from(250_000),
            expired_at: Some(Utc::now() + chrono::Duration::hours(2)),
            description: Some("field booking".into()),
        }
    }

    fn settled_webhook(order_id: Uuid) -> WebhookRequest {
        WebhookRequest {
            order_id,
            transaction_status: "settlement".into(),
            transaction_id: Some("txn-1".into()),
            transaction_time: Some(Utc::now()),
            bank: Some("bca".into()),
            va_number: Some("8888001".into()),
            acquirer: None,
        }
    }

    #[tokio::test]
    async fn settlement_webhook_updates_payment_and_publishes_one_event() {
        let service = service();
        let order_id = Uuid::new_v4();
        service.create_payment(create_request(order_id)).await.unwrap();

        let payment = service.webhook(settled_webhook(order_id)).await.unwrap();
        assert_eq!(payment.status().unwrap(), PaymentStatus::Settled);
        assert_eq!(payment.transaction_id.as_deref(), Some("txn-1"));

        let outbox = service.store.outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].order_id, order_id);
        assert_eq!(outbox[0].status, PaymentStatus::Settled);
    }

    #[tokio::test]
    async fn webhook_replay_of_a_settled_payment_publishes_nothing_new() {
        let service = service();
        let order_id = Uuid::new_v4();
        service.create_payment(create_request(order_id)).await.unwrap();

        service.webhook(settled_webhook(order_id)).await.unwrap();
        let replayed = service.webhook(settled_webhook(order_id)).await.unwrap();

        assert_eq!(replayed.status().unwrap(), PaymentStatus::Settled);
        assert_eq!(service.store.outbox().len(), 1);
    }

    #[tokio::test]
    async fn webhook_for_an_unknown_order_is_not_found_and_publishes_nothing() {
        let service = service();
        let err = service
            .webhook(settled_webhook(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("payment")));
        assert!(service.store.outbox().is_empty());
    }

    #[tokio::test]
    async fn each_status_change_publishes_exactly_one_event() {
        let service = service();
        let order_id = Uuid::new_v4();
        service.create_payment(create_request(order_id)).await.unwrap();

        let mut pending = settled_webhook(order_id);
        pending.transaction_status = "pending".into();
        service.webhook(pending.clone()).await.unwrap();
        // same status again: not a change
        service.webhook(pending).await.unwrap();
        service.webhook(settled_webhook(order_id)).await.unwrap();

        let statuses: Vec<PaymentStatus> =
            service.store.outbox().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![PaymentStatus::Pending, PaymentStatus::Settled]);
    }

    #[tokio::test]
    async fn unknown_gateway_status_is_a_validation_error() {
        let service = service();
        let order_id = Uuid::new_v4();
        service.create_payment(create_request(order_id)).await.unwrap();

        let mut request = settled_webhook(order_id);
        request.transaction_status = "refund".into();
        let err = service.webhook(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(service.store.outbox().is_empty());
    }

    #[tokio::test]
    async fn an_order_cannot_hold_two_active_payments() {
        let service = service();
        let order_id = Uuid::new_v4();
        service.create_payment(create_request(order_id)).await.unwrap();

        let err = service
            .create_payment(create_request(order_id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn a_lapsed_payment_can_be_replaced() {
        let service = service();
        let order_id = Uuid::new_v4();
        let mut request = create_request(order_id);
        request.expired_at = Some(Utc::now() - chrono::Duration::minutes(1));
        service.create_payment(request).await.unwrap();

        service.create_payment(create_request(order_id)).await.unwrap();
    }

    #[tokio::test]
    async fn a_settled_order_cannot_be_paid_again() {
        let service = service();
        let order_id = Uuid::new_v4();
        service.create_payment(create_request(order_id)).await.unwrap();
        service.webhook(settled_webhook(order_id)).await.unwrap();

        let err = service
            .create_payment(create_request(order_id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let service = service();
        let mut request = create_request(Uuid::new_v4());
        request.amount = BigDecimal::from(0);
        let err = service.create_payment(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn payment_links_carry_the_payment_uuid() {
        let service = service();
        let payment = service
            .create_payment(create_request(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(
            payment.payment_link,
            format!("https://pay.example.com/{}", payment.uuid)
        );
    }
}
