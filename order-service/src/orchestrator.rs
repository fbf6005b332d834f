use chrono::{Duration, Utc};
use shared::{
    PageParams, PageResult, PaymentStatus, ScheduleStatus, ServiceError, ServiceResult,
    SettlementEvent,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{FieldApi, PaymentApi};
use crate::models::{order_code, NewOrder, Order, OrderStatus};
use crate::store::OrderStore;

pub struct OrderService<S, F, P> {
    store: S,
    field: F,
    payment: P,
    payment_expiry: Duration,
}

impl<S, F, P> OrderService<S, F, P>
where
    S: OrderStore,
    F: FieldApi,
    P: PaymentApi,
{
    pub fn new(store: S, field: F, payment: P, payment_expiry: Duration) -> Self {
        Self {
            store,
            field,
            payment,
            payment_expiry,
        }
    }

    /// Books a slot into an order and requests its payment link. The slot is
    /// not marked Booked here; that happens only when the settlement event
    /// arrives. If the payment call fails the order stays AwaitingPayment
    /// with no link and the caller retries.
    pub async fn create_order(
        &self,
        user_id: Uuid,
        field_schedule_id: Uuid,
        bearer: Option<&str>,
    ) -> ServiceResult<Order> {
        let slot = self.field.get_slot(field_schedule_id, bearer).await?;

        // Primary conflict guard. Re-checked even when the caller listed
        // availability a moment ago; the storage-level CAS at settlement
        // closes the remaining race.
        if slot.status != ScheduleStatus::Available {
            return Err(ServiceError::Conflict(
                "field schedule is already booked".into(),
            ));
        }

        let today = Utc::now().date_naive();
        let seq = self.store.next_seq(today).await?;
        let order = self
            .store
            .create(NewOrder {
                uuid: Uuid::new_v4(),
                code: order_code(seq, today),
                user_id,
                field_schedule_id,
                amount: slot.price_per_hour.clone(),
                date: slot.date,
                status: OrderStatus::AwaitingPayment.as_str().to_string(),
                is_paid: false,
            })
            .await?;
        info!(order = %order.uuid, code = %order.code, "order created");

        let expired_at = Utc::now() + self.payment_expiry;
        let link = self
            .payment
            .create_payment_link(order.uuid, &order.amount, expired_at, Some(&order.code))
            .await?;
        self.store
            .set_payment_link(order.uuid, &link.payment_link)
            .await?;

        self.store.find_by_uuid(order.uuid).await
    }

    pub async fn get_order(&self, uuid: Uuid) -> ServiceResult<Order> {
        self.store.find_by_uuid(uuid).await
    }

    pub async fn list_orders(&self, page: PageParams) -> ServiceResult<PageResult<Order>> {
        page.validate()?;
        let (orders, total) = self.store.list(page).await?;
        Ok(PageResult::new(page, total, orders))
    }

    pub async fn list_orders_by_user(&self, user_id: Uuid) -> ServiceResult<Vec<Order>> {
        self.store.list_by_user(user_id).await
    }

    /// Applies one settlement event. Replays are no-ops; for a settled
    /// payment the slot is booked at the field service before the order
    /// moves, so a failure there leaves the order untouched and the
    /// redelivered event re-derives the same transition.
    pub async fn handle_settlement(&self, event: &SettlementEvent) -> ServiceResult<()> {
        let order = self.store.find_by_uuid(event.order_id).await?;
        let target = OrderStatus::from(event.status);
        let current = order.status()?;

        if current == target {
            info!(order = %order.uuid, status = %current, "settlement already applied");
            return Ok(());
        }
        if current.is_terminal() {
            warn!(
                order = %order.uuid,
                current = %current,
                incoming = %target,
                "ignoring settlement for terminal order"
            );
            return Ok(());
        }

        let settled = event.status == PaymentStatus::Settled;
        if settled {
            self.field.mark_booked(order.field_schedule_id).await?;
        }

        self.store.update_status(order.uuid, target, settled).await?;
        info!(order = %order.uuid, status = %target, "order settled");
        Ok(())
    }
}
