use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use shared::{PageParams, PageResult, ServiceError, ServiceResult};
use tracing::info;
use uuid::Uuid;

use crate::models::*;
use crate::store::{BookingOutcome, ScheduleStore};

/// Days of schedule produced by one generation run, starting tomorrow.
const GENERATION_HORIZON_DAYS: i64 = 30;

pub struct ScheduleService<S> {
    store: S,
}

impl<S: ScheduleStore> ScheduleService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create_field(&self, name: String, price_per_hour: BigDecimal) -> ServiceResult<Field> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("field name must not be empty".into()));
        }
        self.store
            .create_field(NewField {
                uuid: Uuid::new_v4(),
                name,
                price_per_hour,
            })
            .await
    }

    pub async fn list_fields(&self) -> ServiceResult<Vec<Field>> {
        self.store.list_fields().await
    }

    pub async fn create_window(
        &self,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> ServiceResult<TimeWindow> {
        if end_time <= start_time {
            return Err(ServiceError::Validation(
                "end time must be after start time".into(),
            ));
        }
        self.store
            .create_window(NewTimeWindow {
                uuid: Uuid::new_v4(),
                start_time,
                end_time,
            })
            .await
    }

    pub async fn list_windows(&self) -> ServiceResult<Vec<TimeWindow>> {
        self.store.list_windows().await
    }

    /// Produces one slot per (day, time window) pair for the next
    /// [`GENERATION_HORIZON_DAYS`] days. All-or-nothing: if any target slot
    /// already exists nothing is written.
    pub async fn generate_one_month(&self, field_uuid: Uuid) -> ServiceResult<usize> {
        let start = Utc::now().date_naive() + Duration::days(1);
        self.generate_from(field_uuid, start).await
    }

    pub(crate) async fn generate_from(
        &self,
        field_uuid: Uuid,
        start: NaiveDate,
    ) -> ServiceResult<usize> {
        let field = self.store.find_field(field_uuid).await?;
        let windows = self.store.list_windows().await?;

        let mut slots =
            Vec::with_capacity(windows.len() * GENERATION_HORIZON_DAYS as usize);
        for offset in 0..GENERATION_HORIZON_DAYS {
            let date = start + Duration::days(offset);
            for window in &windows {
                if self
                    .store
                    .find_by_date_and_window(field.id, date, window.id)
                    .await?
                    .is_some()
                {
                    return Err(ServiceError::Conflict(
                        "field schedule already exists".into(),
                    ));
                }
                slots.push(NewFieldSchedule::available(field.id, window.id, date));
            }
        }

        if slots.is_empty() {
            return Ok(0);
        }

        let created = self.store.create_slots(slots).await?;
        info!(field = %field_uuid, created, "generated one month of schedules");
        Ok(created)
    }

    /// Creates slots for one field on one date, one per requested window.
    pub async fn create_schedules(
        &self,
        field_uuid: Uuid,
        date: NaiveDate,
        window_uuids: Vec<Uuid>,
    ) -> ServiceResult<usize> {
        let field = self.store.find_field(field_uuid).await?;

        let mut slots = Vec::with_capacity(window_uuids.len());
        for window_uuid in window_uuids {
            let window = self.store.find_window(window_uuid).await?;
            if self
                .store
                .find_by_date_and_window(field.id, date, window.id)
                .await?
                .is_some()
            {
                return Err(ServiceError::Conflict(
                    "field schedule already exists".into(),
                ));
            }
            slots.push(NewFieldSchedule::available(field.id, window.id, date));
        }

        if slots.is_empty() {
            return Ok(0);
        }
        self.store.create_slots(slots).await
    }

    pub async fn get_slot(&self, uuid: Uuid) -> ServiceResult<SlotDetail> {
        self.store.find_slot(uuid).await
    }

    pub async fn list_slots(
        &self,
        page: PageParams,
    ) -> ServiceResult<PageResult<SlotDetail>> {
        page.validate()?;
        let (slots, total) = self.store.list_slots(page).await?;
        Ok(PageResult::new(page, total, slots))
    }

    pub async fn list_for_booking(
        &self,
        field_uuid: Uuid,
        date: NaiveDate,
    ) -> ServiceResult<Vec<SlotDetail>> {
        let field = self.store.find_field(field_uuid).await?;
        self.store.list_by_field_and_date(field.id, date).await
    }

    /// Moves an existing slot to another (date, window), refusing to land on
    /// an occupied pair.
    pub async fn move_slot(
        &self,
        uuid: Uuid,
        date: NaiveDate,
        window_uuid: Uuid,
    ) -> ServiceResult<SlotDetail> {
        let slot = self.store.find_slot(uuid).await?;
        let window = self.store.find_window(window_uuid).await?;

        let unchanged = slot.schedule.date == date && slot.schedule.time_id == window.id;
        if !unchanged {
            if self
                .store
                .find_by_date_and_window(slot.schedule.field_id, date, window.id)
                .await?
                .is_some()
            {
                return Err(ServiceError::Conflict(
                    "field schedule already exists".into(),
                ));
            }
            self.store.move_slot(uuid, date, window.id).await?;
        }
        self.store.find_slot(uuid).await
    }

    /// The booking-confirmation step of the saga. Idempotent: marking an
    /// already-Booked slot reports `AlreadyBooked` rather than failing, so
    /// settlement redeliveries converge.
    pub async fn mark_booked(&self, uuid: Uuid) -> ServiceResult<BookingOutcome> {
        let outcome = self.store.mark_booked(uuid).await?;
        match outcome {
            BookingOutcome::Booked => info!(slot = %uuid, "slot booked"),
            BookingOutcome::AlreadyBooked => {
                info!(slot = %uuid, "slot already booked, treating as applied")
            }
        }
        Ok(outcome)
    }

    pub async fn delete_slot(&self, uuid: Uuid) -> ServiceResult<()> {
        self.store.find_slot(uuid).await?;
        self.store.delete_slot(uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::ScheduleStatus;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemState {
        fields: Vec<Field>,
        windows: Vec<TimeWindow>,
        slots: Vec<FieldSchedule>,
        next_id: i32,
    }

    #[derive(Default)]
    struct MemStore {
        state: Mutex<MemState>,
    }

    impl MemStore {
        fn next_id(state: &mut MemState) -> i32 {
            state.next_id += 1;
            state.next_id
        }

        fn detail(state: &MemState, schedule: FieldSchedule) -> SlotDetail {
            let field = state
                .fields
                .iter()
                .find(|f| f.id == schedule.field_id)
                .unwrap()
                .clone();
            let window = state
                .windows
                .iter()
                .find(|w| w.id == schedule.time_id)
                .unwrap()
                .clone();
            SlotDetail {
                schedule,
                field,
                window,
            }
        }
    }

    #[async_trait]
    impl ScheduleStore for MemStore {
        async fn create_field(&self, field: NewField) -> ServiceResult<Field> {
            let mut state = self.state.lock().unwrap();
            let id = Self::next_id(&mut state);
            let created = Field {
                id,
                uuid: field.uuid,
                name: field.name,
                price_per_hour: field.price_per_hour,
                created_at: None,
                updated_at: None,
            };
            state.fields.push(created.clone());
            Ok(created)
        }

        async fn list_fields(&self) -> ServiceResult<Vec<Field>> {
            Ok(self.state.lock().unwrap().fields.clone())
        }

        async fn find_field(&self, uuid: Uuid) -> ServiceResult<Field> {
            self.state
                .lock()
                .unwrap()
                .fields
                .iter()
                .find(|f| f.uuid == uuid)
                .cloned()
                .ok_or(ServiceError::NotFound("field"))
        }

        async fn create_window(&self, window: NewTimeWindow) -> ServiceResult<TimeWindow> {
            let mut state = self.state.lock().unwrap();
            let id = Self::next_id(&mut state);
            let created = TimeWindow {
                id,
                uuid: window.uuid,
                start_time: window.start_time,
                end_time: window.end_time,
                created_at: None,
                updated_at: None,
            };
            state.windows.push(created.clone());
            Ok(created)
        }

        async fn list_windows(&self) -> ServiceResult<Vec<TimeWindow>> {
            let mut windows = self.state.lock().unwrap().windows.clone();
            windows.sort_by_key(|w| w.start_time);
            Ok(windows)
        }

        async fn find_window(&self, uuid: Uuid) -> ServiceResult<TimeWindow> {
            self.state
                .lock()
                .unwrap()
                .windows
                .iter()
                .find(|w| w.uuid == uuid)
                .cloned()
                .ok_or(ServiceError::NotFound("time window"))
        }

        async fn find_by_date_and_window(
            &self,
            field_id: i32,
            date: NaiveDate,
            time_id: i32,
        ) -> ServiceResult<Option<FieldSchedule>> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .slots
                .iter()
                .find(|s| s.field_id == field_id && s.date == date && s.time_id == time_id)
                .cloned())
        }

        async fn create_slots(&self, slots: Vec<NewFieldSchedule>) -> ServiceResult<usize> {
            let mut state = self.state.lock().unwrap();
            for slot in &slots {
                if state
                    .slots
                    .iter()
                    .any(|s| s.field_id == slot.field_id && s.date == slot.date && s.time_id == slot.time_id)
                {
                    return Err(ServiceError::Conflict(
                        "field schedule already exists".into(),
                    ));
                }
            }
            let created = slots.len();
            for slot in slots {
                let id = Self::next_id(&mut state);
                state.slots.push(FieldSchedule {
                    id,
                    uuid: slot.uuid,
                    field_id: slot.field_id,
                    time_id: slot.time_id,
                    date: slot.date,
                    status: slot.status,
                    created_at: None,
                    updated_at: None,
                });
            }
            Ok(created)
        }

        async fn find_slot(&self, uuid: Uuid) -> ServiceResult<SlotDetail> {
            let state = self.state.lock().unwrap();
            let schedule = state
                .slots
                .iter()
                .find(|s| s.uuid == uuid)
                .cloned()
                .ok_or(ServiceError::NotFound("field schedule"))?;
            Ok(Self::detail(&state, schedule))
        }

        async fn list_slots(&self, page: PageParams) -> ServiceResult<(Vec<SlotDetail>, i64)> {
            let state = self.state.lock().unwrap();
            let total = state.slots.len() as i64;
            let slots = state
                .slots
                .iter()
                .skip(page.offset() as usize)
                .take(page.limit as usize)
                .cloned()
                .collect::<Vec<_>>()
                .into_iter()
                .map(|s| Self::detail(&state, s))
                .collect();
            Ok((slots, total))
        }

        async fn list_by_field_and_date(
            &self,
            field_id: i32,
            date: NaiveDate,
        ) -> ServiceResult<Vec<SlotDetail>> {
            let state = self.state.lock().unwrap();
            let mut slots: Vec<_> = state
                .slots
                .iter()
                .filter(|s| s.field_id == field_id && s.date == date)
                .cloned()
                .map(|s| Self::detail(&state, s))
                .collect();
            slots.sort_by_key(|s| s.window.start_time);
            Ok(slots)
        }

        async fn move_slot(
            &self,
            uuid: Uuid,
            date: NaiveDate,
            time_id: i32,
        ) -> ServiceResult<()> {
            let mut state = self.state.lock().unwrap();
            let slot = state
                .slots
                .iter_mut()
                .find(|s| s.uuid == uuid)
                .ok_or(ServiceError::NotFound("field schedule"))?;
            slot.date = date;
            slot.time_id = time_id;
            Ok(())
        }

        async fn mark_booked(&self, uuid: Uuid) -> ServiceResult<BookingOutcome> {
            let mut state = self.state.lock().unwrap();
            let slot = state
                .slots
                .iter_mut()
                .find(|s| s.uuid == uuid)
                .ok_or(ServiceError::NotFound("field schedule"))?;
            if slot.status == ScheduleStatus::Booked.code() {
                return Ok(BookingOutcome::AlreadyBooked);
            }
            slot.status = ScheduleStatus::Booked.code();
            Ok(BookingOutcome::Booked)
        }

        async fn delete_slot(&self, uuid: Uuid) -> ServiceResult<()> {
            let mut state = self.state.lock().unwrap();
            let before = state.slots.len();
            state.slots.retain(|s| s.uuid != uuid);
            if state.slots.len() == before {
                return Err(ServiceError::NotFound("field schedule"));
            }
            Ok(())
        }
    }

    fn price(value: i64) -> BigDecimal {
        BigDecimal::from(value)
    }

    fn window_time(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    async fn service_with_field_and_windows(
        window_hours: &[u32],
    ) -> (ScheduleService<MemStore>, Uuid) {
        let service = ScheduleService::new(MemStore::default());
        let field = service
            .create_field("Main Pitch".into(), price(250_000))
            .await
            .unwrap();
        for &hour in window_hours {
            service
                .create_window(window_time(hour), window_time(hour + 1))
                .await
                .unwrap();
        }
        (service, field.uuid)
    }

    fn start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    #[tokio::test]
    async fn a_month_with_three_windows_yields_ninety_available_slots() {
        let (service, field) = service_with_field_and_windows(&[8, 10, 12]).await;
        let created = service.generate_from(field, start_date()).await.unwrap();
        assert_eq!(created, 90);

        let day = service.list_for_booking(field, start_date()).await.unwrap();
        assert_eq!(day.len(), 3);
        assert!(day
            .iter()
            .all(|s| s.schedule.status().unwrap() == ScheduleStatus::Available));
    }

    #[tokio::test]
    async fn regenerating_the_same_month_conflicts_and_writes_nothing() {
        let (service, field) = service_with_field_and_windows(&[8, 10, 12]).await;
        service.generate_from(field, start_date()).await.unwrap();

        let err = service.generate_from(field, start_date()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let (_, total) = service
            .store
            .list_slots(PageParams { page: 1, limit: 1 })
            .await
            .unwrap();
        assert_eq!(total, 90);
    }

    #[tokio::test]
    async fn zero_windows_generates_zero_slots_without_error() {
        let (service, field) = service_with_field_and_windows(&[]).await;
        let created = service.generate_from(field, start_date()).await.unwrap();
        assert_eq!(created, 0);
    }

    #[tokio::test]
    async fn generating_for_an_unknown_field_is_not_found() {
        let (service, _) = service_with_field_and_windows(&[8]).await;
        let err = service
            .generate_from(Uuid::new_v4(), start_date())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("field")));
    }

    #[tokio::test]
    async fn explicit_create_refuses_an_occupied_pair() {
        let (service, field) = service_with_field_and_windows(&[8]).await;
        let windows = service.list_windows().await.unwrap();
        let date = start_date();

        service
            .create_schedules(field, date, vec![windows[0].uuid])
            .await
            .unwrap();
        let err = service
            .create_schedules(field, date, vec![windows[0].uuid])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn booking_is_a_one_way_idempotent_transition() {
        let (service, field) = service_with_field_and_windows(&[8]).await;
        service.generate_from(field, start_date()).await.unwrap();
        let slot = service.list_for_booking(field, start_date()).await.unwrap()[0]
            .schedule
            .uuid;

        assert_eq!(
            service.mark_booked(slot).await.unwrap(),
            BookingOutcome::Booked
        );
        assert_eq!(
            service.mark_booked(slot).await.unwrap(),
            BookingOutcome::AlreadyBooked
        );
        assert!(matches!(
            service.mark_booked(Uuid::new_v4()).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn booking_one_slot_leaves_the_other_eighty_nine_available() {
        let (service, field) = service_with_field_and_windows(&[8, 10, 12]).await;
        service.generate_from(field, start_date()).await.unwrap();
        let target = service.list_for_booking(field, start_date()).await.unwrap()[0]
            .schedule
            .uuid;

        service.mark_booked(target).await.unwrap();

        let (slots, total) = service
            .store
            .list_slots(PageParams {
                page: 1,
                limit: 100,
            })
            .await
            .unwrap();
        assert_eq!(total, 90);
        let booked: Vec<_> = slots
            .iter()
            .filter(|s| s.schedule.status().unwrap() == ScheduleStatus::Booked)
            .collect();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].schedule.uuid, target);
    }

    #[tokio::test]
    async fn booking_slots_are_ordered_by_window_start() {
        let (service, field) = service_with_field_and_windows(&[12, 8, 10]).await;
        service.generate_from(field, start_date()).await.unwrap();

        let day = service.list_for_booking(field, start_date()).await.unwrap();
        let hours: Vec<u32> = day
            .iter()
            .map(|s| {
                use chrono::Timelike;
                s.window.start_time.hour()
            })
            .collect();
        assert_eq!(hours, vec![8, 10, 12]);
    }

    #[tokio::test]
    async fn moving_a_slot_onto_an_occupied_pair_conflicts() {
        let (service, field) = service_with_field_and_windows(&[8, 10]).await;
        let windows = service.list_windows().await.unwrap();
        let date = start_date();
        service
            .create_schedules(field, date, vec![windows[0].uuid, windows[1].uuid])
            .await
            .unwrap();

        let day = service.list_for_booking(field, date).await.unwrap();
        let err = service
            .move_slot(day[0].schedule.uuid, date, windows[1].uuid)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
