diesel::table! {
    payments (id) {
        id -> Int4,
        uuid -> Uuid,
        order_id -> Uuid,
        amount -> Numeric,
        payment_link -> Varchar,
        expired_at -> Nullable<Timestamptz>,
        status -> Varchar,
        transaction_id -> Nullable<Varchar>,
        paid_at -> Nullable<Timestamptz>,
        bank -> Nullable<Varchar>,
        va_number -> Nullable<Varchar>,
        acquirer -> Nullable<Varchar>,
        description -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    outbox_events (id) {
        id -> Uuid,
        aggregate_id -> Uuid,
        event_type -> Varchar,
        event_data -> Jsonb,
        processed -> Nullable<Bool>,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(payments, outbox_events,);
