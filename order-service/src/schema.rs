diesel::table! {
    orders (id) {
        id -> Int4,
        uuid -> Uuid,
        code -> Varchar,
        user_id -> Uuid,
        field_schedule_id -> Uuid,
        amount -> Numeric,
        date -> Date,
        status -> Varchar,
        is_paid -> Bool,
        payment_link -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    order_counters (day) {
        day -> Date,
        last_seq -> Int4,
    }
}

diesel::allow_tables_to_appear_in_same_query!(orders, order_counters,);
