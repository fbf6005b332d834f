diesel::table! {
    fields (id) {
        id -> Int4,
        uuid -> Uuid,
        name -> Varchar,
        price_per_hour -> Numeric,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    times (id) {
        id -> Int4,
        uuid -> Uuid,
        start_time -> Time,
        end_time -> Time,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    field_schedules (id) {
        id -> Int4,
        uuid -> Uuid,
        field_id -> Int4,
        time_id -> Int4,
        date -> Date,
        status -> Int4,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(field_schedules -> fields (field_id));
diesel::joinable!(field_schedules -> times (time_id));

diesel::allow_tables_to_appear_in_same_query!(fields, times, field_schedules,);
