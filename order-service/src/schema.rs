diesel::table! {
    orders (id) {
        id -> Uuid,
        order_number -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        address -> Varchar,
        city -> Varchar,
        postal_code -> Varchar,
        country -> Varchar,
        total_amount -> Numeric,
        status -> Varchar,
        payment_reference -> Nullable<Varchar>,
        notified -> Bool,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    order_lines (id) {
        id -> Uuid,
        order_id -> Uuid,
        product_id -> Uuid,
        quantity -> Int4,
        price -> Numeric,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        price -> Numeric,
        image -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(order_lines -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(orders, order_lines, products);
