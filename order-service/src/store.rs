use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::*;
use crate::schema::*;
use shared::{CustomerDetails, OrderStatus};

pub type DbPool = Pool<AsyncPgConnection>;

/// Every storage call is bounded so a stalled database can never wedge a
/// request handler or a notification task.
const STORAGE_DEADLINE: Duration = Duration::from_secs(10);

/// One order line as submitted at checkout, already validated and priced.
#[derive(Debug, Clone)]
pub struct LineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: BigDecimal,
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Persists the order header and all of its lines atomically. Either the
    /// whole order exists afterwards or none of it does.
    async fn create_order(
        &self,
        customer: &CustomerDetails,
        lines: &[LineInput],
        total_amount: BigDecimal,
    ) -> Result<Order, StoreError>;

    /// Overwrites the stored status. `payment_reference` is only written when
    /// provided; `None` leaves the stored value untouched.
    async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        payment_reference: Option<String>,
    ) -> Result<(), StoreError>;

    /// Flips the one-way notified flag. Re-marking an already notified order
    /// is a no-op, not an error.
    async fn mark_notified(&self, order_id: Uuid) -> Result<(), StoreError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError>;

    async fn load_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError>;

    async fn load_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError>;
}

/// Human-readable order reference, e.g. `ORD-20260822-K7KQ2M`. The suffix
/// alphabet drops 0/O and 1/I so the number survives being read over the
/// phone; the unique index on the column catches the rare collision.
pub fn generate_order_number() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

async fn with_deadline<T, F>(operation: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(STORAGE_DEADLINE, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(format!(
            "storage call exceeded {:?}",
            STORAGE_DEADLINE
        ))),
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: DbPool,
}

impl PgOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(
        &self,
        customer: &CustomerDetails,
        lines: &[LineInput],
        total_amount: BigDecimal,
    ) -> Result<Order, StoreError> {
        let new_order = NewOrder {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            address: customer.address.clone(),
            city: customer.city.clone(),
            postal_code: customer.postal_code.clone(),
            country: customer.country.clone(),
            total_amount,
            status: OrderStatus::Pending.as_str().to_string(),
            notified: false,
        };
        let new_lines: Vec<NewOrderLine> = lines
            .iter()
            .map(|line| NewOrderLine {
                id: Uuid::new_v4(),
                order_id: new_order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price.clone(),
            })
            .collect();

        with_deadline(async {
            let mut conn = self.pool.get().await?;
            let order = conn
                .transaction::<_, diesel::result::Error, _>(|conn| {
                    Box::pin(async move {
                        let order: Order = diesel::insert_into(orders::table)
                            .values(&new_order)
                            .get_result(conn)
                            .await?;
                        diesel::insert_into(order_lines::table)
                            .values(&new_lines)
                            .execute(conn)
                            .await?;
                        Ok(order)
                    })
                })
                .await?;
            Ok(order)
        })
        .await
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        payment_reference: Option<String>,
    ) -> Result<(), StoreError> {
        let change = OrderStatusChange {
            status: status.as_str().to_string(),
            payment_reference,
            updated_at: Some(Utc::now()),
        };
        with_deadline(async {
            let mut conn = self.pool.get().await?;
            let updated = diesel::update(orders::table.filter(orders::id.eq(order_id)))
                .set(&change)
                .execute(&mut conn)
                .await?;
            if updated == 0 {
                return Err(StoreError::NotFound(order_id));
            }
            Ok(())
        })
        .await
    }

    async fn mark_notified(&self, order_id: Uuid) -> Result<(), StoreError> {
        with_deadline(async {
            let mut conn = self.pool.get().await?;
            let updated = diesel::update(orders::table.filter(orders::id.eq(order_id)))
                .set((
                    orders::notified.eq(true),
                    orders::updated_at.eq(Some(Utc::now())),
                ))
                .execute(&mut conn)
                .await?;
            if updated == 0 {
                return Err(StoreError::NotFound(order_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        with_deadline(async {
            let mut conn = self.pool.get().await?;
            let order = orders::table
                .filter(orders::id.eq(order_id))
                .first::<Order>(&mut conn)
                .await
                .optional()?;
            order.ok_or(StoreError::NotFound(order_id))
        })
        .await
    }

    async fn load_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError> {
        with_deadline(async {
            let mut conn = self.pool.get().await?;
            let lines = order_lines::table
                .filter(order_lines::order_id.eq(order_id))
                .order(order_lines::created_at.asc())
                .load::<OrderLine>(&mut conn)
                .await?;
            Ok(lines)
        })
        .await
    }

    async fn load_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        with_deadline(async {
            let mut conn = self.pool.get().await?;
            let rows = products::table
                .filter(products::id.eq_any(ids))
                .load::<Product>(&mut conn)
                .await?;
            Ok(rows)
        })
        .await
    }
}
