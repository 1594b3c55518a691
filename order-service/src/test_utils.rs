//! Test doubles shared across the unit test modules: an in-memory store that
//! honors the `OrderStore` contract and a loopback HTTP server that stands in
//! for the mail providers.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Router;
use bigdecimal::rounding::RoundingMode;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::assembler::{FullOrder, FullOrderLine};
use crate::error::StoreError;
use crate::models::{Order, OrderLine, Product};
use crate::store::{generate_order_number, LineInput, OrderStore};
use shared::{CustomerDetails, OrderStatus};

pub fn money(value: f64) -> BigDecimal {
    BigDecimal::try_from(value)
        .unwrap()
        .with_scale_round(2, RoundingMode::HalfUp)
}

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        address: "12 Analytical Row".into(),
        city: "London".into(),
        postal_code: "N1 9GU".into(),
        country: "GB".into(),
    }
}

pub fn line_input(price: f64, quantity: i32) -> LineInput {
    LineInput {
        product_id: Uuid::new_v4(),
        quantity,
        price: money(price),
    }
}

pub fn product(name: &str, price: f64) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.into(),
        price: money(price),
        image: None,
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

pub fn full_order() -> FullOrder {
    FullOrder {
        id: Uuid::new_v4(),
        order_number: "ORD-20260801-TESTAA".into(),
        customer: customer(),
        status: OrderStatus::Pending.as_str().to_string(),
        payment_reference: None,
        notified: false,
        total_amount: money(30.00),
        lines: vec![
            FullOrderLine {
                product_id: Uuid::new_v4(),
                name: "Enamel Camping Mug".into(),
                image: None,
                current_price: Some(money(12.50)),
                price: money(12.50),
                quantity: 2,
                line_total: money(25.00),
            },
            FullOrderLine {
                product_id: Uuid::new_v4(),
                name: "Field Notebook".into(),
                image: None,
                current_price: Some(money(5.00)),
                price: money(5.00),
                quantity: 1,
                line_total: money(5.00),
            },
        ],
        created_at: Some(Utc::now()),
    }
}

/// Polls `condition` until it holds or two seconds pass. Used to observe the
/// detached notification task without racing it.
pub async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    lines: Mutex<HashMap<Uuid, Vec<OrderLine>>>,
    products: Mutex<HashMap<Uuid, Product>>,
    fail_lines: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next line writes fail, so tests can drive the
    /// header-compensation path.
    pub fn fail_line_insert(&self) {
        self.fail_lines.store(true, Ordering::SeqCst);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id, product);
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn get_order_by_number(&self, order_number: &str) -> Option<Order> {
        self.orders
            .lock()
            .unwrap()
            .values()
            .find(|order| order.order_number == order_number)
            .cloned()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(
        &self,
        customer: &CustomerDetails,
        lines: &[LineInput],
        total_amount: BigDecimal,
    ) -> Result<Order, StoreError> {
        let now = Some(Utc::now());
        let order = Order {
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
            payment_reference: None,
            notified: false,
            created_at: now,
            updated_at: now,
        };
        self.orders.lock().unwrap().insert(order.id, order.clone());

        if self.fail_lines.load(Ordering::SeqCst) {
            // compensate the header write, mirroring the SQL rollback
            self.orders.lock().unwrap().remove(&order.id);
            return Err(StoreError::Persistence(
                diesel::result::Error::RollbackTransaction,
            ));
        }

        let rows: Vec<OrderLine> = lines
            .iter()
            .map(|line| OrderLine {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price.clone(),
                created_at: now,
            })
            .collect();
        self.lines.lock().unwrap().insert(order.id, rows);
        Ok(order)
    }

    async fn update_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        payment_reference: Option<String>,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound(order_id))?;
        order.status = status.as_str().to_string();
        if let Some(reference) = payment_reference {
            order.payment_reference = Some(reference);
        }
        order.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_notified(&self, order_id: Uuid) -> Result<(), StoreError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::NotFound(order_id))?;
        order.notified = true;
        order.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        self.orders
            .lock()
            .unwrap()
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::NotFound(order_id))
    }

    async fn load_lines(&self, order_id: Uuid) -> Result<Vec<OrderLine>, StoreError> {
        Ok(self
            .lines
            .lock()
            .unwrap()
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let products = self.products.lock().unwrap();
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }
}

#[derive(Clone)]
struct StubState {
    status: Arc<AtomicU16>,
    hits: Arc<AtomicUsize>,
    delay_ms: Arc<AtomicU64>,
}

async fn respond(State(state): State<StubState>) -> (StatusCode, String) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if status.is_success() {
        r#"{"id":"msg_stub_1"}"#.to_string()
    } else {
        r#"{"message":"upstream rejected the message"}"#.to_string()
    };
    (status, body)
}

/// Loopback HTTP server that answers every request with a configurable status
/// after a configurable delay. Points any provider adapter at localhost.
pub struct ProviderStub {
    pub base_url: String,
    status: Arc<AtomicU16>,
    hits: Arc<AtomicUsize>,
    delay_ms: Arc<AtomicU64>,
}

impl ProviderStub {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_provider_stub() -> ProviderStub {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let status = Arc::new(AtomicU16::new(200));
    let hits = Arc::new(AtomicUsize::new(0));
    let delay_ms = Arc::new(AtomicU64::new(0));
    let state = StubState {
        status: status.clone(),
        hits: hits.clone(),
        delay_ms: delay_ms.clone(),
    };

    let app = Router::new().fallback(respond).with_state(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ProviderStub {
        base_url,
        status,
        hits,
        delay_ms,
    }
}
