use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{NewOrder, OrderStore, Revision, StoreError};
use crate::domain::order::{
    CustomerSnapshot, Order, OrderItem, OrderStatus, OrderType, PaymentMethod, UnknownStatus,
};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// One row per order in `orders`, one row per line item in `order_items`
// (`position` keeps the item order). Every mutation is one transaction and
// still passes through the instance's FIFO write gate; the row lock taken by
// SELECT ... FOR UPDATE covers writers in other processes, and creates take
// a transaction-scoped advisory lock before reading the last ticket number.
// Reads run in one REPEATABLE READ snapshot so orders and items agree.
//
// ============================================================================

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        display_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        customer_name TEXT,
        customer_phone TEXT,
        order_type TEXT NOT NULL,
        customer_address TEXT,
        is_walk_in BOOLEAN NOT NULL,
        total_price NUMERIC NOT NULL,
        payment_method TEXT NOT NULL,
        is_paid BOOLEAN NOT NULL,
        assigned_to TEXT,
        is_priority BOOLEAN NOT NULL,
        special_instructions TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        oven_entered_at TIMESTAMPTZ,
        actual_ready_at TIMESTAMPTZ,
        completed_at TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS order_items (
        order_id UUID NOT NULL REFERENCES orders(id),
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        size TEXT NOT NULL,
        crust TEXT,
        price NUMERIC NOT NULL,
        quantity INTEGER NOT NULL,
        notes TEXT,
        toppings TEXT[] NOT NULL,
        PRIMARY KEY (order_id, position)
    )",
    // Widen price columns created by earlier schemas
    "ALTER TABLE orders ALTER COLUMN total_price TYPE NUMERIC",
    "ALTER TABLE order_items ALTER COLUMN price TYPE NUMERIC",
];

/// Advisory lock key serializing ticket number assignment across processes.
const TICKET_LOCK_KEY: i64 = 0x6b69_7463_6865_6e;

const SELECT_ITEMS: &str = "SELECT order_id, position, name, size, crust, price, quantity, notes, toppings
     FROM order_items";

const SELECT_ORDERS: &str = "SELECT id, display_id, status, customer_name, customer_phone, order_type,
        customer_address, is_walk_in, total_price, payment_method, is_paid, assigned_to,
        is_priority, special_instructions, created_at, updated_at, oven_entered_at,
        actual_ready_at, completed_at
     FROM orders";

pub struct PostgresOrderStore {
    pool: PgPool,
    write_gate: Mutex<()>,
}

impl PostgresOrderStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            write_gate: Mutex::new(()),
        }
    }

    /// Create tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Order tables ready");
        Ok(())
    }

    async fn snapshot(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let mut tx = self.snapshot().await?;

        let rows = sqlx::query(&format!("{} ORDER BY created_at, id", SELECT_ORDERS))
            .fetch_all(&mut *tx)
            .await?;
        let item_rows = sqlx::query(&format!("{} ORDER BY order_id, position", SELECT_ITEMS))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let (order_id, item) = item_from_row(row)?;
            items_by_order.entry(order_id).or_default().push(item);
        }

        rows.iter()
            .map(|row| {
                let record = OrderRecord::from_row(row)?;
                let items = items_by_order.remove(&record.id).unwrap_or_default();
                record.into_order(items)
            })
            .collect()
    }

    async fn load_one(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let mut tx = self.snapshot().await?;

        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_ORDERS))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query(&format!("{} WHERE order_id = $1 ORDER BY position", SELECT_ITEMS))
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let items = item_rows
            .iter()
            .map(|r| item_from_row(r).map(|(_, item)| item))
            .collect::<Result<Vec<_>, _>>()?;

        OrderRecord::from_row(&row)?.into_order(items).map(Some)
    }

    async fn write_existing(
        &self,
        order: Order,
        read: Option<Revision>,
    ) -> Result<Order, StoreError> {
        let _turn = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query("SELECT status, updated_at FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(order.id))?;

        let status: String = current.try_get("status")?;
        let stored = Revision {
            status: status
                .parse()
                .map_err(|e: UnknownStatus| StoreError::Corrupt(e.to_string()))?,
            updated_at: current.try_get("updated_at")?,
        };

        if let Some(read) = read {
            if stored != read {
                return Err(StoreError::Conflict {
                    order_id: order.id,
                    read,
                    stored,
                });
            }
        }

        let record = OrderRecord::from_order(&order);
        sqlx::query(
            "UPDATE orders SET display_id = $2, status = $3, customer_name = $4,
                customer_phone = $5, order_type = $6, customer_address = $7, is_walk_in = $8,
                total_price = $9, payment_method = $10, is_paid = $11, assigned_to = $12,
                is_priority = $13, special_instructions = $14, created_at = $15,
                updated_at = $16, oven_entered_at = $17, actual_ready_at = $18,
                completed_at = $19
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.display_id)
        .bind(&record.status)
        .bind(&record.customer_name)
        .bind(&record.customer_phone)
        .bind(&record.order_type)
        .bind(&record.customer_address)
        .bind(record.is_walk_in)
        .bind(record.total_price)
        .bind(&record.payment_method)
        .bind(record.is_paid)
        .bind(&record.assigned_to)
        .bind(record.is_priority)
        .bind(&record.special_instructions)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.oven_entered_at)
        .bind(record.actual_ready_at)
        .bind(record.completed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, order.id, &order.items).await?;

        tx.commit().await?;
        Ok(order)
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    items: &[OrderItem],
) -> Result<(), StoreError> {
    for (position, item) in items.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| StoreError::OutOfRange(format!("item position {}", position)))?;
        sqlx::query(
            "INSERT INTO order_items
                (order_id, position, name, size, crust, price, quantity, notes, toppings)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order_id)
        .bind(position)
        .bind(&item.name)
        .bind(&item.size)
        .bind(&item.crust)
        .bind(item.price)
        .bind(quantity_column(item)?)
        .bind(&item.notes)
        .bind(item.toppings.iter().cloned().collect::<Vec<String>>())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn quantity_column(item: &OrderItem) -> Result<i32, StoreError> {
    i32::try_from(item.quantity).map_err(|_| {
        StoreError::OutOfRange(format!("quantity {} of '{}'", item.quantity, item.name))
    })
}

/// Plain insert of a new order and its items inside `tx`.
async fn insert_order(
    tx: &mut Transaction<'_, Postgres>,
    order: &Order,
) -> Result<(), StoreError> {
    let record = OrderRecord::from_order(order);
    let inserted = sqlx::query(
        "INSERT INTO orders (id, display_id, status, customer_name, customer_phone,
            order_type, customer_address, is_walk_in, total_price, payment_method, is_paid,
            assigned_to, is_priority, special_instructions, created_at, updated_at,
            oven_entered_at, actual_ready_at, completed_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(record.id)
    .bind(record.display_id)
    .bind(&record.status)
    .bind(&record.customer_name)
    .bind(&record.customer_phone)
    .bind(&record.order_type)
    .bind(&record.customer_address)
    .bind(record.is_walk_in)
    .bind(record.total_price)
    .bind(&record.payment_method)
    .bind(record.is_paid)
    .bind(&record.assigned_to)
    .bind(record.is_priority)
    .bind(&record.special_instructions)
    .bind(record.created_at)
    .bind(record.updated_at)
    .bind(record.oven_entered_at)
    .bind(record.actual_ready_at)
    .bind(record.completed_at)
    .execute(&mut **tx)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(StoreError::AlreadyExists(order.id));
    }

    insert_items(tx, order.id, &order.items).await
}

fn item_from_row(row: &PgRow) -> Result<(Uuid, OrderItem), StoreError> {
    let order_id: Uuid = row.try_get("order_id")?;
    let quantity: i32 = row.try_get("quantity")?;
    let toppings: Vec<String> = row.try_get("toppings")?;

    let item = OrderItem {
        name: row.try_get("name")?,
        size: row.try_get("size")?,
        crust: row.try_get("crust")?,
        price: row.try_get("price")?,
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("negative quantity {}", quantity)))?,
        notes: row.try_get("notes")?,
        toppings: toppings.into_iter().collect(),
    };
    Ok((order_id, item))
}

/// Flat column view of an order, as stored in the `orders` table.
#[derive(Debug, Clone, PartialEq)]
struct OrderRecord {
    id: Uuid,
    display_id: i32,
    status: String,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    order_type: String,
    customer_address: Option<String>,
    is_walk_in: bool,
    total_price: Decimal,
    payment_method: String,
    is_paid: bool,
    assigned_to: Option<String>,
    is_priority: bool,
    special_instructions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    oven_entered_at: Option<DateTime<Utc>>,
    actual_ready_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    fn from_order(order: &Order) -> Self {
        let customer = &order.customer_snapshot;
        Self {
            id: order.id,
            display_id: order.display_id as i32,
            status: order.status.as_str().to_string(),
            customer_name: customer.name.clone(),
            customer_phone: customer.phone.clone(),
            order_type: customer.order_type.as_str().to_string(),
            customer_address: customer.address.clone(),
            is_walk_in: customer.is_walk_in,
            total_price: order.total_price,
            payment_method: order.payment_method.as_str().to_string(),
            is_paid: order.is_paid,
            assigned_to: order.assigned_to.clone(),
            is_priority: order.is_priority,
            special_instructions: order.special_instructions.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            oven_entered_at: order.oven_entered_at,
            actual_ready_at: order.actual_ready_at,
            completed_at: order.completed_at,
        }
    }

    fn from_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.try_get("id")?,
            display_id: row.try_get("display_id")?,
            status: row.try_get("status")?,
            customer_name: row.try_get("customer_name")?,
            customer_phone: row.try_get("customer_phone")?,
            order_type: row.try_get("order_type")?,
            customer_address: row.try_get("customer_address")?,
            is_walk_in: row.try_get("is_walk_in")?,
            total_price: row.try_get("total_price")?,
            payment_method: row.try_get("payment_method")?,
            is_paid: row.try_get("is_paid")?,
            assigned_to: row.try_get("assigned_to")?,
            is_priority: row.try_get("is_priority")?,
            special_instructions: row.try_get("special_instructions")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            oven_entered_at: row.try_get("oven_entered_at")?,
            actual_ready_at: row.try_get("actual_ready_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        let corrupt = |field: &str, value: &str| {
            StoreError::Corrupt(format!("order {}: bad {} {:?}", self.id, field, value))
        };

        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|_| corrupt("status", &self.status))?;
        let order_type: OrderType = self
            .order_type
            .parse()
            .map_err(|_| corrupt("order_type", &self.order_type))?;
        let payment_method: PaymentMethod = self
            .payment_method
            .parse()
            .map_err(|_| corrupt("payment_method", &self.payment_method))?;
        let display_id = u32::try_from(self.display_id)
            .map_err(|_| corrupt("display_id", &self.display_id.to_string()))?;

        Ok(Order {
            id: self.id,
            display_id,
            status,
            customer_snapshot: CustomerSnapshot {
                name: self.customer_name,
                phone: self.customer_phone,
                order_type,
                address: self.customer_address,
                is_walk_in: self.is_walk_in,
            },
            items,
            total_price: self.total_price,
            payment_method,
            is_paid: self.is_paid,
            assigned_to: self.assigned_to,
            is_priority: self.is_priority,
            special_instructions: self.special_instructions,
            created_at: self.created_at,
            updated_at: self.updated_at,
            oven_entered_at: self.oven_entered_at,
            actual_ready_at: self.actual_ready_at,
            completed_at: self.completed_at,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn get_all(&self) -> Vec<Order> {
        match self.load_all().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load orders, serving empty collection");
                Vec::new()
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Option<Order> {
        match self.load_one(id).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Failed to load order");
                None
            }
        }
    }

    async fn create(&self, order: Order) -> Result<Order, StoreError> {
        let _turn = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;
        insert_order(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn create_next(&self, build: NewOrder) -> Result<Order, StoreError> {
        let _turn = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(TICKET_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        let last: Option<i32> = sqlx::query_scalar(
            "SELECT display_id FROM orders ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        let last = u32::try_from(last.unwrap_or(0))
            .map_err(|_| StoreError::Corrupt(format!("negative display_id {:?}", last)))?;

        let order = build(last);
        insert_order(&mut tx, &order).await?;
        tx.commit().await?;

        Ok(order)
    }

    async fn update(&self, order: Order) -> Result<Order, StoreError> {
        self.write_existing(order, None).await
    }

    async fn compare_and_update(&self, order: Order, read: Revision) -> Result<Order, StoreError> {
        self.write_existing(order, Some(read)).await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;

    #[test]
    fn test_record_maps_enums_to_wire_names() {
        let mut order = sample_order(OrderStatus::Oven);
        order.payment_method = PaymentMethod::PayAtRegister;

        let record = OrderRecord::from_order(&order);
        assert_eq!(record.status, "OVEN");
        assert_eq!(record.order_type, "PICKUP");
        assert_eq!(record.payment_method, "PAY_AT_REGISTER");
    }

    #[test]
    fn test_record_restores_order_with_items() {
        let order = sample_order(OrderStatus::Ready);
        let record = OrderRecord::from_order(&order);

        let restored = record.into_order(order.items.clone()).unwrap();
        assert_eq!(restored, order);
    }

    #[test]
    fn test_quantity_beyond_column_range_is_rejected() {
        let mut item = sample_order(OrderStatus::New).items.remove(0);
        assert_eq!(quantity_column(&item).unwrap(), item.quantity as i32);

        item.quantity = u32::MAX;
        let err = quantity_column(&item).unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange(msg) if msg.contains("4294967295")));
    }

    #[test]
    fn test_record_keeps_price_precision() {
        let mut order = sample_order(OrderStatus::New);
        order.total_price = rust_decimal_macros::dec!(12.345);

        let restored = OrderRecord::from_order(&order)
            .into_order(order.items.clone())
            .unwrap();
        assert_eq!(restored.total_price, rust_decimal_macros::dec!(12.345));
    }

    #[test]
    fn test_unknown_status_column_is_corrupt() {
        let mut record = OrderRecord::from_order(&sample_order(OrderStatus::New));
        record.status = "BAKING".to_string();

        let err = record.into_order(vec![]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(msg) if msg.contains("BAKING")));
    }
}
