use async_trait::async_trait;
use chrono::{DateTime, Utc};
use examshop_catalog::PaperId;
use examshop_order::{
    DownloadRecord, DownloadRepository, NewDownload, NewOrder, NewPaymentRecord, Order, OrderItem, OrderRepository,
    OrderStatus, PaymentRecord, RepositoryError,
};
use examshop_shared::Masked;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::is_unique_violation;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, paper_id, title, price, quantity FROM order_items WHERE order_id = $1 ORDER BY paper_id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(OrderItem::try_from).collect()
    }

    async fn hydrate(&self, row: OrderRow) -> Result<Order, RepositoryError> {
        let items = self.load_items(row.id).await?;
        row.into_order(items)
    }
}

const ORDER_COLUMNS: &str =
    "id, reference, user_id, email, phone, total_amount, status, transaction_id, created_at, verified_at";

const PAYMENT_COLUMNS: &str =
    "id, reference, paper_id, email, phone, amount_paid, payment_method, transaction_id, verified, created_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    reference: String,
    user_id: Option<String>,
    email: String,
    phone: String,
    total_amount: Decimal,
    status: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| RepositoryError::Backend(format!("unknown order status {}", self.status)))?;
        Ok(Order {
            id: self.id,
            reference: self.reference,
            user_id: self.user_id,
            email: Masked(self.email),
            phone: Masked(self.phone),
            total_amount: self.total_amount,
            status,
            transaction_id: self.transaction_id,
            items,
            created_at: self.created_at,
            verified_at: self.verified_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    paper_id: i64,
    title: String,
    price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity)
            .map_err(|_| RepositoryError::Backend(format!("negative quantity on item {}", row.id)))?;
        Ok(OrderItem {
            id: row.id,
            order_id: row.order_id,
            paper_id: PaperId(row.paper_id),
            title: row.title,
            price: row.price,
            quantity,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    reference: String,
    paper_id: i64,
    email: String,
    phone: String,
    amount_paid: Option<Decimal>,
    payment_method: String,
    transaction_id: Option<String>,
    verified: bool,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        PaymentRecord {
            id: row.id,
            reference: row.reference,
            paper_id: PaperId(row.paper_id),
            email: Masked(row.email),
            phone: Masked(row.phone),
            amount_paid: row.amount_paid,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            verified: row.verified,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DownloadRow {
    id: Uuid,
    paper_id: i64,
    order_reference: Option<String>,
    payment_reference: Option<String>,
    email: Option<String>,
    ip_address: Option<String>,
    user_agent: String,
    downloaded_at: DateTime<Utc>,
}

impl From<DownloadRow> for DownloadRecord {
    fn from(row: DownloadRow) -> Self {
        DownloadRecord {
            id: row.id,
            paper_id: PaperId(row.paper_id),
            order_reference: row.order_reference,
            payment_reference: row.payment_reference,
            email: row.email.map(Masked),
            ip_address: row.ip_address.and_then(|ip| ip.parse().ok()),
            user_agent: row.user_agent,
            downloaded_at: row.downloaded_at,
        }
    }
}

fn backend(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

/// Unique violations on insert mean the reference was claimed by another
/// writer.
fn insert_error(reference: &str, e: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&e) {
        RepositoryError::DuplicateReference(reference.to_string())
    } else {
        backend(e)
    }
}

/// Claims `reference` in the namespace shared by `orders` and `payments`.
/// A second claim fails with `DuplicateReference` whichever table it is for.
async fn claim_reference(
    tx: &mut Transaction<'_, Postgres>,
    reference: &str,
    kind: &str,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO purchase_references (reference, kind) VALUES ($1, $2)")
        .bind(reference)
        .bind(kind)
        .execute(&mut **tx)
        .await
        .map_err(|e| insert_error(reference, e))?;
    Ok(())
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    order: &NewOrder,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let quantity = i32::try_from(item.quantity)
            .map_err(|_| RepositoryError::Backend(format!("quantity {} out of range", item.quantity)))?;
        let row = sqlx::query_as::<_, OrderItemRow>(
            r#"
            INSERT INTO order_items (id, order_id, paper_id, title, price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, paper_id, title, price, quantity
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(item.paper_id.0)
        .bind(&item.title)
        .bind(item.price)
        .bind(quantity)
        .fetch_one(&mut **tx)
        .await
        .map_err(backend)?;
        items.push(OrderItem::try_from(row)?);
    }
    Ok(items)
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn reference_exists(&self, reference: &str) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM purchase_references WHERE reference = $1)")
        .bind(reference)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        claim_reference(&mut tx, &order.reference, "order").await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (id, reference, user_id, email, phone, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&order.reference)
        .bind(&order.user_id)
        .bind(order.email.expose())
        .bind(order.phone.expose())
        .bind(order.total_amount)
        .bind(OrderStatus::Created.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(&order.reference, e))?;

        let items = insert_items(&mut tx, row.id, &order).await?;
        tx.commit().await.map_err(backend)?;

        row.into_order(items)
    }

    async fn find_order(&self, reference: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE reference = $1", ORDER_COLUMNS))
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn mark_awaiting_payment(&self, reference: &str) -> Result<Order, RepositoryError> {
        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders SET status = $2
            WHERE reference = $1 AND status IN ($2, $3)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(reference)
        .bind(OrderStatus::AwaitingPayment.as_str())
        .bind(OrderStatus::Created.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = updated {
            return self.hydrate(row).await;
        }

        match self.find_order(reference).await? {
            Some(order) => Err(RepositoryError::InvalidTransition {
                reference: reference.to_string(),
                from: order.status,
                to: OrderStatus::AwaitingPayment,
            }),
            None => Err(RepositoryError::NotFound(reference.to_string())),
        }
    }

    async fn mark_verified(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET status = $2, verified_at = NOW(), transaction_id = COALESCE($3, transaction_id)
            WHERE reference = $1 AND status <> $2
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(reference)
        .bind(OrderStatus::Verified.as_str())
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match updated {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn create_payment_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        claim_reference(&mut tx, &record.reference, "payment").await?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (id, reference, paper_id, email, phone, amount_paid, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&record.reference)
        .bind(record.paper_id.0)
        .bind(record.email.expose())
        .bind(record.phone.expose())
        .bind(record.amount_paid)
        .bind(&record.payment_method)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(&record.reference, e))?;
        tx.commit().await.map_err(backend)?;

        Ok(PaymentRecord::from(row))
    }

    async fn find_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE reference = $1",
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(PaymentRecord::from))
    }

    async fn mark_payment_verified(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
        amount_paid: Option<Decimal>,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments
            SET verified = TRUE,
                transaction_id = COALESCE($2, transaction_id),
                amount_paid = COALESCE($3, amount_paid)
            WHERE reference = $1 AND NOT verified
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .bind(transaction_id)
        .bind(amount_paid)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(PaymentRecord::from))
    }
}

#[async_trait]
impl DownloadRepository for PgOrderRepository {
    async fn record_download(&self, download: NewDownload) -> Result<DownloadRecord, RepositoryError> {
        let row = sqlx::query_as::<_, DownloadRow>(
            r#"
            INSERT INTO downloads (id, paper_id, order_reference, payment_reference, email, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, paper_id, order_reference, payment_reference, email, ip_address, user_agent, downloaded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(download.paper_id.0)
        .bind(&download.order_reference)
        .bind(&download.payment_reference)
        .bind(download.email.as_ref().map(|email| email.expose().clone()))
        .bind(download.ip_address.map(|ip| ip.to_string()))
        .bind(&download.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(DownloadRecord::from(row))
    }

    async fn count_downloads(&self) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM downloads")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)
    }
}
