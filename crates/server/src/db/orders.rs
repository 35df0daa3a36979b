//! Orders and their line items.
//!
//! An order groups the items of one checkout. Each item belongs to exactly one
//! seller and moves through the fulfillment workflow on its own; the order's
//! status is recomputed from its items after every change.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use bazaar_core::{
    ItemStatus, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId, workflow,
};

use super::{PAGE_SIZE, RepositoryError, page_offset};

const ORDER_COLUMNS: &str = "id, reference, buyer_id, seller_ids, status, subtotal, \
     shipping_address, note, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, seller_id, title, unit_price, quantity, \
     status, tracking_number, updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub reference: String,
    pub buyer_id: UserId,
    pub seller_ids: Vec<UserId>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub shipping_address: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub status: ItemStatus,
    pub tracking_number: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// An order with (a subset of) its items.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// One line of an order about to be placed.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// An order about to be placed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub reference: String,
    pub buyer_id: UserId,
    pub seller_ids: Vec<UserId>,
    pub subtotal: Money,
    pub shipping_address: String,
    pub note: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// Who is changing an item's status.
#[derive(Debug, Clone, Copy)]
pub enum Fulfiller {
    Seller(UserId),
    Admin,
}

/// Item counts and revenue for the seller dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct SellerSales {
    pub items_by_status: HashMap<ItemStatus, i64>,
    /// Value of items not cancelled.
    pub revenue: Money,
}

/// Platform-wide order totals for the admin dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderTotals {
    pub orders: i64,
    pub gross: Money,
}

fn quantity_param(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity).map_err(|_| RepositoryError::Conflict("quantity is too large".into()))
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order in one transaction.
    ///
    /// Stock is decremented with a conditional update, so two buyers racing
    /// for the last unit cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming the first line whose product
    /// is no longer active or lacks stock; nothing is written in that case.
    pub async fn create(&self, new: &NewOrder) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for line in &new.lines {
            let updated = sqlx::query(
                "UPDATE product SET stock = stock - $2, updated_at = NOW() \
                 WHERE id = $1 AND status = 'active' AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(quantity_param(line.quantity)?)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(RepositoryError::Conflict(format!(
                    "\"{}\" is no longer available in the requested quantity",
                    line.title
                )));
            }
        }

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO customer_order (reference, buyer_id, seller_ids, subtotal, \
                shipping_address, note) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&new.reference)
        .bind(new.buyer_id)
        .bind(&new.seller_ids)
        .bind(new.subtotal)
        .bind(&new.shipping_address)
        .bind(new.note.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "order reference collision, please retry"))?;

        let mut items = Vec::with_capacity(new.lines.len());
        for line in &new.lines {
            let item = sqlx::query_as::<_, OrderItem>(&format!(
                "INSERT INTO order_item (order_id, product_id, seller_id, title, unit_price, \
                    quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ITEM_COLUMNS}"
            ))
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.seller_id)
            .bind(&line.title)
            .bind(line.unit_price)
            .bind(quantity_param(line.quantity)?)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;
        Ok(OrderDetail { order, items })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Get an order the buyer placed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is not the buyer's order.
    pub async fn get_for_buyer(
        &self,
        id: OrderId,
        buyer_id: UserId,
    ) -> Result<OrderDetail, RepositoryError> {
        let order = self
            .get(id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or(RepositoryError::NotFound)?;
        let items = self.items(order.id).await?;

        Ok(OrderDetail { order, items })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_buyer(&self, buyer_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE buyer_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(buyer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Orders containing the seller's items, each with only those items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_seller(
        &self,
        seller_id: UserId,
        status: Option<ItemStatus>,
        page: Option<u32>,
    ) -> Result<Vec<OrderDetail>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order o WHERE $1 = ANY(o.seller_ids) \
               AND ($2::item_status IS NULL OR EXISTS ( \
                    SELECT 1 FROM order_item i \
                    WHERE i.order_id = o.id AND i.seller_id = $1 AND i.status = $2)) \
             ORDER BY o.created_at DESC, o.id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(seller_id)
        .bind(status)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(self.pool)
        .await?;

        let order_ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_item \
             WHERE order_id = ANY($1) AND seller_id = $2 ORDER BY id"
        ))
        .bind(&order_ids)
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        Ok(attach_items(orders, items))
    }

    /// All orders, newest first, for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        page: Option<u32>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order \
             WHERE ($1::order_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(PAGE_SIZE)
        .bind(page_offset(page))
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Move one line item to `next` and recompute the order status.
    ///
    /// Cancelling an item returns its quantity to the product's stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in the order or
    /// not the seller's, and `RepositoryError::Conflict` if the transition is
    /// not allowed.
    pub async fn update_item_status(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        by: Fulfiller,
        next: ItemStatus,
        tracking_number: Option<&str>,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_item WHERE id = $1 AND order_id = $2 FOR UPDATE"
        ))
        .bind(item_id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if let Fulfiller::Seller(seller_id) = by
            && item.seller_id != seller_id
        {
            return Err(RepositoryError::NotFound);
        }

        item.status
            .transition_to(next)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        sqlx::query(
            "UPDATE order_item SET status = $2, \
                tracking_number = COALESCE($3, tracking_number), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(item.id)
        .bind(next)
        .bind(tracking_number)
        .execute(&mut *tx)
        .await?;

        if next == ItemStatus::Cancelled {
            restock(&mut tx, item.product_id, item.quantity).await?;
        }

        let order = refresh_order_status(&mut tx, order_id).await?;
        tx.commit().await?;

        let items = self
            .items(order_id)
            .await?
            .into_iter()
            .filter(|i| match by {
                Fulfiller::Seller(seller_id) => i.seller_id == seller_id,
                Fulfiller::Admin => true,
            })
            .collect();

        Ok(OrderDetail { order, items })
    }

    /// Cancel every still-pending item of a buyer's order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is not the buyer's order and
    /// `RepositoryError::Conflict` if no item is still pending.
    pub async fn cancel_by_buyer(
        &self,
        order_id: OrderId,
        buyer_id: UserId,
    ) -> Result<OrderDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<UserId> =
            sqlx::query_scalar("SELECT buyer_id FROM customer_order WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owner != Some(buyer_id) {
            return Err(RepositoryError::NotFound);
        }

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        let statuses: Vec<(OrderItemId, ItemStatus)> =
            items.iter().map(|i| (i.id, i.status)).collect();
        let cancel = workflow::buyer_cancellable(&statuses)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        sqlx::query(
            "UPDATE order_item SET status = 'cancelled', updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(&cancel)
        .execute(&mut *tx)
        .await?;

        for item in items.iter().filter(|i| cancel.contains(&i.id)) {
            restock(&mut tx, item.product_id, item.quantity).await?;
        }

        refresh_order_status(&mut tx, order_id).await?;
        tx.commit().await?;

        self.get_for_buyer(order_id, buyer_id).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn seller_sales(&self, seller_id: UserId) -> Result<SellerSales, RepositoryError> {
        let rows = sqlx::query_as::<_, (ItemStatus, i64, Option<rust_decimal::Decimal>)>(
            "SELECT status, COUNT(*), SUM(unit_price * quantity) FROM order_item \
             WHERE seller_id = $1 GROUP BY status",
        )
        .bind(seller_id)
        .fetch_all(self.pool)
        .await?;

        let mut items_by_status = HashMap::new();
        let mut revenue = Money::ZERO;
        for (status, count, total) in rows {
            items_by_status.insert(status, count);
            if status != ItemStatus::Cancelled
                && let Some(total) = total
            {
                let total = Money::new(total)
                    .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
                revenue = revenue + total;
            }
        }

        Ok(SellerSales {
            items_by_status,
            revenue,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(&self) -> Result<OrderTotals, RepositoryError> {
        let totals = sqlx::query_as::<_, OrderTotals>(
            "SELECT COUNT(*) AS orders, COALESCE(SUM(subtotal), 0) AS gross \
             FROM customer_order WHERE status <> 'cancelled'",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(totals)
    }

    /// Whether the buyer has received at least one unit of the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered(
        &self,
        buyer_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let delivered: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM order_item i JOIN customer_order o ON o.id = i.order_id \
                WHERE o.buyer_id = $1 AND i.product_id = $2 AND i.status = 'delivered')",
        )
        .bind(buyer_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(delivered)
    }
}

async fn restock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE product SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn refresh_order_status(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
) -> Result<Order, RepositoryError> {
    let statuses: Vec<ItemStatus> =
        sqlx::query_scalar("SELECT status FROM order_item WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(&mut **tx)
            .await?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE customer_order SET status = $2, updated_at = NOW() WHERE id = $1 \
         RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id)
    .bind(OrderStatus::summarize(&statuses))
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(order)
}

fn attach_items(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<OrderDetail> {
    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    orders
        .into_iter()
        .map(|order| {
            let items = by_order.remove(&order.id).unwrap_or_default();
            OrderDetail { order, items }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: i32) -> Order {
        Order {
            id: OrderId::new(id),
            reference: format!("BZ-{id}"),
            buyer_id: UserId::new(1),
            seller_ids: vec![UserId::new(2), UserId::new(3)],
            status: OrderStatus::Pending,
            subtotal: Money::from_cents(1500),
            shipping_address: "1 Market St".into(),
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: i32, order_id: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(order_id),
            product_id: ProductId::new(9),
            seller_id: UserId::new(2),
            title: "Mug".into(),
            unit_price: Money::from_cents(750),
            quantity: 2,
            status: ItemStatus::Pending,
            tracking_number: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_attach_items_groups_by_order_and_keeps_order_sequence() {
        let details = attach_items(
            vec![order(2), order(1)],
            vec![item(10, 1), item(11, 2), item(12, 1)],
        );

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].order.id, OrderId::new(2));
        assert_eq!(details[0].items.len(), 1);
        assert_eq!(details[1].items.len(), 2);
    }

    #[test]
    fn test_order_detail_flattens_order_fields() {
        let detail = OrderDetail {
            order: order(5),
            items: vec![item(1, 5)],
        };
        let json = serde_json::to_value(&detail).expect("serializes");
        assert_eq!(json["reference"], "BZ-5");
        assert_eq!(json["items"][0]["status"], "pending");
    }
}
