//! Shopping cart carried in the visitor's session.
//!
//! The cart stores a snapshot of title and unit price taken when the item was
//! added. Checkout re-reads every product and rejects the order if a listing
//! disappeared, so the snapshot is only for display.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Money, ProductId, UserId};

/// Upper bound on the quantity of a single line.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("product is out of stock")]
    OutOfStock,
    #[error("product is not in the cart")]
    NotInCart,
    #[error("cart is empty")]
    Empty,
}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.line_total(self.quantity)
    }
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a product, merging with an existing line for the same product.
    ///
    /// The resulting quantity is clamped to `stock` and
    /// [`MAX_LINE_QUANTITY`]. Returns the quantity now in the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] or [`CartError::OutOfStock`].
    pub fn add(&mut self, line: CartLine, stock: u32) -> Result<u32, CartError> {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if stock == 0 {
            return Err(CartError::OutOfStock);
        }
        let limit = stock.min(MAX_LINE_QUANTITY);

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == line.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(line.quantity).min(limit);
            existing.unit_price = line.unit_price;
            existing.title = line.title;
            return Ok(existing.quantity);
        }

        let quantity = line.quantity.min(limit);
        self.lines.push(CartLine { quantity, ..line });
        Ok(quantity)
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] or [`CartError::OutOfStock`].
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        stock: u32,
    ) -> Result<u32, CartError> {
        if quantity == 0 {
            self.remove(product_id)?;
            return Ok(0);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(CartError::NotInCart)?;
        if stock == 0 {
            return Err(CartError::OutOfStock);
        }
        line.quantity = quantity.min(stock).min(MAX_LINE_QUANTITY);
        Ok(line.quantity)
    }

    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] if the product has no line.
    pub fn remove(&mut self, product_id: ProductId) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or(CartError::NotInCart)?;
        Ok(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Distinct sellers in the cart, sorted. Becomes the order's seller array.
    #[must_use]
    pub fn seller_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.lines.iter().map(|l| l.seller_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i32, seller: i32, cents: u32, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            seller_id: UserId::new(seller),
            title: format!("Product {product}"),
            unit_price: Money::from_cents(cents),
            quantity,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 10, 500, 2), 10), Ok(2));
        assert_eq!(cart.add(line(1, 10, 500, 3), 10), Ok(5));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_add_clamps_to_stock_and_max() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 10, 500, 8), 3), Ok(3));
        assert_eq!(cart.add(line(2, 10, 500, 500), 1000), Ok(MAX_LINE_QUANTITY));
    }

    #[test]
    fn test_add_rejects_zero_quantity_and_stock() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 10, 500, 0), 5), Err(CartError::ZeroQuantity));
        assert_eq!(cart.add(line(1, 10, 500, 1), 0), Err(CartError::OutOfStock));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add(line(1, 10, 500, 2), 10).expect("add");
        assert_eq!(cart.set_quantity(ProductId::new(1), 0, 10), Ok(0));
        assert!(cart.is_empty());
        assert_eq!(
            cart.set_quantity(ProductId::new(1), 2, 10),
            Err(CartError::NotInCart)
        );
    }

    #[test]
    fn test_set_quantity_missing_line_before_stock() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.set_quantity(ProductId::new(7), 3, 0),
            Err(CartError::NotInCart)
        );

        cart.add(line(7, 10, 500, 2), 10).expect("add");
        assert_eq!(
            cart.set_quantity(ProductId::new(7), 3, 0),
            Err(CartError::OutOfStock)
        );
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_subtotal_and_sellers() {
        let mut cart = Cart::new();
        cart.add(line(1, 20, 1999, 2), 10).expect("add");
        cart.add(line(2, 10, 500, 1), 10).expect("add");
        cart.add(line(3, 20, 100, 3), 10).expect("add");

        assert_eq!(cart.subtotal(), Money::from_cents(1999 * 2 + 500 + 300));
        assert_eq!(cart.seller_ids(), vec![UserId::new(10), UserId::new(20)]);
    }

    #[test]
    fn test_serde_round_trip_keeps_lines() {
        let mut cart = Cart::new();
        cart.add(line(7, 3, 250, 4), 10).expect("add");
        let json = serde_json::to_value(&cart).expect("serialize");
        let back: Cart = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, cart);
    }
}
