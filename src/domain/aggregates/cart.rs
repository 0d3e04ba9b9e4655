//! Cart Aggregate
//!
//! The cart is owned by the client and handed to checkout by value. It only
//! carries what the shopper asked for; prices and stock are always read
//! from the catalog at order time.

use uuid::Uuid;
use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    /// Name as the client last saw it, only used to report a product that no longer exists.
    pub name: String,
    pub quantity: Quantity,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn item_count(&self) -> usize { self.lines.len() }

    /// Adds a line, merging it into an existing line for the same product.
    pub fn add(&mut self, product_id: Uuid, name: impl Into<String>, quantity: Quantity) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            existing.quantity = existing.quantity.add(quantity);
        } else {
            self.lines.push(CartLine { product_id, name: name.into(), quantity });
        }
    }

    /// Product ids in ascending order, the order rows are locked in.
    pub fn product_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids
    }
}
