//! Cart rules.
//!
//! Every part in the catalogue is a single physical item, so a cart holds
//! each part at most once and quantities never go above one. Totals are
//! always derived from the lines; nothing is cached.

use serde::{Deserialize, Serialize};

use crate::models::Part;
use crate::types::{PartId, Price, VehicleId};

/// Errors returned by cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Producto ya en el carrito")]
    AlreadyInCart(PartId),
    #[error("Solo hay una unidad disponible de cada pieza")]
    QuantityFixed(PartId),
    #[error("Producto no encontrado en el carrito")]
    NotInCart(PartId),
}

/// A part in the cart, with its price snapshotted (VAT included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub part_id: PartId,
    pub quantity: i32,
    pub unit_price: Price,
    pub part_name: String,
    pub part_family: Option<String>,
    pub part_image: Option<String>,
    pub part_reference: Option<String>,
    pub part_code: Option<String>,
    pub weight_grams: i64,
    pub vehicle_id: Option<VehicleId>,
}

impl CartLine {
    /// Snapshot a catalogue part into a new line.
    #[must_use]
    pub fn from_part(part: &Part) -> Self {
        Self {
            part_id: part.id,
            quantity: 1,
            unit_price: part.price_with_vat(),
            part_name: part.descripcion_articulo.clone(),
            part_family: Some(part.descripcion_familia.clone()),
            part_image: part.real_images().next().map(str::to_owned),
            part_reference: Some(part.ref_local.to_string()),
            part_code: part.ref_principal.clone(),
            weight_grams: part.weight_grams(),
            vehicle_id: None,
        }
    }

    /// Price of the line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }
}

/// A cart and its derived totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Build a cart from stored lines.
    #[must_use]
    pub const fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn contains(&self, part_id: PartId) -> bool {
        self.lines.iter().any(|l| l.part_id == part_id)
    }

    /// Add a part. The stored quantity is always one.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::AlreadyInCart`] if the part is already present.
    pub fn add(&mut self, mut line: CartLine) -> Result<(), CartError> {
        if self.contains(line.part_id) {
            return Err(CartError::AlreadyInCart(line.part_id));
        }
        line.quantity = 1;
        self.lines.push(line);
        Ok(())
    }

    /// Remove a part. Returns whether anything was removed.
    pub fn remove(&mut self, part_id: PartId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.part_id != part_id);
        self.lines.len() != before
    }

    /// Apply a quantity change requested by the client.
    ///
    /// Zero or negative removes the line; the current quantity is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] for unknown parts and
    /// [`CartError::QuantityFixed`] for any other quantity.
    pub fn update_quantity(&mut self, part_id: PartId, quantity: i32) -> Result<(), CartError> {
        let current = self
            .lines
            .iter()
            .find(|l| l.part_id == part_id)
            .map(|l| l.quantity)
            .ok_or(CartError::NotInCart(part_id))?;
        if quantity <= 0 {
            self.remove(part_id);
            return Ok(());
        }
        if quantity == current {
            return Ok(());
        }
        Err(CartError::QuantityFixed(part_id))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn total_items(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    #[must_use]
    pub fn total_weight_grams(&self) -> i64 {
        self.lines
            .iter()
            .map(|l| l.weight_grams * i64::from(l.quantity))
            .sum()
    }

    /// Serializable view sent to the storefront.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            items: self.lines.clone(),
            total_items: self.total_items(),
            subtotal: self.subtotal(),
            total_weight_grams: self.total_weight_grams(),
        }
    }
}

/// Cart contents with derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub total_items: i32,
    pub subtotal: Price,
    pub total_weight_grams: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, cents: i64, grams: i64) -> CartLine {
        CartLine {
            part_id: PartId::new(id),
            quantity: 1,
            unit_price: Price::from_cents(cents),
            part_name: format!("Pieza {id}"),
            part_family: None,
            part_image: None,
            part_reference: None,
            part_code: None,
            weight_grams: grams,
            vehicle_id: None,
        }
    }

    #[test]
    fn test_totals_recompute_after_each_change() {
        let mut cart = Cart::default();
        cart.add(line(1, 12_100, 4_500)).unwrap();
        cart.add(line(2, 2_420, 500)).unwrap();
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.subtotal(), Price::from_cents(14_520));
        assert_eq!(cart.total_weight_grams(), 5_000);

        cart.update_quantity(PartId::new(1), 0).unwrap();
        assert_eq!(cart.total_items(), 1);
        assert_eq!(cart.subtotal(), Price::from_cents(2_420));
        assert_eq!(cart.total_weight_grams(), 500);
    }

    #[test]
    fn test_duplicate_part_rejected() {
        let mut cart = Cart::default();
        cart.add(line(1, 100, 500)).unwrap();
        let err = cart.add(line(1, 100, 500)).unwrap_err();
        assert_eq!(err, CartError::AlreadyInCart(PartId::new(1)));
        assert_eq!(err.to_string(), "Producto ya en el carrito");
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_add_forces_quantity_one() {
        let mut cart = Cart::default();
        let mut l = line(3, 500, 500);
        l.quantity = 4;
        cart.add(l).unwrap();
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_update_quantity_rules() {
        let mut cart = Cart::from_lines(vec![line(1, 100, 500)]);
        assert!(cart.update_quantity(PartId::new(1), 1).is_ok());
        assert_eq!(
            cart.update_quantity(PartId::new(1), 2),
            Err(CartError::QuantityFixed(PartId::new(1)))
        );
        assert_eq!(
            cart.update_quantity(PartId::new(9), 0),
            Err(CartError::NotInCart(PartId::new(9)))
        );
        cart.update_quantity(PartId::new(1), -1).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::from_lines(vec![line(1, 100, 500), line(2, 100, 500)]);
        assert!(cart.remove(PartId::new(1)));
        assert!(!cart.remove(PartId::new(1)));
        cart.clear();
        assert_eq!(cart.subtotal(), Price::ZERO);
    }

    #[test]
    fn test_line_from_part_snapshots_vat_price() {
        let part = crate::models::catalog::tests::sample_part();
        let l = CartLine::from_part(&part);
        assert_eq!(l.unit_price, Price::from_cents(12_100));
        assert_eq!(l.weight_grams, 4_500);
        assert_eq!(l.part_reference.as_deref(), Some("123456"));
        assert_eq!(l.part_image.as_deref(), Some("https://img.example/1.jpg"));
    }
}
