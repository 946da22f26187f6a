use examshop_catalog::{Paper, PaperId};
use examshop_core::Quantity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One paper in the cart. `unit_price` is the catalog price at the time the
/// paper was first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub quantity: u32,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Session-scoped mapping of paper id to line. Totals are always derived
/// from the lines, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: BTreeMap<PaperId, CartLine>,
    dirty: bool,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a cart from persisted lines, dropping any that were stored
    /// with zero units.
    pub fn from_lines(lines: BTreeMap<PaperId, CartLine>) -> Self {
        let lines = lines.into_iter().filter(|(_, line)| line.quantity > 0).collect();
        Self { lines, dirty: false }
    }

    /// Adds `quantity` units of `paper`, or sets the quantity outright when
    /// `override_quantity` is true. A new line captures the paper's current
    /// price; an existing line keeps the price it was added at.
    pub fn add(&mut self, paper: &Paper, quantity: Quantity, override_quantity: bool) {
        let line = self.lines.entry(paper.id).or_insert_with(|| CartLine {
            quantity: 0,
            unit_price: paper.price,
        });

        if override_quantity {
            line.quantity = quantity.get();
        } else {
            line.quantity = line.quantity.saturating_add(quantity.get());
        }
        self.dirty = true;
    }

    /// Returns whether a line was removed. Removing an absent paper leaves
    /// the cart untouched.
    pub fn remove(&mut self, paper_id: PaperId) -> bool {
        let removed = self.lines.remove(&paper_id).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.lines.is_empty() {
            self.dirty = true;
        }
        self.lines.clear();
    }

    pub fn line(&self, paper_id: PaperId) -> Option<&CartLine> {
        self.lines.get(&paper_id)
    }

    pub fn lines(&self) -> impl Iterator<Item = (PaperId, &CartLine)> + '_ {
        self.lines.iter().map(|(id, line)| (*id, line))
    }

    pub(crate) fn raw_lines(&self) -> &BTreeMap<PaperId, CartLine> {
        &self.lines
    }

    pub fn paper_ids(&self) -> Vec<PaperId> {
        self.lines.keys().copied().collect()
    }

    pub fn total_item_count(&self) -> u64 {
        self.lines.values().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn total_price(&self) -> Decimal {
        self.lines.values().map(CartLine::total_price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
