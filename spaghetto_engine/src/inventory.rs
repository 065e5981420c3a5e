/// Spaghetto Engine — Inventory
///
/// Stock is kept per ingredient as lots of units bought at the same
/// unit cost, so the value of any quantity can be computed exactly
/// when stock is consumed.
///
/// Unit costs: i64 fixed-point cents (real cents * SCALE).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, div_round, SCALE};
use crate::domain::Item;
use crate::error::{EngineError, Result};

/// Which lots are drawn from first when stock is costed or consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostOrder {
    LowestFirst,
    HighestFirst,
}

/// Units of one ingredient bought at the same unit cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockLot {
    pub quantity: i64,
    /// Cost of one unit, in cents * SCALE.
    pub unit_cost: i64,
}

impl StockLot {
    /// Turn a purchase (total price for a quantity) into a lot.
    pub fn from_item(item: &Item) -> Result<Self> {
        let unit_cost = if item.quantity == 0 {
            0
        } else {
            crate::arithmetic::mul_div_round(item.price, SCALE, item.quantity)?
        };
        Ok(Self {
            quantity: item.quantity,
            unit_cost,
        })
    }
}

/// All stock of one ingredient. Lots are sorted by ascending unit cost
/// and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryItem {
    pub name: String,
    pub unit: String,
    pub lots: Vec<StockLot>,
}

impl InventoryItem {
    /// An entry with no stock yet.
    pub fn new(name: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            lots: Vec::new(),
        }
    }

    /// Units in stock across all lots.
    pub fn quantity(&self) -> Result<i64> {
        self.lots
            .iter()
            .try_fold(0i64, |acc, lot| checked_add(acc, lot.quantity))
    }

    /// Total value of the stock in cents.
    pub fn value(&self) -> Result<i64> {
        let scaled: i128 = self
            .lots
            .iter()
            .map(|l| l.quantity as i128 * l.unit_cost as i128)
            .sum();
        scaled_to_cents(scaled)
    }

    /// Quantity-weighted average unit cost (cents * SCALE). 0 when empty.
    pub fn average_unit_cost(&self) -> Result<i64> {
        let quantity = self.quantity()?;
        if quantity == 0 {
            return Ok(0);
        }
        let scaled: i128 = self
            .lots
            .iter()
            .map(|l| l.quantity as i128 * l.unit_cost as i128)
            .sum();
        let avg = scaled / quantity as i128;
        i64::try_from(avg).map_err(|_| EngineError::Overflow("average unit cost".into()))
    }

    /// Merge a purchase of this item into the lots.
    pub fn add(&mut self, item: &Item) -> Result<()> {
        if item.name != self.name {
            return Err(EngineError::validation(format!(
                "cannot add {:?} to {:?}",
                item.name, self.name
            )));
        }
        if item.unit != self.unit {
            return Err(EngineError::UnitMismatch {
                name: self.name.clone(),
                expected: self.unit.clone(),
                found: item.unit.clone(),
            });
        }
        self.add_lot(StockLot::from_item(item)?)
    }

    /// Insert a lot, merging with an existing lot of the same unit cost.
    /// Fails if the item's total quantity would overflow.
    pub fn add_lot(&mut self, lot: StockLot) -> Result<()> {
        if lot.quantity == 0 {
            return Ok(());
        }
        checked_add(self.quantity()?, lot.quantity).map_err(|_| {
            EngineError::Overflow(format!("too much {:?} in stock to add {} more", self.name, lot.quantity))
        })?;
        match self
            .lots
            .binary_search_by(|l| l.unit_cost.cmp(&lot.unit_cost))
        {
            Ok(idx) => {
                self.lots[idx].quantity = checked_add(self.lots[idx].quantity, lot.quantity)?;
            }
            Err(idx) => self.lots.insert(idx, lot),
        }
        Ok(())
    }

    /// Cost in cents of `n` units without removing them.
    pub fn cost_of(&self, n: i64, order: CostOrder) -> Result<i64> {
        self.check_available(n)?;
        let mut remaining = n;
        let mut scaled: i128 = 0;
        for idx in lot_indices(self.lots.len(), order) {
            if remaining == 0 {
                break;
            }
            let lot = &self.lots[idx];
            let taken = remaining.min(lot.quantity);
            scaled += taken as i128 * lot.unit_cost as i128;
            remaining -= taken;
        }
        scaled_to_cents(scaled)
    }

    /// Remove `n` units, drawing lots in `order`. Returns their cost in cents.
    pub fn consume(&mut self, n: i64, order: CostOrder) -> Result<i64> {
        self.check_available(n)?;
        let mut remaining = n;
        let mut scaled: i128 = 0;
        for idx in lot_indices(self.lots.len(), order) {
            if remaining == 0 {
                break;
            }
            let lot = &mut self.lots[idx];
            let taken = remaining.min(lot.quantity);
            scaled += taken as i128 * lot.unit_cost as i128;
            lot.quantity -= taken;
            remaining -= taken;
        }
        self.lots.retain(|l| l.quantity > 0);
        scaled_to_cents(scaled)
    }

    fn check_available(&self, n: i64) -> Result<()> {
        if n < 0 {
            return Err(EngineError::validation(format!(
                "cannot take a negative quantity ({}) of {:?}",
                n, self.name
            )));
        }
        let available = self.quantity()?;
        if n > available {
            return Err(EngineError::InsufficientStock {
                name: self.name.clone(),
                requested: n,
                available,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Totals that overflow never pass the lot invariants.
        let quantity = self.quantity().unwrap_or(i64::MAX);
        write!(
            f,
            "{} {} of {}",
            quantity,
            crate::arithmetic::plural(&self.unit, quantity),
            self.name
        )
    }
}

fn lot_indices(len: usize, order: CostOrder) -> Box<dyn Iterator<Item = usize>> {
    match order {
        CostOrder::LowestFirst => Box::new(0..len),
        CostOrder::HighestFirst => Box::new((0..len).rev()),
    }
}

fn scaled_to_cents(scaled: i128) -> Result<i64> {
    let wide = i64::try_from(scaled)
        .map_err(|_| EngineError::Overflow(format!("stock value {} overflows i64", scaled)))?;
    div_round(wide, SCALE)
}

/// Ingredients on hand, keyed by unique name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    pub items: BTreeMap<String, InventoryItem>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a purchase into the inventory, creating the entry if needed.
    pub fn add(&mut self, item: &Item) -> Result<()> {
        self.ensure_entry(&item.name, &item.unit)?.add(item)
    }

    /// Get the entry for `name`, creating an empty one measured in `unit`.
    /// Fails if the entry exists with a different unit.
    pub fn ensure_entry(&mut self, name: &str, unit: &str) -> Result<&mut InventoryItem> {
        let entry = self
            .items
            .entry(name.to_string())
            .or_insert_with(|| InventoryItem::new(name, unit));
        if entry.unit != unit {
            return Err(EngineError::UnitMismatch {
                name: name.to_string(),
                expected: entry.unit.clone(),
                found: unit.to_string(),
            });
        }
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Option<&InventoryItem> {
        self.items.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut InventoryItem> {
        self.items.get_mut(name)
    }

    /// Look an item up by exact, prefix or substring match (case-insensitive).
    pub fn find(&self, key: &str) -> Option<&InventoryItem> {
        fuzzy_match(key, self.items.keys().map(String::as_str)).and_then(|n| self.items.get(n))
    }

    /// Remove an entry. Fails if it does not exist.
    pub fn remove(&mut self, name: &str) -> Result<InventoryItem> {
        self.items
            .remove(name)
            .ok_or_else(|| EngineError::UnknownItem(name.to_string()))
    }

    /// Remove an entry if present.
    pub fn discard(&mut self, name: &str) -> Option<InventoryItem> {
        self.items.remove(name)
    }

    /// Value of every item in stock, in cents.
    pub fn total_value(&self) -> Result<i64> {
        self.items
            .values()
            .try_fold(0i64, |acc, item| checked_add(acc, item.value()?))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InventoryItem> {
        self.items.values()
    }
}

/// Resolve `key` against `names`: exact match first, then a unique
/// case-insensitive prefix match, then a unique case-insensitive
/// substring match.
pub fn fuzzy_match<'a>(key: &str, names: impl Iterator<Item = &'a str> + Clone) -> Option<&'a str> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    if let Some(exact) = names.clone().find(|n| *n == key) {
        return Some(exact);
    }
    let lowered = key.to_lowercase();

    let prefixed: Vec<&str> = names
        .clone()
        .filter(|n| n.to_lowercase().starts_with(&lowered))
        .collect();
    if prefixed.len() == 1 {
        return Some(prefixed[0]);
    }
    if prefixed.len() > 1 {
        return None;
    }

    let contained: Vec<&str> = names.filter(|n| n.to_lowercase().contains(&lowered)).collect();
    if contained.len() == 1 {
        Some(contained[0])
    } else {
        None
    }
}
