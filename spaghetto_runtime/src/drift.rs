//! Drift detection — determinism verification and state comparison.
//!
//! All money values are i64 cents. No float arithmetic anywhere.

use std::collections::BTreeSet;
use std::fmt;

use spaghetto_engine::arithmetic::{format_cents, format_week};
use spaghetto_engine::domain::{GameState, Transaction};
use spaghetto_engine::events::EventEnvelope;

use crate::error::{Result, RuntimeError};
use crate::replay;

/// Verify determinism by replaying the same events twice and
/// comparing hashes.
pub fn verify_determinism(events: &[EventEnvelope]) -> Result<String> {
    let hash1 = replay::rebuild_hash(events)?;
    let hash2 = replay::rebuild_hash(events)?;

    if hash1 != hash2 {
        return Err(RuntimeError::Determinism {
            first: hash1,
            second: hash2,
        });
    }
    Ok(hash1)
}

/// Structured state comparison — all values are integers.
///
/// `state_a` is the earlier (or expected) state, `state_b` the later
/// (or observed) one.
pub fn compare_states(state_a: &GameState, state_b: &GameState) -> Result<DriftReport> {
    let dishes_a: BTreeSet<&str> = state_a.dishes.dishes.keys().map(String::as_str).collect();
    let dishes_b: BTreeSet<&str> = state_b.dishes.dishes.keys().map(String::as_str).collect();
    let items_a: BTreeSet<&str> = state_a.inventory.items.keys().map(String::as_str).collect();
    let items_b: BTreeSet<&str> = state_b.inventory.items.keys().map(String::as_str).collect();

    // Ledger entries past the common prefix
    let common = state_a
        .transactions
        .iter()
        .zip(&state_b.transactions)
        .take_while(|(a, b)| a == b)
        .count();
    let new_transactions = state_b.transactions[common..].to_vec();

    let value_a = state_a.inventory.total_value()?;
    let value_b = state_b.inventory.total_value()?;

    Ok(DriftReport {
        balance_a: state_a.balance,
        balance_b: state_b.balance,
        balance_delta: state_b.balance - state_a.balance,
        inventory_value_a: value_a,
        inventory_value_b: value_b,
        inventory_value_delta: value_b - value_a,
        employees_a: state_a.employee_count,
        employees_b: state_b.employee_count,
        employees_delta: state_b.employee_count - state_a.employee_count,
        weeks_a: state_a.total_weeks,
        weeks_b: state_b.total_weeks,
        weeks_delta: state_b.total_weeks - state_a.total_weeks,
        added_dishes: only_in(&dishes_b, &dishes_a),
        removed_dishes: only_in(&dishes_a, &dishes_b),
        added_items: only_in(&items_b, &items_a),
        removed_items: only_in(&items_a, &items_b),
        new_transactions,
    })
}

/// Names in `set` but not in `other`, sorted.
fn only_in(set: &BTreeSet<&str>, other: &BTreeSet<&str>) -> Vec<String> {
    set.difference(other).map(|s| s.to_string()).collect()
}

/// Structured drift report — all numeric fields are i64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub balance_a: i64,
    pub balance_b: i64,
    pub balance_delta: i64,
    pub inventory_value_a: i64,
    pub inventory_value_b: i64,
    pub inventory_value_delta: i64,
    pub employees_a: i64,
    pub employees_b: i64,
    pub employees_delta: i64,
    pub weeks_a: i64,
    pub weeks_b: i64,
    pub weeks_delta: i64,
    pub added_dishes: Vec<String>,
    pub removed_dishes: Vec<String>,
    pub added_items: Vec<String>,
    pub removed_items: Vec<String>,
    pub new_transactions: Vec<Transaction>,
}

impl DriftReport {
    /// True when nothing tracked by the report differs.
    pub fn is_empty(&self) -> bool {
        self.balance_delta == 0
            && self.inventory_value_delta == 0
            && self.employees_delta == 0
            && self.weeks_delta == 0
            && self.added_dishes.is_empty()
            && self.removed_dishes.is_empty()
            && self.added_items.is_empty()
            && self.removed_items.is_empty()
            && self.new_transactions.is_empty()
    }
}

fn signed_cents(cents: i64) -> String {
    if cents > 0 {
        format!("+{}", format_cents(cents))
    } else {
        format_cents(cents)
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Balance:         {} -> {} ({})",
            format_cents(self.balance_a),
            format_cents(self.balance_b),
            signed_cents(self.balance_delta)
        )?;
        writeln!(
            f,
            "Inventory value: {} -> {} ({})",
            format_cents(self.inventory_value_a),
            format_cents(self.inventory_value_b),
            signed_cents(self.inventory_value_delta)
        )?;
        writeln!(
            f,
            "Employees:       {} -> {} ({:+})",
            self.employees_a, self.employees_b, self.employees_delta
        )?;
        writeln!(
            f,
            "Date:            {} -> {}",
            format_week(self.weeks_a),
            format_week(self.weeks_b)
        )?;
        for (label, names) in [
            ("New dishes", &self.added_dishes),
            ("Removed dishes", &self.removed_dishes),
            ("New items", &self.added_items),
            ("Removed items", &self.removed_items),
        ] {
            if !names.is_empty() {
                writeln!(f, "{}: {}", label, names.join(", "))?;
            }
        }
        for t in &self.new_transactions {
            writeln!(f, "  {}", t)?;
        }
        Ok(())
    }
}
