/// Spaghetto Engine — Invariant Checks
///
/// Hard-fail validation, run after every transition.
/// Each failure message carries an `[INVARIANT:<name>]` tag.

use crate::domain::GameState;
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all invariant checks, failing on the first violation.
pub fn validate_invariants(state: &GameState) -> Result<()> {
    try_validate_invariants(state).map_err(EngineError::Invariant)
}

/// Same checks, returning the bare tagged message.
/// Used by snapshot restore, which reports its own error type.
pub fn try_validate_invariants(state: &GameState) -> std::result::Result<(), String> {
    check_inventory_keys(state)?;
    check_lot_order(state)?;
    check_dish_ingredients(state)?;
    check_ledger_balance(state)?;
    check_transaction_weeks(state)?;
    check_loan_balances(state)?;
    check_employee_count(state)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

/// Every inventory entry is stored under its own name.
fn check_inventory_keys(state: &GameState) -> std::result::Result<(), String> {
    for (key, item) in &state.inventory.items {
        if key != &item.name {
            return Err(format!(
                "[INVARIANT:inventory_keys] Inventory key {:?} holds item {:?}",
                key, item.name
            ));
        }
    }
    Ok(())
}

/// Lots are non-empty, non-negative and strictly ascending by unit cost,
/// and an item's total quantity fits in an i64.
fn check_lot_order(state: &GameState) -> std::result::Result<(), String> {
    for item in state.inventory.iter() {
        for lot in &item.lots {
            if lot.quantity <= 0 || lot.unit_cost < 0 {
                return Err(format!(
                    "[INVARIANT:lot_order] {:?} has a lot of {} units at unit cost {}",
                    item.name, lot.quantity, lot.unit_cost
                ));
            }
        }
        if item.lots.windows(2).any(|w| w[0].unit_cost >= w[1].unit_cost) {
            return Err(format!(
                "[INVARIANT:lot_order] Lots of {:?} are not in ascending cost order",
                item.name
            ));
        }
        if item.quantity().is_err() {
            return Err(format!(
                "[INVARIANT:lot_order] Total stock of {:?} overflows",
                item.name
            ));
        }
    }
    Ok(())
}

/// Every dish ingredient is tracked in inventory with a matching unit.
fn check_dish_ingredients(state: &GameState) -> std::result::Result<(), String> {
    for dish in state.dishes.iter() {
        for ingredient in &dish.ingredients {
            let Some(item) = state.inventory.get(&ingredient.name) else {
                return Err(format!(
                    "[INVARIANT:dish_ingredients] Dish {:?} uses {:?}, which is not in inventory",
                    dish.name, ingredient.name
                ));
            };
            if item.unit != ingredient.unit {
                return Err(format!(
                    "[INVARIANT:dish_ingredients] Dish {:?} measures {:?} in {:?}, inventory uses {:?}",
                    dish.name, ingredient.name, ingredient.unit, item.unit
                ));
            }
            if ingredient.quantity <= 0 {
                return Err(format!(
                    "[INVARIANT:dish_ingredients] Dish {:?} uses a non-positive quantity of {:?}",
                    dish.name, ingredient.name
                ));
            }
        }
    }
    Ok(())
}

/// The balance is exactly the sum of the ledger.
fn check_ledger_balance(state: &GameState) -> std::result::Result<(), String> {
    let sum = state
        .transactions
        .iter()
        .try_fold(0i64, |acc, t| acc.checked_add(t.cents));
    match sum {
        Some(sum) if sum == state.balance => Ok(()),
        Some(sum) => Err(format!(
            "[INVARIANT:ledger_balance] Balance {} does not match ledger total {}",
            state.balance, sum
        )),
        None => Err("[INVARIANT:ledger_balance] Ledger total overflows".to_string()),
    }
}

/// No transaction is dated in the future.
fn check_transaction_weeks(state: &GameState) -> std::result::Result<(), String> {
    for t in &state.transactions {
        if t.week < 0 || t.week > state.total_weeks {
            return Err(format!(
                "[INVARIANT:transaction_weeks] Transaction {:?} dated week {}, current week is {}",
                t.title, t.week, state.total_weeks
            ));
        }
    }
    Ok(())
}

/// Active loans are real loans with money still owed.
fn check_loan_balances(state: &GameState) -> std::result::Result<(), String> {
    for (name, loan) in &state.loans {
        if name != &loan.name {
            return Err(format!(
                "[INVARIANT:loan_balances] Loan key {:?} holds loan {:?}",
                name, loan.name
            ));
        }
        if loan.is_subsidy() {
            return Err(format!(
                "[INVARIANT:loan_balances] Subsidy {:?} is tracked as an active loan",
                name
            ));
        }
        if loan.outstanding <= 0 || loan.remaining_weeks < 0 {
            return Err(format!(
                "[INVARIANT:loan_balances] Loan {:?} has outstanding {} and {} weeks remaining",
                name, loan.outstanding, loan.remaining_weeks
            ));
        }
    }
    Ok(())
}

fn check_employee_count(state: &GameState) -> std::result::Result<(), String> {
    if state.employee_count < 0 {
        return Err(format!(
            "[INVARIANT:employee_count] Employee count is negative: {}",
            state.employee_count
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dish, Ingredient, Item, TransactionKind};
    use crate::inventory::StockLot;

    fn healthy() -> GameState {
        let mut s = GameState::default();
        s.record("Owner Deposit", 10_000, TransactionKind::Deposit).unwrap();
        s.inventory
            .add(&Item {
                name: "Egg".into(),
                quantity: 12,
                unit: "egg".into(),
                price: 600,
            })
            .unwrap();
        s.dishes
            .add(Dish {
                name: "Omelette".into(),
                price: 800,
                ingredients: vec![Ingredient {
                    name: "Egg".into(),
                    quantity: 3,
                    unit: "egg".into(),
                }],
            })
            .unwrap();
        s
    }

    fn tag(state: &GameState) -> String {
        try_validate_invariants(state).unwrap_err()
    }

    #[test]
    fn healthy_state_passes() {
        assert!(validate_invariants(&healthy()).is_ok());
        assert!(validate_invariants(&GameState::default()).is_ok());
    }

    #[test]
    fn ledger_mismatch_is_caught() {
        let mut s = healthy();
        s.balance += 1;
        assert!(tag(&s).contains("[INVARIANT:ledger_balance]"));
        assert!(matches!(validate_invariants(&s), Err(EngineError::Invariant(_))));
    }

    #[test]
    fn unsorted_lots_are_caught() {
        let mut s = healthy();
        s.inventory.get_mut("Egg").unwrap().lots.insert(
            0,
            StockLot {
                quantity: 1,
                unit_cost: 1_000_000,
            },
        );
        assert!(tag(&s).contains("[INVARIANT:lot_order]"));
    }

    #[test]
    fn overflowing_stock_is_caught() {
        let mut s = healthy();
        let egg = s.inventory.get_mut("Egg").unwrap();
        egg.lots.push(StockLot {
            quantity: i64::MAX,
            unit_cost: 1_000_000,
        });
        assert!(tag(&s).contains("Total stock of \"Egg\" overflows"));
    }

    #[test]
    fn dangling_ingredient_is_caught() {
        let mut s = healthy();
        s.inventory.items.clear();
        assert!(tag(&s).contains("[INVARIANT:dish_ingredients]"));
    }

    #[test]
    fn future_transaction_is_caught() {
        let mut s = healthy();
        s.transactions[0].week = 3;
        assert!(tag(&s).contains("[INVARIANT:transaction_weeks]"));
    }

    #[test]
    fn negative_staff_is_caught() {
        let mut s = healthy();
        s.employee_count = -1;
        assert!(tag(&s).contains("[INVARIANT:employee_count]"));
    }
}
