/// Spaghetto Engine — Centralized Transition Logic
///
/// ALL state-mutation logic lives here.
/// All math is checked integer math. No float.
/// Economy constants are read from state.constants.

use std::collections::{BTreeMap, BTreeSet};

use crate::arithmetic::{checked_add, checked_mul, checked_sub, plural, validate_name};
use crate::domain::{Dish, GameConstants, GameState, Item, TransactionKind, TransitionResult};
use crate::error::{EngineError, Result};
use crate::events::{EventEnvelope, GameEvent};
use crate::inventory::CostOrder;
use crate::loans::Loan;
use crate::menu::servings_available;

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Apply *event* to *state* and return `(new_state, result)`.
/// The original state is never mutated — a deep clone is made first,
/// and it is dropped if any step fails.
pub fn apply_event(
    state: &GameState,
    event: &EventEnvelope,
) -> Result<(GameState, TransitionResult)> {
    let mut new_state = state.clone();

    let mut result = match &event.event {
        GameEvent::InitializeConstants { constants } => {
            apply_initialize_constants(&mut new_state, constants)
        }
        GameEvent::Deposit { title, cents } => apply_deposit(&mut new_state, title, *cents),
        GameEvent::Withdraw { title, cents } => apply_withdraw(&mut new_state, title, *cents),
        GameEvent::StockItem { item } => apply_stock_item(&mut new_state, item),
        GameEvent::BuyItem { item } => apply_buy_item(&mut new_state, item),
        GameEvent::DiscardItem { name, quantity } => {
            apply_discard_item(&mut new_state, name, *quantity)
        }
        GameEvent::RemoveItem { name } => apply_remove_item(&mut new_state, name),
        GameEvent::AddDish { dish } => apply_add_dish(&mut new_state, dish),
        GameEvent::RemoveDish { name } => apply_remove_dish(&mut new_state, name),
        GameEvent::SetDishPrice { name, price } => {
            apply_set_dish_price(&mut new_state, name, *price)
        }
        GameEvent::HireEmployees { count } => apply_hire(&mut new_state, *count),
        GameEvent::FireEmployees { count } => apply_fire(&mut new_state, *count),
        GameEvent::OfferLoans { offers } => apply_offer_loans(&mut new_state, offers),
        GameEvent::AcceptLoan { name } => apply_accept_loan(&mut new_state, name),
        GameEvent::AdvanceWeek { orders } => apply_advance_week(&mut new_state, orders),
    }?;

    result.event_type = event.event_type().to_string();
    result.balance_delta = checked_sub(new_state.balance, state.balance)?;

    Ok((new_state, result))
}

// ---------------------------------------------------------------------------
// Individual transition handlers (private)
// ---------------------------------------------------------------------------

fn apply_initialize_constants(
    state: &mut GameState,
    constants: &GameConstants,
) -> Result<TransitionResult> {
    if constants.wage_per_employee < 0 {
        return Err(EngineError::validation("wage_per_employee must not be negative"));
    }
    if constants.loan_offer_limit < 0 {
        return Err(EngineError::validation("loan_offer_limit must not be negative"));
    }
    state.constants = constants.clone();
    Ok(TransitionResult::default())
}

fn apply_deposit(state: &mut GameState, title: &str, cents: i64) -> Result<TransitionResult> {
    validate_name("transaction", title)?;
    if cents <= 0 {
        return Err(EngineError::validation("deposit amount must be positive"));
    }
    state.record(title, cents, TransactionKind::Deposit)?;
    Ok(TransitionResult::default())
}

fn apply_withdraw(state: &mut GameState, title: &str, cents: i64) -> Result<TransitionResult> {
    validate_name("transaction", title)?;
    if cents <= 0 {
        return Err(EngineError::validation("withdrawal amount must be positive"));
    }
    require_funds(state, cents)?;
    state.record(title, -cents, TransactionKind::Deposit)?;
    Ok(TransitionResult::default())
}

fn apply_stock_item(state: &mut GameState, item: &Item) -> Result<TransitionResult> {
    validate_item(item, false)?;
    state.inventory.add(item)?;
    Ok(TransitionResult::default())
}

fn apply_buy_item(state: &mut GameState, item: &Item) -> Result<TransitionResult> {
    validate_item(item, true)?;
    require_funds(state, item.price)?;
    state.inventory.add(item)?;
    state.record(item.to_string(), -item.price, TransactionKind::Purchase)?;
    Ok(TransitionResult::default())
}

fn apply_discard_item(state: &mut GameState, name: &str, quantity: i64) -> Result<TransitionResult> {
    if quantity <= 0 {
        return Err(EngineError::validation("discarded quantity must be positive"));
    }
    let item = state
        .inventory
        .get_mut(name)
        .ok_or_else(|| EngineError::UnknownItem(name.to_string()))?;
    let written_off = item.consume(quantity, CostOrder::LowestFirst)?;
    Ok(TransitionResult {
        cost_of_goods: written_off,
        ..Default::default()
    })
}

fn apply_remove_item(state: &mut GameState, name: &str) -> Result<TransitionResult> {
    if let Some(dish) = state.dishes.dish_using(name) {
        return Err(EngineError::ItemInUse {
            item: name.to_string(),
            dish: dish.name.clone(),
        });
    }
    state.inventory.remove(name)?;
    Ok(TransitionResult::default())
}

fn apply_add_dish(state: &mut GameState, dish: &Dish) -> Result<TransitionResult> {
    validate_name("dish", &dish.name)?;
    if dish.price < 0 {
        return Err(EngineError::validation("dish price must not be negative"));
    }
    if dish.ingredients.is_empty() {
        return Err(EngineError::validation(format!(
            "dish {:?} needs at least one ingredient",
            dish.name
        )));
    }

    let mut seen = BTreeSet::new();
    for ingredient in &dish.ingredients {
        validate_name("item", &ingredient.name)?;
        validate_name("unit", &ingredient.unit)?;
        if ingredient.quantity <= 0 {
            return Err(EngineError::validation(format!(
                "dish {:?} must use a positive quantity of {:?}",
                dish.name, ingredient.name
            )));
        }
        if !seen.insert(ingredient.name.as_str()) {
            return Err(EngineError::validation(format!(
                "dish {:?} lists {:?} twice",
                dish.name, ingredient.name
            )));
        }
        // Unknown ingredients get an empty inventory entry.
        state.inventory.ensure_entry(&ingredient.name, &ingredient.unit)?;
    }

    state.dishes.add(dish.clone())?;
    Ok(TransitionResult::default())
}

fn apply_remove_dish(state: &mut GameState, name: &str) -> Result<TransitionResult> {
    state.dishes.remove(name)?;
    Ok(TransitionResult::default())
}

fn apply_set_dish_price(state: &mut GameState, name: &str, price: i64) -> Result<TransitionResult> {
    if price < 0 {
        return Err(EngineError::validation("dish price must not be negative"));
    }
    let dish = state
        .dishes
        .get_mut(name)
        .ok_or_else(|| EngineError::UnknownDish(name.to_string()))?;
    dish.price = price;
    Ok(TransitionResult::default())
}

fn apply_hire(state: &mut GameState, count: i64) -> Result<TransitionResult> {
    if count <= 0 {
        return Err(EngineError::validation("number of employees to hire must be positive"));
    }
    state.employee_count = checked_add(state.employee_count, count)?;
    Ok(TransitionResult::default())
}

fn apply_fire(state: &mut GameState, count: i64) -> Result<TransitionResult> {
    if count <= 0 {
        return Err(EngineError::validation("number of employees to let go must be positive"));
    }
    if count > state.employee_count {
        return Err(EngineError::NotEnoughEmployees {
            requested: count,
            employed: state.employee_count,
        });
    }
    state.employee_count -= count;
    Ok(TransitionResult::default())
}

fn apply_offer_loans(state: &mut GameState, offers: &[Loan]) -> Result<TransitionResult> {
    if offers.len() as i64 > state.constants.loan_offer_limit {
        return Err(EngineError::validation(format!(
            "{} loans offered, at most {} allowed",
            offers.len(),
            state.constants.loan_offer_limit
        )));
    }

    let mut menu = BTreeMap::new();
    for offer in offers {
        // Derived fields must match a freshly issued loan.
        let fresh = Loan::new(
            &offer.name,
            offer.term_years,
            offer.amount,
            offer.rate,
            offer.interest,
            offer.payback,
            offer.requirements.clone(),
        )?;
        if &fresh != offer {
            return Err(EngineError::validation(format!(
                "loan offer {:?} has inconsistent balance or schedule",
                offer.name
            )));
        }
        if menu.insert(offer.name.clone(), fresh).is_some() {
            return Err(EngineError::DuplicateLoan(offer.name.clone()));
        }
    }

    state.loan_offers = menu;
    Ok(TransitionResult::default())
}

fn apply_accept_loan(state: &mut GameState, name: &str) -> Result<TransitionResult> {
    let offer = state
        .loan_offers
        .get(name)
        .ok_or_else(|| EngineError::UnknownLoan(name.to_string()))?;
    if state.loans.contains_key(name) {
        return Err(EngineError::DuplicateLoan(name.to_string()));
    }
    if !offer.check(&state.metrics()) {
        return Err(EngineError::RequirementsNotMet(name.to_string()));
    }

    let loan = state
        .loan_offers
        .remove(name)
        .ok_or_else(|| EngineError::UnknownLoan(name.to_string()))?;

    if loan.is_subsidy() {
        state.record(format!("Subsidy: {}", loan.name), loan.amount, TransactionKind::Subsidy)?;
    } else {
        state.record(format!("Loan: {}", loan.name), loan.amount, TransactionKind::Loan)?;
        state.loans.insert(loan.name.clone(), loan);
    }
    Ok(TransitionResult::default())
}

fn apply_advance_week(
    state: &mut GameState,
    orders: &BTreeMap<String, i64>,
) -> Result<TransitionResult> {
    let mut result = TransitionResult::default();

    // -- 1. Sales --
    for (dish_name, &requested) in orders {
        if requested < 0 {
            return Err(EngineError::validation(format!(
                "negative order count for {:?}",
                dish_name
            )));
        }
        let dish = state
            .dishes
            .get(dish_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDish(dish_name.clone()))?;

        let served = requested.min(servings_available(&dish, &state.inventory)?);
        if served < requested {
            result.missed.insert(dish.name.clone(), requested - served);
        }
        if served == 0 {
            continue;
        }

        for ingredient in &dish.ingredients {
            let needed = checked_mul(ingredient.quantity, served)?;
            let item = state
                .inventory
                .get_mut(&ingredient.name)
                .ok_or_else(|| EngineError::UnknownItem(ingredient.name.clone()))?;
            let cost = item.consume(needed, CostOrder::LowestFirst)?;
            result.cost_of_goods = checked_add(result.cost_of_goods, cost)?;
        }

        let revenue = checked_mul(dish.price, served)?;
        state.record(format!("Sold {} {}", served, dish.name), revenue, TransactionKind::Sales)?;
        result.revenue = checked_add(result.revenue, revenue)?;
        result.served.insert(dish.name.clone(), served);
    }

    // -- 2. Payroll --
    let payroll = checked_mul(state.employee_count, state.constants.wage_per_employee)?;
    if payroll > 0 {
        state.record(
            format!(
                "Payroll ({} {})",
                state.employee_count,
                plural("employee", state.employee_count)
            ),
            -payroll,
            TransactionKind::Payroll,
        )?;
        result.payroll = payroll;
    }

    // -- 3. Loan installments --
    let names: Vec<String> = state.loans.keys().cloned().collect();
    for name in names {
        let payment = {
            let loan = state
                .loans
                .get_mut(&name)
                .ok_or_else(|| EngineError::UnknownLoan(name.clone()))?;
            loan.remaining_weeks = (loan.remaining_weeks - 1).max(0);
            if !loan.payment_due() {
                continue;
            }
            let payment = loan.next_payment()?;
            loan.outstanding = checked_sub(loan.outstanding, payment)?;
            payment
        };

        if payment > 0 {
            state.record(format!("Loan payment: {}", name), -payment, TransactionKind::Repayment)?;
            result.repayments = checked_add(result.repayments, payment)?;
        }

        let settled = state.loans.get(&name).is_some_and(|l| l.outstanding <= 0);
        if settled {
            state.loans.remove(&name);
            result.loans_settled.push(name);
        }
    }

    // -- 4. Calendar --
    state.total_weeks = checked_add(state.total_weeks, 1)?;

    Ok(result)
}

// ---------------------------------------------------------------------------
// Helpers (private)
// ---------------------------------------------------------------------------

fn validate_item(item: &Item, purchase: bool) -> Result<()> {
    validate_name("item", &item.name)?;
    validate_name("unit", &item.unit)?;
    if item.quantity < 0 || (purchase && item.quantity == 0) {
        return Err(EngineError::validation(format!(
            "invalid quantity {} for {:?}",
            item.quantity, item.name
        )));
    }
    if item.price < 0 {
        return Err(EngineError::validation(format!(
            "price of {:?} must not be negative",
            item.name
        )));
    }
    Ok(())
}

fn require_funds(state: &GameState, cents: i64) -> Result<()> {
    if cents > state.balance {
        return Err(EngineError::InsufficientFunds {
            needed: cents,
            balance: state.balance,
        });
    }
    Ok(())
}
