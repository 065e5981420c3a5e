/// Spaghetto Engine — Core Domain Types
///
/// Mostly data. Money values are i64 cents; fractional values are
/// i64 fixed-point (SCALE = 10_000).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, plural, WEEKS_PER_MONTH, WEEKS_PER_YEAR};
use crate::error::Result;
use crate::inventory::Inventory;
use crate::loans::Loan;
use crate::menu::DishMenu;

// ── Purchases and dishes ───────────────────────────────────────────

/// A purchase of `quantity` units of an ingredient for `price` cents total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub price: i64,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} of {}",
            self.quantity,
            plural(&self.unit, self.quantity),
            self.name
        )
    }
}

/// Quantity of an inventory item consumed by one serving of a dish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ingredient {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} of {}",
            self.quantity,
            plural(&self.unit, self.quantity),
            self.name
        )
    }
}

/// A menu item: its sale price in cents and what one serving consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dish {
    pub name: String,
    pub price: i64,
    pub ingredients: Vec<Ingredient>,
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ── Ledger ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Owner deposits and withdrawals.
    Deposit,
    /// Stocking inventory.
    Purchase,
    /// Revenue from dishes served.
    Sales,
    /// Weekly wages.
    Payroll,
    /// Loan principal received.
    Loan,
    /// Subsidy received.
    Subsidy,
    /// Loan payments.
    Repayment,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Sales => "sales",
            TransactionKind::Payroll => "payroll",
            TransactionKind::Loan => "loan",
            TransactionKind::Subsidy => "subsidy",
            TransactionKind::Repayment => "repayment",
        };
        f.write_str(s)
    }
}

/// One change to the balance. Positive cents are income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    pub title: String,
    pub cents: i64,
    pub week: i64,
    pub kind: TransactionKind,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} : {}",
            crate::arithmetic::format_week(self.week),
            crate::arithmetic::format_cents(self.cents),
            self.title
        )
    }
}

// ── Constants and metrics ──────────────────────────────────────────

/// Economy constants — injected via the initialize_constants event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameConstants {
    /// Weekly wage per employee, cents.
    pub wage_per_employee: i64,
    /// Most loans the bank will list at once.
    pub loan_offer_limit: i64,
}

impl Default for GameConstants {
    fn default() -> Self {
        Self {
            wage_per_employee: 40_000,
            loan_offer_limit: 8,
        }
    }
}

/// The figures lenders look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BusinessMetrics {
    pub monthly_revenue: i64,
    pub monthly_expense: i64,
    pub employee_count: i64,
}

// ── Transition outcome ─────────────────────────────────────────────

/// Structured outcome of a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransitionResult {
    pub event_type: String,
    /// Servings sold per dish.
    pub served: BTreeMap<String, i64>,
    /// Orders that could not be filled for lack of stock, per dish.
    pub missed: BTreeMap<String, i64>,
    pub revenue: i64,
    /// Ingredient cost of what was served or discarded.
    pub cost_of_goods: i64,
    pub payroll: i64,
    pub repayments: i64,
    /// Loans fully repaid by this transition.
    pub loans_settled: Vec<String>,
    /// Change in balance, cents.
    pub balance_delta: i64,
}

// ── State ──────────────────────────────────────────────────────────

/// Complete game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameState {
    pub balance: i64,
    pub inventory: Inventory,
    pub dishes: DishMenu,
    pub transactions: Vec<Transaction>,
    pub employee_count: i64,
    pub total_weeks: i64,
    /// Loans being repaid.
    pub loans: BTreeMap<String, Loan>,
    /// Loans and subsidies the business may accept.
    pub loan_offers: BTreeMap<String, Loan>,
    pub constants: GameConstants,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            balance: 0,
            inventory: Inventory::new(),
            dishes: DishMenu::new(),
            transactions: Vec::new(),
            employee_count: 0,
            total_weeks: 0,
            loans: BTreeMap::new(),
            loan_offers: BTreeMap::new(),
            constants: GameConstants::default(),
        }
    }
}

impl GameState {
    /// Month of the year, 0-based.
    pub fn month(&self) -> i64 {
        self.total_weeks / WEEKS_PER_MONTH % 12
    }

    /// Week of the month, 0-based.
    pub fn week(&self) -> i64 {
        self.total_weeks % WEEKS_PER_MONTH
    }

    /// Year, 0-based.
    pub fn year(&self) -> i64 {
        self.total_weeks / WEEKS_PER_YEAR
    }

    /// Record a transaction dated the current week and apply it to the balance.
    pub fn record(&mut self, title: impl Into<String>, cents: i64, kind: TransactionKind) -> Result<()> {
        self.balance = checked_add(self.balance, cents)?;
        self.transactions.push(Transaction {
            title: title.into(),
            cents,
            week: self.total_weeks,
            kind,
        });
        Ok(())
    }

    /// Transactions sorted by week, only those at or after `after`,
    /// passing `filter`, keeping the most recent `limit`.
    pub fn get_transactions(
        &self,
        limit: Option<usize>,
        after: Option<i64>,
        filter: impl Fn(&Transaction) -> bool,
    ) -> Vec<&Transaction> {
        let mut query: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|t| after.map_or(true, |after| t.week >= after))
            .filter(|t| filter(*t))
            .collect();
        query.sort_by_key(|t| t.week);
        if let Some(limit) = limit {
            let skip = query.len().saturating_sub(limit);
            query.drain(..skip);
        }
        query
    }

    /// Number of months the averages are taken over (at least one).
    pub fn elapsed_months(&self) -> i64 {
        (self.total_weeks / WEEKS_PER_MONTH).max(1)
    }

    /// Average sales revenue per elapsed month, cents.
    pub fn monthly_revenue(&self) -> i64 {
        let total: i64 = self
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Sales)
            .map(|t| t.cents)
            .sum();
        total / self.elapsed_months()
    }

    /// Average operating spending per elapsed month, as a positive number of cents.
    pub fn monthly_expense(&self) -> i64 {
        let total: i64 = self
            .transactions
            .iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    TransactionKind::Purchase | TransactionKind::Payroll | TransactionKind::Repayment
                )
            })
            .map(|t| -t.cents)
            .sum();
        total / self.elapsed_months()
    }

    pub fn metrics(&self) -> BusinessMetrics {
        BusinessMetrics {
            monthly_revenue: self.monthly_revenue(),
            monthly_expense: self.monthly_expense(),
            employee_count: self.employee_count,
        }
    }
}
