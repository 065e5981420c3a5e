/// Spaghetto Engine — Loans and Subsidies
///
/// A loan with a term of zero years is a subsidy: its amount is granted
/// once and never repaid. Rates are i64 fixed-point (SCALE = 10_000).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{
    checked_add, checked_mul, checked_sub, div_ceil, format_cents, mul_div_round,
    validate_name, SCALE, WEEKS_PER_YEAR,
};
use crate::domain::BusinessMetrics;
use crate::error::{EngineError, Result};

/// Longest term a loan may be offered with.
pub const MAX_TERM_YEARS: i64 = 30;

/// How often a loan is paid back. The value is the number of weeks
/// between payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaybackSchedule {
    Weekly,
    Biweekly,
    Monthly,
    Annually,
}

impl PaybackSchedule {
    pub fn weeks(self) -> i64 {
        match self {
            PaybackSchedule::Weekly => 1,
            PaybackSchedule::Biweekly => 2,
            PaybackSchedule::Monthly => 4,
            PaybackSchedule::Annually => 48,
        }
    }
}

impl fmt::Display for PaybackSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaybackSchedule::Weekly => "weekly",
            PaybackSchedule::Biweekly => "biweekly",
            PaybackSchedule::Monthly => "monthly",
            PaybackSchedule::Annually => "annually",
        };
        f.write_str(s)
    }
}

/// How interest accrues. Compound variants carry their number of
/// compounding periods per game year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestKind {
    Simple,
    CompoundAnnually,
    CompoundMonthly,
    CompoundBiweekly,
    CompoundWeekly,
}

impl InterestKind {
    /// Compounding periods per year; 0 for simple interest.
    pub fn periods_per_year(self) -> i64 {
        match self {
            InterestKind::Simple => 0,
            InterestKind::CompoundAnnually => 1,
            InterestKind::CompoundMonthly => 12,
            InterestKind::CompoundBiweekly => 24,
            InterestKind::CompoundWeekly => 48,
        }
    }

    /// `"annually"`, `"monthly"`... for compound interest, empty for simple.
    pub fn frequency(self) -> &'static str {
        match self {
            InterestKind::Simple => "",
            InterestKind::CompoundAnnually => "annually",
            InterestKind::CompoundMonthly => "monthly",
            InterestKind::CompoundBiweekly => "biweekly",
            InterestKind::CompoundWeekly => "weekly",
        }
    }
}

impl fmt::Display for InterestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterestKind::Simple => f.write_str("simple"),
            other => write!(f, "{} compounded", other.frequency()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    MonthlyRevenue,
    MonthlyExpense,
    Employees,
}

/// A bound a business must satisfy to qualify for a loan.
/// Both ends are inclusive; `None` leaves that end open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoanRequirement {
    pub kind: RequirementKind,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl LoanRequirement {
    pub fn check(&self, metrics: &BusinessMetrics) -> bool {
        let value = match self.kind {
            RequirementKind::MonthlyRevenue => metrics.monthly_revenue,
            RequirementKind::MonthlyExpense => metrics.monthly_expense,
            RequirementKind::Employees => metrics.employee_count,
        };
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn format_bound(&self, v: i64) -> String {
        match self.kind {
            RequirementKind::Employees => v.to_string(),
            _ => format_cents(v),
        }
    }

    fn format_range(&self) -> String {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => format!("{}-{}", self.format_bound(lo), self.format_bound(hi)),
            (Some(lo), None) => format!("at least {}", self.format_bound(lo)),
            (None, Some(hi)) => format!("at most {}", self.format_bound(hi)),
            (None, None) => "any amount".to_string(),
        }
    }
}

impl fmt::Display for LoanRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = self.format_range();
        match self.kind {
            RequirementKind::MonthlyRevenue => write!(f, "{} in average revenue per month", range),
            RequirementKind::MonthlyExpense => write!(f, "{} in average expenses per month", range),
            RequirementKind::Employees => {
                let people = match (self.min, self.max) {
                    (Some(1), Some(1)) | (None, Some(1)) => "person",
                    _ => "people",
                };
                write!(f, "employs {} {}", range, people)
            }
        }
    }
}

/// A loan or subsidy, either on offer or active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Loan {
    pub name: String,
    /// Years; 0 marks a subsidy.
    pub term_years: i64,
    /// Principal in cents.
    pub amount: i64,
    /// Annual rate, fixed-point.
    pub rate: i64,
    pub interest: InterestKind,
    pub payback: PaybackSchedule,
    pub requirements: Vec<LoanRequirement>,
    /// Cents still owed (principal + interest - payments made).
    pub outstanding: i64,
    pub remaining_weeks: i64,
}

impl Loan {
    /// Build a fresh loan; outstanding balance and schedule are derived.
    pub fn new(
        name: &str,
        term_years: i64,
        amount: i64,
        rate: i64,
        interest: InterestKind,
        payback: PaybackSchedule,
        requirements: Vec<LoanRequirement>,
    ) -> Result<Self> {
        let mut loan = Self {
            name: name.to_string(),
            term_years,
            amount,
            rate,
            interest,
            payback,
            requirements,
            outstanding: 0,
            remaining_weeks: 0,
        };
        loan.validate_offer()?;
        if !loan.is_subsidy() {
            loan.outstanding = loan.total_due()?;
            loan.remaining_weeks = checked_mul(term_years, WEEKS_PER_YEAR)?;
        }
        Ok(loan)
    }

    pub fn is_subsidy(&self) -> bool {
        self.term_years == 0
    }

    /// Interest over the whole term, in cents.
    pub fn interest_due(&self) -> Result<i64> {
        if self.is_subsidy() {
            return Ok(0);
        }
        match self.interest.periods_per_year() {
            0 => mul_div_round(self.amount, checked_mul(self.rate, self.term_years)?, SCALE),
            periods => {
                let count = checked_mul(periods, self.term_years)?;
                let divisor = checked_mul(SCALE, periods)?;
                let mut balance = self.amount;
                for _ in 0..count {
                    balance = checked_add(balance, mul_div_round(balance, self.rate, divisor)?)?;
                }
                checked_sub(balance, self.amount)
            }
        }
    }

    /// Principal plus interest.
    pub fn total_due(&self) -> Result<i64> {
        if self.is_subsidy() {
            return Ok(0);
        }
        checked_add(self.amount, self.interest_due()?)
    }

    /// Number of payments over the whole term.
    pub fn payment_count(&self) -> i64 {
        if self.is_subsidy() {
            return 0;
        }
        (self.term_years * WEEKS_PER_YEAR / self.payback.weeks()).max(1)
    }

    /// Regular payment size; the final payment may be smaller.
    pub fn normal_payment(&self) -> Result<i64> {
        if self.is_subsidy() {
            return Ok(0);
        }
        div_ceil(self.total_due()?, self.payment_count())
    }

    /// Payments still to be made, counting one due this week.
    pub fn remaining_payments(&self) -> i64 {
        if self.is_subsidy() {
            return 0;
        }
        self.remaining_weeks / self.payback.weeks()
    }

    /// Whether a payment falls on the current week (after `remaining_weeks`
    /// has been decremented for it).
    pub fn payment_due(&self) -> bool {
        !self.is_subsidy() && self.remaining_weeks % self.payback.weeks() == 0
    }

    /// Amount of the next payment. The last one settles the balance.
    pub fn next_payment(&self) -> Result<i64> {
        if self.is_subsidy() {
            return Ok(0);
        }
        if self.remaining_weeks <= 0 {
            return Ok(self.outstanding);
        }
        Ok(self.normal_payment()?.min(self.outstanding))
    }

    /// Whether a business with these metrics qualifies.
    pub fn check(&self, metrics: &BusinessMetrics) -> bool {
        self.requirements.iter().all(|r| r.check(metrics))
    }

    /// Static validation of an offered loan's terms.
    pub fn validate_offer(&self) -> Result<()> {
        validate_name("loan", &self.name)?;
        if self.amount <= 0 {
            return Err(EngineError::validation(format!(
                "loan {:?} must have a positive amount",
                self.name
            )));
        }
        if self.rate < 0 {
            return Err(EngineError::validation(format!(
                "loan {:?} has a negative rate",
                self.name
            )));
        }
        if !(0..=MAX_TERM_YEARS).contains(&self.term_years) {
            return Err(EngineError::validation(format!(
                "loan {:?} term must be between 0 and {} years",
                self.name, MAX_TERM_YEARS
            )));
        }
        for req in &self.requirements {
            if let (Some(lo), Some(hi)) = (req.min, req.max) {
                if lo > hi {
                    return Err(EngineError::validation(format!(
                        "loan {:?} has an empty requirement range",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
