//! Procedural loan market.
//!
//! Generates the loans and subsidies a bank lists for the business.
//! Offers are rolled here and handed to the engine in an
//! `offer_loans` event.

use std::collections::BTreeSet;

use rand::seq::IndexedRandom;
use rand::Rng;

use spaghetto_engine::domain::BusinessMetrics;
use spaghetto_engine::loans::{
    InterestKind, Loan, LoanRequirement, PaybackSchedule, RequirementKind,
};

use crate::error::Result;

/// Longest term the market offers, years.
pub const MAX_OFFER_TERM: i64 = 10;

const LENDERS: &[&str] = &[
    "Piazza", "Fontana", "Vesuvio", "Tuscan", "Golden Fork", "Olive Grove", "Harbor",
    "Main Street", "Riverside", "Old Mill",
];

const LENDER_KINDS: &[&str] = &["Bank", "Credit Union", "Capital", "Trust", "Lending"];

const GRANTORS: &[&str] = &[
    "City Small Business",
    "Regional Hospitality",
    "Culinary Heritage",
    "Main Street Revival",
    "Green Kitchen",
];

const INTEREST_KINDS: &[InterestKind] = &[
    InterestKind::Simple,
    InterestKind::CompoundAnnually,
    InterestKind::CompoundMonthly,
    InterestKind::CompoundBiweekly,
    InterestKind::CompoundWeekly,
];

const PAYBACK_SCHEDULES: &[PaybackSchedule] = &[
    PaybackSchedule::Weekly,
    PaybackSchedule::Biweekly,
    PaybackSchedule::Monthly,
    PaybackSchedule::Annually,
];

const REQUIREMENT_KINDS: &[RequirementKind] = &[
    RequirementKind::MonthlyRevenue,
    RequirementKind::MonthlyExpense,
    RequirementKind::Employees,
];

/// Generate up to `count` offers with unique names. Fewer are returned
/// only when the name pool runs dry.
pub fn generate_offers<R: Rng + ?Sized>(
    rng: &mut R,
    metrics: &BusinessMetrics,
    count: usize,
) -> Result<Vec<Loan>> {
    let mut names = BTreeSet::new();
    let mut offers = Vec::with_capacity(count);
    let mut attempts = count.saturating_mul(20).saturating_add(100);
    while offers.len() < count && attempts > 0 {
        attempts -= 1;
        let offer = generate_offer(rng, metrics)?;
        if names.insert(offer.name.clone()) {
            offers.push(offer);
        }
    }
    Ok(offers)
}

/// Generate a single loan or subsidy.
pub fn generate_offer<R: Rng + ?Sized>(rng: &mut R, metrics: &BusinessMetrics) -> Result<Loan> {
    let term_years = rng.random_range(0..=MAX_OFFER_TERM);
    let requirements = generate_requirements(rng, metrics);

    let loan = if term_years == 0 {
        let name = format!("{} Grant", pick(rng, GRANTORS));
        // $1,000 – $20,000 in $100 steps
        let amount = rng.random_range(10..=200) * 10_000;
        Loan::new(
            &name,
            0,
            amount,
            0,
            InterestKind::Simple,
            PaybackSchedule::Monthly,
            requirements,
        )?
    } else {
        let name = format!("{} {}", pick(rng, LENDERS), pick(rng, LENDER_KINDS));
        // $5,000 – $150,000 in $500 steps
        let amount = rng.random_range(10..=300) * 50_000;
        // 2% – 15% in quarter-point steps
        let rate = rng.random_range(8..=60) * 25;
        let interest = *pick(rng, INTEREST_KINDS);
        let payback = *pick(rng, PAYBACK_SCHEDULES);
        Loan::new(&name, term_years, amount, rate, interest, payback, requirements)?
    };
    Ok(loan)
}

/// Zero to two requirements of distinct kinds, bracketing the current
/// figures so some offers are within reach and some are not.
fn generate_requirements<R: Rng + ?Sized>(
    rng: &mut R,
    metrics: &BusinessMetrics,
) -> Vec<LoanRequirement> {
    let count = rng.random_range(0..=2);
    let mut kinds: Vec<RequirementKind> = REQUIREMENT_KINDS
        .choose_multiple(rng, count)
        .copied()
        .collect();
    kinds.sort_by_key(|k| REQUIREMENT_KINDS.iter().position(|x| x == k));

    kinds
        .into_iter()
        .map(|kind| {
            let current = match kind {
                RequirementKind::MonthlyRevenue => metrics.monthly_revenue,
                RequirementKind::MonthlyExpense => metrics.monthly_expense,
                RequirementKind::Employees => metrics.employee_count,
            };
            bracket(rng, kind, current)
        })
        .collect()
}

fn bracket<R: Rng + ?Sized>(rng: &mut R, kind: RequirementKind, current: i64) -> LoanRequirement {
    match kind {
        RequirementKind::Employees => {
            let min = (current + rng.random_range(-2..=2)).max(1);
            LoanRequirement {
                kind,
                min: Some(min),
                max: None,
            }
        }
        RequirementKind::MonthlyRevenue => {
            // At least 50% – 150% of current revenue, in whole dollars
            let floor = current.max(100_000);
            let min = floor / 100 * rng.random_range(50..=150) / 100 * 100;
            LoanRequirement {
                kind,
                min: Some(min),
                max: None,
            }
        }
        RequirementKind::MonthlyExpense => {
            // Spending capped at 80% – 200% of current expenses
            let ceiling = current.max(100_000);
            let max = ceiling / 100 * rng.random_range(80..=200) / 100 * 100;
            LoanRequirement {
                kind,
                min: None,
                max: Some(max),
            }
        }
    }
}

fn pick<'a, R: Rng + ?Sized, T>(rng: &mut R, options: &'a [T]) -> &'a T {
    // options are non-empty constants
    &options[rng.random_range(0..options.len())]
}
