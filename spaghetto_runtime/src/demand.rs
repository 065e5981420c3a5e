//! Weekly demand simulation.
//!
//! Rolls how many servings of each dish customers order in a week.
//! The result becomes the payload of an `advance_week` event, so the
//! engine itself never sees randomness.

use std::collections::BTreeMap;

use rand::Rng;

use spaghetto_engine::domain::{Dish, GameState};
use spaghetto_engine::menu::cost_of_dish;

use crate::config::EconomyConfig;
use crate::error::Result;

/// Dishes priced above this multiple of their ingredient cost lose customers.
pub const FAIR_MARKUP: i64 = 3;

/// Parameters of the demand roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemandModel {
    /// Weekly customers each employee can serve.
    pub customers_per_employee: i64,
    /// Percent variation either way.
    pub jitter: i64,
}

impl From<&EconomyConfig> for DemandModel {
    fn from(economy: &EconomyConfig) -> Self {
        Self {
            customers_per_employee: economy.customers_per_employee,
            jitter: economy.demand_jitter,
        }
    }
}

impl DemandModel {
    /// Customers expected in a week before pricing and variance.
    /// The owner serves alone when nobody is employed.
    pub fn base_customers(&self, employee_count: i64) -> i64 {
        employee_count.max(1).saturating_mul(self.customers_per_employee)
    }

    /// Roll this week's orders for every dish on the menu.
    pub fn weekly_orders<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        state: &GameState,
    ) -> Result<BTreeMap<String, i64>> {
        let mut orders = BTreeMap::new();
        let dish_count = state.dishes.len() as i64;
        if dish_count == 0 {
            return Ok(orders);
        }

        let base = self.base_customers(state.employee_count);
        for (index, dish) in state.dishes.iter().enumerate() {
            // Spread customers evenly, remainder to the first dishes.
            let mut share = base / dish_count;
            if (index as i64) < base % dish_count {
                share += 1;
            }
            let expected = apply_price_sensitivity(share, dish, state)?;
            let rolled = self.jittered(rng, expected);
            orders.insert(dish.name.clone(), rolled);
        }
        Ok(orders)
    }

    fn jittered<R: Rng + ?Sized>(&self, rng: &mut R, expected: i64) -> i64 {
        if self.jitter == 0 || expected == 0 {
            return expected;
        }
        let percent = rng.random_range(-self.jitter..=self.jitter);
        let scaled = expected as i128 * (100 + percent) as i128 / 100;
        i64::try_from(scaled.max(0)).unwrap_or(i64::MAX)
    }
}

/// Scale `customers` down when a dish is priced above a fair markup
/// on its average ingredient cost.
fn apply_price_sensitivity(customers: i64, dish: &Dish, state: &GameState) -> Result<i64> {
    let cost = cost_of_dish(dish, &state.inventory, 1, true)?;
    let fair_price = FAIR_MARKUP as i128 * cost as i128;
    if cost <= 0 || dish.price as i128 <= fair_price {
        return Ok(customers);
    }
    // fair_price < price, so the scaled count never exceeds `customers`
    Ok((customers as i128 * fair_price / dish.price as i128) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use spaghetto_engine::domain::{Ingredient, Item};

    fn trattoria(price: i64) -> GameState {
        let mut s = GameState::default();
        s.inventory
            .add(&Item {
                name: "Penne".into(),
                quantity: 1_000,
                unit: "gram".into(),
                price: 1_000,
            })
            .unwrap();
        for name in ["Penne Arrabbiata", "Penne Pesto"] {
            s.dishes
                .add(Dish {
                    name: name.into(),
                    price,
                    ingredients: vec![Ingredient {
                        name: "Penne".into(),
                        quantity: 100,
                        unit: "gram".into(),
                    }],
                })
                .unwrap();
        }
        s
    }

    fn steady(customers: i64) -> DemandModel {
        DemandModel {
            customers_per_employee: customers,
            jitter: 0,
        }
    }

    #[test]
    fn customers_split_across_menu() {
        let mut rng = StdRng::seed_from_u64(1);
        let orders = steady(61).weekly_orders(&mut rng, &trattoria(300)).unwrap();
        assert_eq!(orders["Penne Arrabbiata"], 31);
        assert_eq!(orders["Penne Pesto"], 30);
    }

    #[test]
    fn overpriced_dishes_lose_customers() {
        let mut rng = StdRng::seed_from_u64(1);
        // 100g of penne costs $1.00; $6.00 is twice the fair price
        let orders = steady(60).weekly_orders(&mut rng, &trattoria(600)).unwrap();
        assert_eq!(orders["Penne Pesto"], 15);
    }

    #[test]
    fn same_seed_same_orders() {
        let model = DemandModel {
            customers_per_employee: 80,
            jitter: 25,
        };
        let state = trattoria(300);
        let a = model.weekly_orders(&mut StdRng::seed_from_u64(42), &state).unwrap();
        let b = model.weekly_orders(&mut StdRng::seed_from_u64(42), &state).unwrap();
        assert_eq!(a, b);
        for n in a.values() {
            assert!((30..=50).contains(n));
        }
    }

    #[test]
    fn huge_crowds_do_not_overflow() {
        let model = DemandModel {
            customers_per_employee: i64::MAX / 2,
            jitter: 100,
        };
        let mut state = trattoria(300);
        state.employee_count = 4;
        let orders = model.weekly_orders(&mut StdRng::seed_from_u64(7), &state).unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.values().all(|n| *n >= 0));
    }

    #[test]
    fn empty_menu_has_no_orders() {
        let mut rng = StdRng::seed_from_u64(3);
        let orders = steady(60).weekly_orders(&mut rng, &GameState::default()).unwrap();
        assert!(orders.is_empty());
    }
}
