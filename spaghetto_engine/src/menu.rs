/// Spaghetto Engine — Dish Menu
///
/// Dishes name the ingredient quantities one serving consumes.
/// Costing reads the inventory; it never mutates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{checked_add, checked_mul, mul_div_round, SCALE};
use crate::domain::Dish;
use crate::error::{EngineError, Result};
use crate::inventory::{fuzzy_match, CostOrder, Inventory};

/// The restaurant's dishes, keyed by unique name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DishMenu {
    pub dishes: BTreeMap<String, Dish>,
}

impl DishMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dish. Names are unique.
    pub fn add(&mut self, dish: Dish) -> Result<()> {
        if self.dishes.contains_key(&dish.name) {
            return Err(EngineError::DuplicateDish(dish.name));
        }
        self.dishes.insert(dish.name.clone(), dish);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Dish> {
        self.dishes
            .remove(name)
            .ok_or_else(|| EngineError::UnknownDish(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Dish> {
        self.dishes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Dish> {
        self.dishes.get_mut(name)
    }

    pub fn find(&self, key: &str) -> Option<&Dish> {
        fuzzy_match(key, self.dishes.keys().map(String::as_str)).and_then(|n| self.dishes.get(n))
    }

    /// 1-based numbering of dishes in name order, as shown in menus.
    pub fn numbered(&self) -> Vec<(usize, &Dish)> {
        self.dishes.values().enumerate().map(|(i, d)| (i + 1, d)).collect()
    }

    /// Look a dish up by its menu number or by (fuzzy) name.
    pub fn lookup(&self, s: &str) -> Option<&Dish> {
        let s = s.trim();
        match s.parse::<usize>() {
            Ok(index) if index >= 1 => self.dishes.values().nth(index - 1),
            Ok(_) => None,
            Err(_) => self.find(s),
        }
    }

    /// The first dish using `item`, if any.
    pub fn dish_using(&self, item: &str) -> Option<&Dish> {
        self.dishes
            .values()
            .find(|d| d.ingredients.iter().any(|i| i.name == item))
    }

    pub fn len(&self) -> usize {
        self.dishes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dishes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dish> {
        self.dishes.values()
    }
}

/// Cost in cents of producing `servings` of `dish` from current stock.
///
/// With `average`, every unit is costed at its item's average unit cost
/// and stock levels are ignored. Otherwise the cheapest lots are costed
/// first, and the stock must cover the servings.
pub fn cost_of_dish(dish: &Dish, inventory: &Inventory, servings: i64, average: bool) -> Result<i64> {
    let mut total = 0i64;
    for ingredient in &dish.ingredients {
        let item = inventory
            .get(&ingredient.name)
            .ok_or_else(|| EngineError::UnknownItem(ingredient.name.clone()))?;
        let needed = checked_mul(ingredient.quantity, servings)?;
        let cost = if average {
            mul_div_round(item.average_unit_cost()?, needed, SCALE)?
        } else {
            item.cost_of(needed, CostOrder::LowestFirst)?
        };
        total = checked_add(total, cost)?;
    }
    Ok(total)
}

/// How many servings of `dish` the current stock supports.
pub fn servings_available(dish: &Dish, inventory: &Inventory) -> Result<i64> {
    let mut servings: Option<i64> = None;
    for ingredient in &dish.ingredients {
        let supported = match inventory.get(&ingredient.name) {
            Some(item) if ingredient.quantity > 0 => item.quantity()? / ingredient.quantity,
            Some(_) => i64::MAX,
            None => 0,
        };
        servings = Some(servings.map_or(supported, |s| s.min(supported)));
    }
    Ok(servings.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ingredient, Item};

    fn dish(name: &str, price: i64, ingredients: &[(&str, i64, &str)]) -> Dish {
        Dish {
            name: name.to_string(),
            price,
            ingredients: ingredients
                .iter()
                .map(|(n, q, u)| Ingredient {
                    name: n.to_string(),
                    quantity: *q,
                    unit: u.to_string(),
                })
                .collect(),
        }
    }

    fn stocked() -> Inventory {
        let mut inv = Inventory::new();
        for (name, quantity, unit, price) in [
            ("Spaghetti", 1000, "gram", 500),
            ("Spaghetti", 1000, "gram", 1000),
            ("Egg", 12, "egg", 600),
        ] {
            inv.add(&Item {
                name: name.to_string(),
                quantity,
                unit: unit.to_string(),
                price,
            })
            .unwrap();
        }
        inv
    }

    #[test]
    fn duplicate_dishes_are_rejected() {
        let mut menu = DishMenu::new();
        menu.add(dish("Carbonara", 1500, &[("Egg", 2, "egg")])).unwrap();
        let err = menu.add(dish("Carbonara", 900, &[])).unwrap_err();
        assert_eq!(err, EngineError::DuplicateDish("Carbonara".into()));
    }

    #[test]
    fn lookup_by_index_or_name() {
        let mut menu = DishMenu::new();
        menu.add(dish("Carbonara", 1500, &[])).unwrap();
        menu.add(dish("Aglio e Olio", 1200, &[])).unwrap();
        assert_eq!(menu.lookup("1").unwrap().name, "Aglio e Olio");
        assert_eq!(menu.lookup("2").unwrap().name, "Carbonara");
        assert!(menu.lookup("0").is_none());
        assert!(menu.lookup("3").is_none());
        assert_eq!(menu.lookup("carb").unwrap().name, "Carbonara");
        let numbers: Vec<usize> = menu.numbered().iter().map(|(i, _)| *i).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn dish_cost_lowest_first_and_average() {
        let inv = stocked();
        let carbonara = dish("Carbonara", 1500, &[("Spaghetti", 200, "gram"), ("Egg", 2, "egg")]);
        // 200g at 0.5c + 2 eggs at 50c
        assert_eq!(cost_of_dish(&carbonara, &inv, 1, false).unwrap(), 100 + 100);
        // average spaghetti cost is 0.75c/g
        assert_eq!(cost_of_dish(&carbonara, &inv, 1, true).unwrap(), 150 + 100);
        // 6 servings: 1000g cheap + 200g dear, 12 eggs
        assert_eq!(cost_of_dish(&carbonara, &inv, 6, false).unwrap(), 500 + 200 + 600);
    }

    #[test]
    fn servings_limited_by_scarcest_ingredient() {
        let inv = stocked();
        let carbonara = dish("Carbonara", 1500, &[("Spaghetti", 200, "gram"), ("Egg", 2, "egg")]);
        assert_eq!(servings_available(&carbonara, &inv).unwrap(), 6);
        let mystery = dish("Mystery", 100, &[("Truffle", 1, "gram")]);
        assert_eq!(servings_available(&mystery, &inv).unwrap(), 0);
        assert!(cost_of_dish(&mystery, &inv, 1, true).is_err());
    }
}
