/// Spaghetto Engine — Event Definitions
///
/// Events are pure data. They carry intent and payload only.
/// They contain ZERO transition logic and no randomness: the runtime
/// resolves demand and loan offers before building an event.
///
/// Schema version is locked at 1. Events with schema_version != 1
/// are rejected by the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Dish, GameConstants, Item};
use crate::error::{EngineError, Result};
use crate::loans::Loan;

/// Schema version for v1 events.
pub const SCHEMA_VERSION: u32 = 1;

/// Every way the game state can change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    InitializeConstants { constants: GameConstants },
    Deposit { title: String, cents: i64 },
    Withdraw { title: String, cents: i64 },
    /// Stock already on hand when the game starts; no money moves.
    StockItem { item: Item },
    BuyItem { item: Item },
    /// Spoilage: units are written off, cheapest first.
    DiscardItem { name: String, quantity: i64 },
    RemoveItem { name: String },
    AddDish { dish: Dish },
    RemoveDish { name: String },
    SetDishPrice { name: String, price: i64 },
    HireEmployees { count: i64 },
    FireEmployees { count: i64 },
    /// Replace the loan menu.
    OfferLoans { offers: Vec<Loan> },
    AcceptLoan { name: String },
    /// Run one week: serve `orders` (dish name → servings requested),
    /// pay wages and loan installments.
    AdvanceWeek { orders: BTreeMap<String, i64> },
}

impl GameEvent {
    /// Stable snake_case name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            GameEvent::InitializeConstants { .. } => "initialize_constants",
            GameEvent::Deposit { .. } => "deposit",
            GameEvent::Withdraw { .. } => "withdraw",
            GameEvent::StockItem { .. } => "stock_item",
            GameEvent::BuyItem { .. } => "buy_item",
            GameEvent::DiscardItem { .. } => "discard_item",
            GameEvent::RemoveItem { .. } => "remove_item",
            GameEvent::AddDish { .. } => "add_dish",
            GameEvent::RemoveDish { .. } => "remove_dish",
            GameEvent::SetDishPrice { .. } => "set_dish_price",
            GameEvent::HireEmployees { .. } => "hire_employees",
            GameEvent::FireEmployees { .. } => "fire_employees",
            GameEvent::OfferLoans { .. } => "offer_loans",
            GameEvent::AcceptLoan { .. } => "accept_loan",
            GameEvent::AdvanceWeek { .. } => "advance_week",
        }
    }
}

/// Sequenced event as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    pub sequence: u64,
    /// Game week at which the event was issued.
    pub logical_time: u64,
    pub schema_version: u32,
    pub event: GameEvent,
}

impl EventEnvelope {
    pub fn new(sequence: u64, logical_time: u64, event: GameEvent) -> Self {
        Self {
            sequence,
            logical_time,
            schema_version: SCHEMA_VERSION,
            event,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| EngineError::parse(e.to_string()))
    }

    /// Parse an envelope from JSON (fixtures, log payloads).
    pub fn from_value(v: &Value) -> Result<Self> {
        Self::deserialize(v).map_err(|e| EngineError::parse(format!("bad event envelope: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_json_shape() {
        let env = EventEnvelope::new(
            2,
            0,
            GameEvent::Deposit {
                title: "Owner Deposit".into(),
                cents: 50_000,
            },
        );
        let v = env.to_value().unwrap();
        assert_eq!(v["event"]["type"], "deposit");
        assert_eq!(v["event"]["cents"], 50_000);
        assert_eq!(v["schema_version"], 1);
        assert_eq!(env.event_type(), "deposit");
    }

    #[test]
    fn parses_fixture_style_json() {
        let v = json!({
            "sequence": 5,
            "logical_time": 1,
            "schema_version": 1,
            "event": {"type": "advance_week", "orders": {"Carbonara": 3}}
        });
        let env = EventEnvelope::from_value(&v).unwrap();
        match env.event {
            GameEvent::AdvanceWeek { orders } => assert_eq!(orders["Carbonara"], 3),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let v = json!({
            "sequence": 1,
            "logical_time": 0,
            "schema_version": 1,
            "event": {"type": "burn_it_down"}
        });
        assert!(EventEnvelope::from_value(&v).is_err());
    }
}
