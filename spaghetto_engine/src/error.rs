//! Kernel error type.
//!
//! Every transition either commits a new state or returns one of these.
//! The previous state is never touched on failure.

/// All kernel failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Checked arithmetic left the i64 range.
    #[error("overflow: {0}")]
    Overflow(String),

    /// User-facing input could not be parsed (money, counts).
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown item {0:?}")]
    UnknownItem(String),

    #[error("unknown dish {0:?}")]
    UnknownDish(String),

    #[error("unknown loan {0:?}")]
    UnknownLoan(String),

    /// Two quantities of the same item were expressed in different units.
    #[error("item {name:?} is measured in {expected:?}, not {found:?}")]
    UnitMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("not enough {name:?}: requested {requested}, only {available} in stock")]
    InsufficientStock {
        name: String,
        requested: i64,
        available: i64,
    },

    #[error("insufficient funds: need {needed} cents, balance is {balance} cents")]
    InsufficientFunds { needed: i64, balance: i64 },

    #[error("cannot let go of {requested} employees, only {employed} employed")]
    NotEnoughEmployees { requested: i64, employed: i64 },

    #[error("dish {0:?} already exists")]
    DuplicateDish(String),

    #[error("loan {0:?} already exists")]
    DuplicateLoan(String),

    #[error("item {item:?} is used by dish {dish:?}")]
    ItemInUse { item: String, dish: String },

    #[error("the business does not meet the requirements for {0:?}")]
    RequirementsNotMet(String),

    /// Payload failed a precondition (empty name, non-positive amount...).
    #[error("validation error: {0}")]
    Validation(String),

    /// A post-transition invariant check failed.
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("schema version mismatch: expected {expected}, got {found}")]
    SchemaVersion { expected: u32, found: u32 },

    #[error("sequence violation: expected {expected}, got {found}")]
    Sequence { expected: u64, found: u64 },

    /// `initialize_constants` was missing at the start or repeated later.
    #[error("event ordering violation: {0}")]
    Ordering(String),
}

/// Convenience alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = EngineError::validation("dish name is empty");
        assert_eq!(err.to_string(), "validation error: dish name is empty");

        let err = EngineError::InsufficientStock {
            name: "Flour".into(),
            requested: 10,
            available: 3,
        };
        assert!(err.to_string().contains("only 3 in stock"));
    }
}
