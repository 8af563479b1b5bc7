use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a point holder
///
/// There is no registration step: any id is valid and starts with an implicit balance of 0.
pub type UserId = u64;

/// A positive number of points
///
/// The only way to build an `Amount` is through [`TryFrom<i64>`], so a non-positive amount can
/// never reach a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = InvalidAmount;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value > 0 {
            Ok(Self(value as u64))
        } else {
            Err(InvalidAmount(value))
        }
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("amount must be a positive integer, got {0}")]
pub struct InvalidAmount(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Points added to the balance
    Charge,
    /// Points spent from the balance
    Use,
}

impl TransactionKind {
    /// Signed change this kind of transaction applies to a balance
    pub fn delta(&self, amount: Amount) -> i64 {
        // `Amount` never exceeds `i64::MAX`
        let amount = amount.get() as i64;
        match self {
            TransactionKind::Charge => amount,
            TransactionKind::Use => -amount,
        }
    }
}

/// Current point balance of a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: UserId,
    /// Current amount of points, never negative
    pub balance: u64,
    /// Time of the last accepted charge or use
    ///
    /// For a user that was never charged, this is the time the balance was read. After a first
    /// charge that was rolled back, it stays at the time that charge read the balance.
    pub updated_at: DateTime<Utc>,
}

impl UserBalance {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Immutable history entry for an accepted charge or use
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Strictly increasing across all users
    pub id: u64,
    pub user_id: UserId,
    pub amount: u64,
    pub kind: TransactionKind,
    pub occurred_at: DateTime<Utc>,
}
