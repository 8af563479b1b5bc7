use chrono::{DateTime, Utc};

use crate::domain::{UserBalance, UserId};

/// Current balance per user
///
/// Implementations do not lock per user: callers must hold that user's exclusivity (see
/// [`KeyLockManager`](crate::lock::KeyLockManager)) around `apply_delta`.
#[mockall::automock]
#[async_trait::async_trait]
pub trait BalanceStore: Send + Sync {
    /// Balance of a user, or an empty balance if the user was never charged
    async fn get(&self, user_id: UserId) -> Result<UserBalance, Error>;

    /// Add a signed delta to the balance of a user and store it with `at` as the update time
    ///
    /// Nothing is stored if the resulting balance would be negative or overflow.
    async fn apply_delta(
        &self,
        user_id: UserId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<UserBalance, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Trying to remove more points than the user holds
    #[error("trying to subtract too many points: {delta} from {current}")]
    InsufficientFunds { current: u64, delta: i64 },

    /// The resulting balance does not fit in a `u64`
    #[error("adding {delta} points to {current} overflows")]
    Overflow { current: u64, delta: i64 },

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
