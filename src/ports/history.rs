use chrono::{DateTime, Utc};

use crate::domain::{Amount, TransactionKind, TransactionRecord, UserId};

/// Append-only log of accepted transactions
#[mockall::automock]
#[async_trait::async_trait]
pub trait HistoryLog: Send + Sync {
    /// Store a new record under the next id
    ///
    /// Ids are never reused, even if a later step of the caller fails.
    async fn append(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: TransactionKind,
        occurred_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, Error>;

    /// Records of a user in append order, empty if there are none
    ///
    /// Calling it again restarts from the first record. The result is collected in memory, so a
    /// durable adapter may fetch it page by page, as long as the pages come back in append order.
    async fn list_for(&self, user_id: UserId) -> Result<Vec<TransactionRecord>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
