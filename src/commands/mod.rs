use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::{
    domain::{Amount, TransactionKind, TransactionRecord, UserBalance, UserId},
    lock::KeyLockManager,
    ports::{
        balance::{self, BalanceStore},
        history::{self, HistoryLog},
    },
};

pub mod charge;
pub mod queries;
pub mod use_points;

/// Point balances and their history
///
/// Charges and uses of the same user are serialized, while different users proceed in parallel.
/// Every accepted change has exactly one history record: if the record cannot be written, the
/// balance change is compensated before the error is returned.
pub struct LedgerService<B, H> {
    balances: Arc<B>,
    history: Arc<H>,
    locks: Arc<KeyLockManager<UserId>>,
}

impl<B, H> Clone for LedgerService<B, H> {
    fn clone(&self) -> Self {
        Self {
            balances: self.balances.clone(),
            history: self.history.clone(),
            locks: self.locks.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid amount {0}: must be a positive integer")]
    InvalidAmount(i64),
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },
    #[error("balance {balance} cannot grow by {requested}")]
    BalanceOverflow { balance: u64, requested: u64 },

    #[error("balance store error: {0:?}")]
    Balance(balance::Error),
    #[error("history log error: {0:?}")]
    History(#[from] history::Error),

    /// The history record failed and so did restoring the balance
    ///
    /// The balance of this user no longer matches its history.
    #[error("rollback of user {user_id} failed: {source:?}")]
    RollbackFailed {
        user_id: UserId,
        source: balance::Error,
    },
}

impl Error {
    /// Whether the request itself was refused, leaving balance and history untouched
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InsufficientFunds { .. }
                | Error::BalanceOverflow { .. }
        )
    }
}

impl From<balance::Error> for Error {
    fn from(err: balance::Error) -> Self {
        match err {
            balance::Error::InsufficientFunds { current, delta } => Error::InsufficientFunds {
                balance: current,
                requested: delta.unsigned_abs(),
            },
            balance::Error::Overflow { current, delta } => Error::BalanceOverflow {
                balance: current,
                requested: delta.unsigned_abs(),
            },
            err => Error::Balance(err),
        }
    }
}

impl<B, H> LedgerService<B, H>
where
    B: BalanceStore,
    H: HistoryLog,
{
    pub fn new(balances: Arc<B>, history: Arc<H>) -> Self {
        Self {
            balances,
            history,
            locks: Arc::new(KeyLockManager::new()),
        }
    }

    /// Current balance, 0 for a user that was never charged
    #[instrument(skip(self))]
    pub async fn balance(&self, user_id: UserId) -> Result<UserBalance, Error> {
        self.locks
            .with_shared(user_id, || self.balances.get(user_id))
            .await
            .map_err(Error::Balance)
    }

    /// History of a user in the order it was recorded
    #[instrument(skip(self))]
    pub async fn history(&self, user_id: UserId) -> Result<Vec<TransactionRecord>, Error> {
        let records = self
            .locks
            .with_shared(user_id, || self.history.list_for(user_id))
            .await?;
        Ok(records)
    }

    #[instrument(skip(self))]
    pub async fn charge(&self, user_id: UserId, amount: i64) -> Result<UserBalance, Error> {
        self.apply(user_id, amount, TransactionKind::Charge).await
    }

    #[instrument(skip(self))]
    pub async fn use_points(&self, user_id: UserId, amount: i64) -> Result<UserBalance, Error> {
        self.apply(user_id, amount, TransactionKind::Use).await
    }

    async fn apply(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
    ) -> Result<UserBalance, Error> {
        let amount = Amount::try_from(amount).map_err(|err| {
            tracing::debug!(%err, "rejected amount");
            Error::InvalidAmount(err.0)
        })?;

        self.locks
            .with_exclusive(user_id, || self.apply_exclusive(user_id, amount, kind))
            .await
    }

    /// Change the balance and record it, undoing the change if the record fails
    ///
    /// Must run under the exclusive lock of `user_id`.
    async fn apply_exclusive(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: TransactionKind,
    ) -> Result<UserBalance, Error> {
        let previous = self.balances.get(user_id).await?;
        let delta = kind.delta(amount);
        let now = Utc::now();

        let updated = match self.balances.apply_delta(user_id, delta, now).await {
            Ok(updated) => updated,
            Err(err) => {
                tracing::debug!(%err, "rejected balance change");
                return Err(err.into());
            }
        };

        match self.history.append(user_id, amount, kind, now).await {
            Ok(record) => {
                tracing::info!(
                    record_id = record.id,
                    balance = updated.balance,
                    "recorded transaction"
                );
                Ok(updated)
            }
            Err(err) => {
                tracing::warn!(%err, "history append failed, restoring balance");
                self.balances
                    .apply_delta(user_id, -delta, previous.updated_at)
                    .await
                    .map_err(|source| {
                        tracing::error!(%source, "balance and history diverged");
                        Error::RollbackFailed { user_id, source }
                    })?;
                Err(err.into())
            }
        }
    }
}
