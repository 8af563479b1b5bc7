use crate::{
    domain::{Amount, TransactionKind, TransactionRecord, UserBalance, UserId},
    ports::{balance, balance::BalanceStore, history, history::HistoryLog},
};
use chrono::{DateTime, Utc};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

#[derive(Clone, Debug, Default)]
pub struct MemoryBalanceStore {
    balances: Arc<Mutex<HashMap<UserId, UserBalance>>>,
}

#[async_trait::async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn get(&self, user_id: UserId) -> Result<UserBalance, balance::Error> {
        let balance = self
            .balances
            .lock()?
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserBalance::empty(user_id));

        Ok(balance)
    }

    async fn apply_delta(
        &self,
        user_id: UserId,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<UserBalance, balance::Error> {
        let mut balances = self.balances.lock()?;
        let current = balances.get(&user_id).map_or(0, |b| b.balance);
        let new_balance = next_balance(current, delta)?;

        let balance = match balances.entry(user_id) {
            Entry::Occupied(mut entry) => {
                let balance = entry.get_mut();
                balance.balance = new_balance;
                balance.updated_at = at;
                balance.clone()
            }
            // First accepted change for this user
            Entry::Vacant(entry) => entry
                .insert(UserBalance {
                    user_id,
                    balance: new_balance,
                    updated_at: at,
                })
                .clone(),
        };

        Ok(balance)
    }
}

fn next_balance(current: u64, delta: i64) -> Result<u64, balance::Error> {
    current.checked_add_signed(delta).ok_or_else(|| {
        if delta < 0 {
            balance::Error::InsufficientFunds { current, delta }
        } else {
            balance::Error::Overflow { current, delta }
        }
    })
}

#[derive(Debug)]
pub struct MemoryHistoryLog {
    /// Last id handed out
    last_id: AtomicU64,
    records: Mutex<HashMap<UserId, Vec<TransactionRecord>>>,
}

impl MemoryHistoryLog {
    /// Log whose first record gets id `last_id + 1`
    pub fn starting_after(last_id: u64) -> Self {
        Self {
            last_id: AtomicU64::new(last_id),
            records: Mutex::default(),
        }
    }

    /// Total number of records across all users
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryHistoryLog {
    fn default() -> Self {
        Self::starting_after(0)
    }
}

#[async_trait::async_trait]
impl HistoryLog for MemoryHistoryLog {
    async fn append(
        &self,
        user_id: UserId,
        amount: Amount,
        kind: TransactionKind,
        occurred_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, history::Error> {
        let mut records = self.records.lock()?;
        // Taken under the lock so that id order matches append order
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = TransactionRecord {
            id,
            user_id,
            amount: amount.get(),
            kind,
            occurred_at,
        };
        records.entry(user_id).or_default().push(record.clone());

        Ok(record)
    }

    async fn list_for(&self, user_id: UserId) -> Result<Vec<TransactionRecord>, history::Error> {
        let records = self
            .records
            .lock()?
            .get(&user_id)
            .cloned()
            .unwrap_or_default();

        Ok(records)
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

impl<T> From<PoisonError<T>> for balance::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

impl<T> From<PoisonError<T>> for history::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}
