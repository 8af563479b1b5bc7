use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde::Deserialize;
use tower::Service;

use crate::{
    domain::{UserBalance, UserId},
    ports::{balance::BalanceStore, history::HistoryLog},
};

use super::{Error, LedgerService};

/// Add points to the balance of a user
///
/// The user does not need to exist beforehand: the first charge creates its balance.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChargeRequest {
    pub user_id: UserId,
    /// Number of points to add, must be positive
    pub amount: i64,
}

impl<B, H> Service<ChargeRequest> for LedgerService<B, H>
where
    B: BalanceStore + 'static,
    H: HistoryLog + 'static,
{
    type Response = UserBalance;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ChargeRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move { ledger.charge(req.user_id, req.amount).await })
    }
}
