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

/// Spend points from the balance of a user
///
/// Fails with [`Error::InsufficientFunds`] if the user holds fewer points than requested,
/// including users that were never charged.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UsePointsRequest {
    pub user_id: UserId,
    /// Number of points to spend, must be positive
    pub amount: i64,
}

impl<B, H> Service<UsePointsRequest> for LedgerService<B, H>
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

    fn call(&mut self, req: UsePointsRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move { ledger.use_points(req.user_id, req.amount).await })
    }
}
