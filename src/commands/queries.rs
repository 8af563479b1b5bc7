use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use serde::Deserialize;
use tower::Service;

use crate::{
    domain::{TransactionRecord, UserBalance, UserId},
    ports::{balance::BalanceStore, history::HistoryLog},
};

use super::{Error, LedgerService};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GetBalanceRequest {
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GetHistoryRequest {
    pub user_id: UserId,
}

impl<B, H> Service<GetBalanceRequest> for LedgerService<B, H>
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

    fn call(&mut self, req: GetBalanceRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move { ledger.balance(req.user_id).await })
    }
}

impl<B, H> Service<GetHistoryRequest> for LedgerService<B, H>
where
    B: BalanceStore + 'static,
    H: HistoryLog + 'static,
{
    type Response = Vec<TransactionRecord>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: GetHistoryRequest) -> Self::Future {
        let ledger = self.clone();
        Box::pin(async move { ledger.history(req.user_id).await })
    }
}
