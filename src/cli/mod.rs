use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{sync::Semaphore, task::JoinSet};
use tower::ServiceExt;

use crate::{
    adapters::database::memory::{MemoryBalanceStore, MemoryHistoryLog},
    commands::{charge::ChargeRequest, use_points::UsePointsRequest, LedgerService},
    config::LedgerConfig,
    domain::{TransactionRecord, UserId},
    ports::{balance::BalanceStore, history::HistoryLog},
};

/// point-ledger - per-user point balances with an append-only history
#[derive(Parser)]
#[command(name = "point-ledger")]
#[command(about = "Per-user point balances with an append-only history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a file of charge and use operations, then print every balance and its history
    ///
    /// Each line is a JSON object such as `{"op": "charge", "user_id": 1, "amount": 100}`.
    Replay {
        /// JSON lines file, or `-` to read from stdin
        input: PathBuf,

        /// Number of users replayed at the same time (overrides POINT_LEDGER_REPLAY_CONCURRENCY)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}

/// One line of a replay file
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Charge(ChargeRequest),
    Use(UsePointsRequest),
}

impl Operation {
    pub fn user_id(&self) -> UserId {
        match self {
            Operation::Charge(req) => req.user_id,
            Operation::Use(req) => req.user_id,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    /// Operations refused because of their amount or the balance
    pub rejected: usize,
}

/// Final state of one user
#[derive(Debug, Serialize)]
pub struct UserReport {
    pub user_id: UserId,
    pub balance: u64,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<TransactionRecord>,
}

impl Cli {
    pub async fn run(self, config: LedgerConfig) -> Result<()> {
        match self.command {
            Commands::Replay { input, concurrency } => {
                let operations = read_operations(&input)?;
                let user_ids: Vec<UserId> = {
                    let mut ids: Vec<_> = operations.iter().map(Operation::user_id).collect();
                    ids.sort_unstable();
                    ids.dedup();
                    ids
                };

                let ledger = LedgerService::new(
                    Arc::new(MemoryBalanceStore::default()),
                    Arc::new(MemoryHistoryLog::default()),
                );
                let concurrency = concurrency.unwrap_or(config.replay_concurrency);
                let summary = replay(&ledger, operations, concurrency).await?;
                tracing::info!(
                    applied = summary.applied,
                    rejected = summary.rejected,
                    users = user_ids.len(),
                    "replay finished"
                );

                for report in report(&ledger, user_ids).await? {
                    println!("{}", serde_json::to_string(&report)?);
                }
            }
        }

        Ok(())
    }
}

fn read_operations(input: &Path) -> Result<Vec<Operation>> {
    if input == Path::new("-") {
        parse_operations(io::stdin().lock())
    } else {
        let file = File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        parse_operations(BufReader::new(file))
    }
}

/// Parse JSON lines, skipping blank ones
pub fn parse_operations(reader: impl BufRead) -> Result<Vec<Operation>> {
    let mut operations = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let operation = serde_json::from_str(&line)
            .with_context(|| format!("Invalid operation on line {}", index + 1))?;
        operations.push(operation);
    }
    Ok(operations)
}

/// Apply operations to the ledger
///
/// Operations of a user are applied in their original order, while up to `concurrency` users
/// are replayed in parallel. Rejected operations are counted and skipped; any other error stops
/// the replay.
pub async fn replay<B, H>(
    ledger: &LedgerService<B, H>,
    operations: Vec<Operation>,
    concurrency: usize,
) -> Result<ReplaySummary>
where
    B: BalanceStore + 'static,
    H: HistoryLog + 'static,
{
    let mut per_user: BTreeMap<UserId, Vec<Operation>> = BTreeMap::new();
    for operation in operations {
        per_user
            .entry(operation.user_id())
            .or_default()
            .push(operation);
    }

    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (user_id, operations) in per_user {
        let ledger = ledger.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let mut summary = ReplaySummary::default();
            for operation in operations {
                let res = match operation {
                    Operation::Charge(req) => ledger.clone().oneshot(req).await,
                    Operation::Use(req) => ledger.clone().oneshot(req).await,
                };
                match res {
                    Ok(_) => summary.applied += 1,
                    Err(err) if err.is_rejection() => {
                        tracing::warn!(user_id, %err, "operation rejected");
                        summary.rejected += 1;
                    }
                    Err(err) => return Err(anyhow::Error::new(err)),
                }
            }
            Ok::<_, anyhow::Error>(summary)
        });
    }

    let mut total = ReplaySummary::default();
    while let Some(joined) = tasks.join_next().await {
        let summary = joined.context("Replay task panicked")??;
        total.applied += summary.applied;
        total.rejected += summary.rejected;
    }

    Ok(total)
}

/// Balance and history of each user, in the given order
pub async fn report<B, H>(
    ledger: &LedgerService<B, H>,
    user_ids: impl IntoIterator<Item = UserId>,
) -> Result<Vec<UserReport>>
where
    B: BalanceStore,
    H: HistoryLog,
{
    let mut reports = Vec::new();
    for user_id in user_ids {
        let balance = ledger.balance(user_id).await?;
        let history = ledger.history(user_id).await?;
        reports.push(UserReport {
            user_id,
            balance: balance.balance,
            updated_at: balance.updated_at,
            history,
        });
    }
    Ok(reports)
}
