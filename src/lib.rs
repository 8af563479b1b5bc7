//! Per-user point balances with an append-only transaction history
//!
//! - [`domain`] - balances, amounts and transaction records
//! - [`ports`] - storage contracts for balances and history
//! - [`adapters`] - in-memory implementations of the ports
//! - [`lock`] - per-user critical sections
//! - [`commands`] - the ledger service and its tower services
//! - [`cli`], [`config`], [`telemetry`] - the `point-ledger` binary

pub mod adapters;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod lock;
pub mod ports;
pub mod telemetry;

pub use commands::{Error, LedgerService};
