//! Offline-tolerant synchronized collections for a personal finance client.
//!
//! Transactions, deposits, incomes, transfers, budgets and goals each live in
//! a [`store::SyncedCollectionStore`] that keeps memory, a local SQLite
//! snapshot and the remote API aligned.

pub mod api;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod logging;
pub mod storage;
pub mod store;
pub mod stores;
