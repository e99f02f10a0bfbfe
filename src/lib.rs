//! Client for the WestPunks on-chain suite: reconciles local state with the
//! deployed allow-list, NFT, token, and governance contracts, decides which
//! user actions are currently valid, and submits the matching transactions.

use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

pub mod amount;

pub mod chain;

pub mod claims;

pub mod contracts;

pub mod deployment;

pub mod poller;

pub mod proposals;

pub mod session;

pub mod test_helpers;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Route tracing output to a daily-rolling log file under `dir`. Keeps the
/// writer guard alive for the rest of the process.
pub fn init_tracing(dir: impl AsRef<Path>) -> Result<()> {
    let appender = rolling::daily(dir, "westpunks-client.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|error| eyre!("failed to install tracing subscriber: {error}"))?;
    let _ = LOG_GUARD.set(guard);
    Ok(())
}
