use std::path::PathBuf;

use clap::Parser;
use rust_decimal::Decimal;

use aggregate::DailyFlows;
use compute::{AccrualConfig, AccrualEngine, Mode};
use read::read_transactions;
use write::write_records;

mod aggregate;
mod compute;
mod data;
mod read;
mod write;

/// Derive per-account daily balances and accrued income from a raw export
/// of completed deposit/withdrawal transactions.
#[derive(Parser, Debug)]
#[command(name = "accruals", version, about)]
struct Cli {
    /// CSV of completed transactions (account_id, type, amount, completed_at, ...)
    input: PathBuf,

    /// Only track balances; the report carries no income column
    #[arg(long)]
    balance_only: bool,

    /// Daily balance growth rate
    #[arg(long, default_value = "0.0001")]
    rate: Decimal,

    /// Daily income accrual rate
    #[arg(long, default_value = "0.0001")]
    income_rate: Decimal,

    /// Abort on the first bad row or account instead of skipping it and
    /// reporting at the end
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();
    let config = AccrualConfig {
        mode: if cli.balance_only {
            Mode::BalanceOnly
        } else {
            Mode::WithIncome
        },
        rate: cli.rate,
        income_rate: cli.income_rate,
    };
    let mode = config.mode;

    let mut flows = DailyFlows::new();
    read_transactions(std::fs::File::open(&cli.input)?, &mut flows, cli.strict)?;
    let (series, rejected) = flows.into_series();
    for (account, e) in &rejected {
        log::warn!("withheld account {account}: {e}");
    }

    let (records, failures) = AccrualEngine::new(config).accrue_all(series);
    if cli.strict && (!rejected.is_empty() || !failures.is_empty()) {
        anyhow::bail!(
            "{} account(s) dropped from the batch",
            rejected.len() + failures.len()
        );
    }
    write_records(std::io::stdout(), &records, mode)?;
    Ok(())
}
