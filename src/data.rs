use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Account identifiers are opaque here: whatever the upstream ingestion
/// produced (integers, UUIDs, ...) is carried through verbatim, so a plain
/// `String` it is.
pub type AccountId = String;

/// Input amounts are normalized to this scale when read.
pub const SIGNIFICANT_DIGITS: u32 = 4;

/// Computed balance/income values are reported at this scale, rounded once
/// at the end of each account's series.
pub const REPORT_DECIMALS: u32 = 2;

/// One completed transaction as handed over by the ingestion side. The
/// `status` column is optional: upstream is supposed to only send
/// "completed" rows, but when the column is there we filter on it anyway
/// rather than trust the promise. `month`/`year` are free-form labels that
/// ride along unchanged into the report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct RawTransaction {
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub txtype: TxType,
    pub amount: Decimal,
    #[serde(deserialize_with = "de_completed_at")]
    pub completed_at: NaiveDate,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
}

/// Direction of a transaction. Anything else in the `type` column is a
/// deserialization error, surfaced at the read boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TxType {
    Deposit,
    Withdrawal,
}

/// Net flows for one account-day, produced by the aggregator: the summed
/// deposits and withdrawals of that calendar day, either one 0 when the day
/// only moved money the other way. There is at most one of these per
/// (account, day), and an account's sequence is strictly ascending by day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DailyFlow {
    pub account: AccountId,
    pub day: NaiveDate,
    pub month: Option<String>,
    pub year: Option<String>,
    pub deposit: Decimal,
    pub withdrawal: Decimal,
}

/// One output row: the day's flows plus the end-of-day balance and accrued
/// income. `income` is `None` in balance-only mode, and the exported row
/// then has no income column at all rather than a zero placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccrualRecord {
    pub account: AccountId,
    pub day: NaiveDate,
    pub month: Option<String>,
    pub year: Option<String>,
    pub deposit: Decimal,
    pub withdrawal: Decimal,
    pub income: Option<Decimal>,
    pub balance: Decimal,
}

/// Failures that name an account. These never abort the batch on their own:
/// the offending account's series is withheld and reported, the rest keep
/// going, and the caller decides whether that is fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("transaction amount must not be negative (got {0})")]
    NegativeAmount(Decimal),
    #[error("flows for account {account} not strictly ascending by day ({prev} followed by {next})")]
    OutOfOrder {
        account: AccountId,
        prev: NaiveDate,
        next: NaiveDate,
    },
    #[error("balance for account {account} overflowed on {day}")]
    Overflow { account: AccountId, day: NaiveDate },
}

/// `completed_at` arrives as a plain date, a `YYYY-MM-DD HH:MM:SS`
/// timestamp, or an RFC 3339 timestamp depending on which upstream table it
/// came from; all three coerce to the calendar day.
pub(crate) fn parse_completed_at(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.date_naive()))
}

fn de_completed_at<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_completed_at(&s)
        .map_err(|e| serde::de::Error::custom(format!("unparseable completed_at {s:?}: {e}")))
}
