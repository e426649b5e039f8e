use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::compute::Mode;
use crate::data::AccrualRecord;

/// Proxy for serializing an `AccrualRecord` into a report row; field order
/// is the report's column order, with `Day` as the day of month beside the
/// pass-through `Month`/`Year` labels.
#[derive(Serialize)]
struct IncomeRow<'a> {
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Month")]
    month: &'a str,
    #[serde(rename = "Year")]
    year: &'a str,
    #[serde(rename = "Account ID")]
    account: &'a str,
    #[serde(rename = "Deposit")]
    deposit: Decimal,
    #[serde(rename = "Withdrawal")]
    withdrawal: Decimal,
    #[serde(rename = "End of Day Income")]
    income: Decimal,
    #[serde(rename = "Account Daily Balance")]
    balance: Decimal,
}

/// The balance-only report drops the income column entirely, so it gets its
/// own row shape instead of an empty placeholder field.
#[derive(Serialize)]
struct BalanceRow<'a> {
    #[serde(rename = "Day")]
    day: u32,
    #[serde(rename = "Month")]
    month: &'a str,
    #[serde(rename = "Year")]
    year: &'a str,
    #[serde(rename = "Account ID")]
    account: &'a str,
    #[serde(rename = "Deposit")]
    deposit: Decimal,
    #[serde(rename = "Withdrawal")]
    withdrawal: Decimal,
    #[serde(rename = "Account Daily Balance")]
    balance: Decimal,
}

/// Basic CSV exporter for the accrual report.
pub(crate) fn write_records<W: std::io::Write>(
    writer: W,
    records: &[AccrualRecord],
    mode: Mode,
) -> Result<(), anyhow::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        match mode {
            Mode::WithIncome => wtr.serialize(IncomeRow {
                day: record.day.day(),
                month: record.month.as_deref().unwrap_or(""),
                year: record.year.as_deref().unwrap_or(""),
                account: &record.account,
                deposit: record.deposit,
                withdrawal: record.withdrawal,
                income: record.income.unwrap_or_default(),
                balance: record.balance,
            })?,
            Mode::BalanceOnly => wtr.serialize(BalanceRow {
                day: record.day.day(),
                month: record.month.as_deref().unwrap_or(""),
                year: record.year.as_deref().unwrap_or(""),
                account: &record.account,
                deposit: record.deposit,
                withdrawal: record.withdrawal,
                balance: record.balance,
            })?,
        }
    }
    wtr.flush()?;
    Ok(())
}
