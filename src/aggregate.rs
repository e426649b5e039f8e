use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    data::{AccountId, DailyFlow, Error, RawTransaction, TxType},
    read::TransactionSink,
};

/// Collapses the raw transaction stream into one net deposit/withdrawal
/// pair per account-day. Flows accumulate in a `BTreeMap` keyed by
/// (account, day), so iteration comes out grouped by account and ascending
/// by day without ever sorting; the accrual engine downstream depends on
/// that ordering and must not re-sort.
///
/// An account that produced a rejected transaction is poisoned: its whole
/// series is withheld from the engine and reported instead, since a series
/// with a hole in it would accrue garbage.
#[derive(Debug, Default)]
pub(crate) struct DailyFlows {
    flows: BTreeMap<(AccountId, NaiveDate), DailyFlow>,
    rejected: BTreeMap<AccountId, Error>,
}

impl DailyFlows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unloads into per-account day-ordered series plus the poisoned
    /// accounts with the first error each one hit.
    pub fn into_series(
        self,
    ) -> (
        BTreeMap<AccountId, Vec<DailyFlow>>,
        BTreeMap<AccountId, Error>,
    ) {
        let Self { flows, rejected } = self;
        let days = flows.keys().map(|(_, day)| *day);
        if let (Some(start), Some(end)) = (days.clone().min(), days.max()) {
            log::info!(
                "aggregated {} account-days spanning {start} to {end}",
                flows.len()
            );
        }
        let mut series: BTreeMap<AccountId, Vec<DailyFlow>> = BTreeMap::new();
        for ((account, _), flow) in flows {
            if rejected.contains_key(&account) {
                continue;
            }
            series.entry(account).or_default().push(flow);
        }
        (series, rejected)
    }
}

impl TransactionSink for DailyFlows {
    fn record(&mut self, tx: RawTransaction) -> Result<(), Error> {
        if tx.amount.is_sign_negative() {
            self.rejected
                .entry(tx.account_id.clone())
                .or_insert(Error::NegativeAmount(tx.amount));
            return Err(Error::NegativeAmount(tx.amount));
        }
        let day = tx.completed_at;
        let flow = self
            .flows
            .entry((tx.account_id.clone(), day))
            .or_insert_with(|| DailyFlow {
                account: tx.account_id.clone(),
                day,
                // first transaction of the day supplies the labels
                month: tx.month.clone(),
                year: tx.year.clone(),
                deposit: Decimal::ZERO,
                withdrawal: Decimal::ZERO,
            });
        match tx.txtype {
            TxType::Deposit => flow.deposit += tx.amount,
            TxType::Withdrawal => flow.withdrawal += tx.amount,
        }
        Ok(())
    }
}
