//! Per-account flow features.
//!
//! Counts, totals and averages of incoming and outgoing transfers. Used to
//! size nodes and to derive an accounts table for datasets that only ship
//! transactions.

use crate::graph_store::GraphStore;
use crate::schemas::{AccountId, AccountRecord, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountFlow {
    pub incoming_count: usize,
    pub incoming_total: f64,
    pub outgoing_count: usize,
    pub outgoing_total: f64,
}

impl AccountFlow {
    fn receive(&mut self, value: f64) {
        self.incoming_count += 1;
        self.incoming_total += value;
    }

    fn send(&mut self, value: f64) {
        self.outgoing_count += 1;
        self.outgoing_total += value;
    }

    pub fn avg_incoming(&self) -> f64 {
        mean(self.incoming_total, self.incoming_count)
    }

    pub fn avg_outgoing(&self) -> f64 {
        mean(self.outgoing_total, self.outgoing_count)
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn accumulate<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> BTreeMap<AccountId, AccountFlow> {
    let mut flows: BTreeMap<AccountId, AccountFlow> = BTreeMap::new();
    for tx in transactions {
        flows.entry(tx.from.clone()).or_default().send(tx.value);
        flows.entry(tx.to.clone()).or_default().receive(tx.value);
    }
    flows
}

/// Flows over the analyzed transactions of a snapshot, keyed by account id
pub fn account_flows(store: &GraphStore) -> BTreeMap<AccountId, AccountFlow> {
    accumulate(store.transactions())
}

/// Build account rows from a transaction table, sorted by account id.
///
/// Counts, totals and averages are filled in; the risk score is left empty.
pub fn derive_accounts(transactions: &[Transaction]) -> Vec<AccountRecord> {
    let records: Vec<AccountRecord> = accumulate(transactions)
        .into_iter()
        .map(|(id, flow)| AccountRecord {
            account_id: Some(id.to_string()),
            total_incoming_value: Some(flow.incoming_total),
            total_outgoing_value: Some(flow.outgoing_total),
            ml_risk_score: None,
            incoming_tx_count: Some(flow.incoming_count as u64),
            avg_incoming_value: Some(flow.avg_incoming()),
            outgoing_tx_count: Some(flow.outgoing_count as u64),
            avg_outgoing_value: Some(flow.avg_outgoing()),
        })
        .collect();

    info!(
        "Derived {} accounts from {} transactions",
        records.len(),
        transactions.len()
    );
    records
}
