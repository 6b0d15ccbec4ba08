//! Graph store for one loaded snapshot.
//!
//! Accounts become graph nodes and every analyzable transaction becomes a
//! directed edge. Transactions may reference accounts missing from the
//! accounts table; such endpoints get a node of their own so adjacency
//! queries keep working, but they are not reported as snapshot accounts.

use crate::schemas::{Account, AccountId, Transaction, TransactionId};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Summary of a snapshot load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accounts: usize,
    pub transactions: usize,
    /// Transactions dropped for a zero, negative or non-finite value
    pub excluded_transactions: usize,
    pub duplicate_accounts: usize,
    pub duplicate_transactions: usize,
    /// Distinct account ids referenced by transactions but missing from the
    /// accounts table
    pub dangling_accounts: usize,
}

/// Read-only snapshot of accounts and transactions.
///
/// Edge weights index into `transactions`, so load order is preserved and
/// every adjacency query can return transactions in the order they were
/// loaded.
#[derive(Debug, Default)]
pub struct GraphStore {
    graph: DiGraph<AccountId, usize>,
    node_map: HashMap<AccountId, NodeIndex>,
    accounts: Vec<Account>,
    account_index: HashMap<AccountId, usize>,
    transactions: Vec<Transaction>,
    transaction_index: HashMap<TransactionId, usize>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a full snapshot
    pub fn from_snapshot(
        accounts: impl IntoIterator<Item = Account>,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> (Self, LoadReport) {
        let mut store = Self::new();
        let report = store.load(accounts, transactions);
        (store, report)
    }

    /// Replace the whole snapshot (clear, then load)
    pub fn load(
        &mut self,
        accounts: impl IntoIterator<Item = Account>,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> LoadReport {
        self.clear();
        let mut report = LoadReport::default();

        for account in accounts {
            if self.account_index.contains_key(&account.id) {
                debug!(account = %account.id, "Duplicate account id ignored");
                report.duplicate_accounts += 1;
                continue;
            }
            self.get_or_add_node(&account.id);
            self.account_index
                .insert(account.id.clone(), self.accounts.len());
            self.accounts.push(account);
        }

        for tx in transactions {
            if !tx.has_analyzable_value() {
                debug!(transaction = %tx.id, value = tx.value, "Transaction excluded from analysis");
                report.excluded_transactions += 1;
                continue;
            }
            if self.transaction_index.contains_key(&tx.id) {
                debug!(transaction = %tx.id, "Duplicate transaction id ignored");
                report.duplicate_transactions += 1;
                continue;
            }

            let from_idx = self.get_or_add_node(&tx.from);
            let to_idx = self.get_or_add_node(&tx.to);
            let position = self.transactions.len();
            self.graph.add_edge(from_idx, to_idx, position);
            self.transaction_index.insert(tx.id.clone(), position);
            self.transactions.push(tx);
        }

        report.accounts = self.accounts.len();
        report.transactions = self.transactions.len();
        // Every node that is not an account was added for a dangling endpoint
        report.dangling_accounts = self.node_map.len() - self.accounts.len();

        if report.dangling_accounts > 0 {
            warn!(
                "{} accounts referenced by transactions are missing from the accounts table",
                report.dangling_accounts
            );
        }
        info!(
            "Loaded snapshot: {} accounts, {} transactions ({} excluded)",
            report.accounts, report.transactions, report.excluded_transactions
        );

        report
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_map.clear();
        self.accounts.clear();
        self.account_index.clear();
        self.transactions.clear();
        self.transaction_index.clear();
    }

    fn get_or_add_node(&mut self, id: &AccountId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), idx);
        idx
    }

    // --------------------------------------------------------------------
    // Lookups
    // --------------------------------------------------------------------

    pub fn contains_account(&self, id: &AccountId) -> bool {
        self.account_index.contains_key(id)
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.account_index.get(id).map(|&i| &self.accounts[i])
    }

    pub fn transaction(&self, id: &TransactionId) -> Option<&Transaction> {
        self.transaction_index.get(id).map(|&i| &self.transactions[i])
    }

    /// Snapshot accounts in load order
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Analyzable transactions in load order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn account_ids(&self) -> impl Iterator<Item = &AccountId> + '_ {
        self.accounts.iter().map(|a| &a.id)
    }

    /// Every id with a node: snapshot accounts first, then dangling
    /// endpoints in first-reference order
    pub fn node_ids(&self) -> impl Iterator<Item = &AccountId> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.transactions.is_empty()
    }

    // --------------------------------------------------------------------
    // Adjacency
    // --------------------------------------------------------------------

    /// Outbound transactions of `id` in load order; empty for unknown ids
    pub fn outbound(&self, id: &AccountId) -> Vec<&Transaction> {
        self.adjacent(id, true)
    }

    /// Inbound transactions of `id` in load order; empty for unknown ids
    pub fn inbound(&self, id: &AccountId) -> Vec<&Transaction> {
        self.adjacent(id, false)
    }

    fn adjacent(&self, id: &AccountId, outgoing: bool) -> Vec<&Transaction> {
        let Some(&idx) = self.node_map.get(id) else {
            return Vec::new();
        };
        let direction = if outgoing { Outgoing } else { Incoming };

        // petgraph walks a node's edge list newest-first
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| edge.id())
            .collect();
        edges.sort_unstable();

        edges
            .into_iter()
            .map(|edge| &self.transactions[self.graph[edge]])
            .collect()
    }

    /// Earliest-loaded transaction with exactly this `from`/`to` pair
    pub fn first_transaction_between(
        &self,
        from: &AccountId,
        to: &AccountId,
    ) -> Option<&Transaction> {
        let from_idx = *self.node_map.get(from)?;
        let to_idx = *self.node_map.get(to)?;
        self.graph
            .edges_connecting(from_idx, to_idx)
            .map(|edge| edge.id())
            .min()
            .map(|edge| &self.transactions[self.graph[edge]])
    }

    /// All transactions touching `id`, in load order
    pub fn connected(&self, id: &AccountId) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| &tx.from == id || &tx.to == id)
            .collect()
    }
}
