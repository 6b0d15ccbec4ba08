//! Smurfing (structuring) detection.
//!
//! Many small inbound payments aggregating at a single account. A payment is
//! small when `0 < value < threshold`; an account is flagged once it has at
//! least `min_transactions` of them.

use crate::config::SmurfingConfig;
use crate::detector::Detector;
use crate::finding::{Evidence, Finding, PatternKind};
use crate::graph_store::GraphStore;
use crate::schemas::{AccountId, TransactionId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Default exclusive upper bound for a "small" payment
pub const DEFAULT_THRESHOLD: f64 = 10_000.0;

/// Default minimum number of small payments to flag an account
pub const DEFAULT_MIN_TRANSACTIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct SmurfingDetector {
    pub threshold: f64,
    pub min_transactions: usize,
}

impl Default for SmurfingDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_transactions: DEFAULT_MIN_TRANSACTIONS,
        }
    }
}

impl From<&SmurfingConfig> for SmurfingDetector {
    fn from(config: &SmurfingConfig) -> Self {
        Self {
            threshold: config.threshold,
            min_transactions: config.min_transactions,
        }
    }
}

/// Small inbound payments collected for one receiving account
#[derive(Debug, Default)]
struct InboundAggregate {
    senders: Vec<AccountId>,
    seen_senders: HashSet<AccountId>,
    transactions: Vec<TransactionId>,
    total_value: f64,
}

impl SmurfingDetector {
    fn is_small(&self, value: f64) -> bool {
        value > 0.0 && value < self.threshold
    }
}

impl Detector for SmurfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Smurfing
    }

    fn detect(&self, store: &GraphStore) -> Finding {
        // Receivers kept in order of their first small payment
        let mut order: Vec<AccountId> = Vec::new();
        let mut aggregates: HashMap<AccountId, InboundAggregate> = HashMap::new();

        for tx in store.transactions() {
            if !self.is_small(tx.value) {
                continue;
            }
            let entry = aggregates.entry(tx.to.clone()).or_insert_with(|| {
                order.push(tx.to.clone());
                InboundAggregate::default()
            });
            if entry.seen_senders.insert(tx.from.clone()) {
                entry.senders.push(tx.from.clone());
            }
            entry.transactions.push(tx.id.clone());
            entry.total_value += tx.value;
        }

        let mut finding = Finding::new(PatternKind::Smurfing);

        for account in order {
            let Some(aggregate) = aggregates.remove(&account) else {
                continue;
            };
            if aggregate.transactions.len() < self.min_transactions {
                continue;
            }

            debug!(
                account = %account,
                count = aggregate.transactions.len(),
                total = aggregate.total_value,
                "Smurfing target flagged"
            );

            finding.flag_node(&account);
            for sender in &aggregate.senders {
                finding.flag_node(sender);
            }
            for tx_id in &aggregate.transactions {
                finding.flag_edge(tx_id);
            }
            finding.push_evidence(Evidence::Smurfing {
                account,
                senders: aggregate.senders,
                transactions: aggregate.transactions,
                total_value: aggregate.total_value,
            });
        }

        info!(
            "Smurfing scan: {} flagged accounts, {} transactions",
            finding.evidence.len(),
            finding.edges.len()
        );
        finding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{Account, Transaction};

    fn store(txs: Vec<Transaction>) -> GraphStore {
        let ids = ["a", "b", "c", "d", "t", "u"];
        let accounts = ids.iter().map(|id| Account::new(*id));
        GraphStore::from_snapshot(accounts, txs).0
    }

    fn tx(id: &str, from: &str, to: &str, value: f64) -> Transaction {
        Transaction::new(id, from, to, value, None)
    }

    #[test]
    fn test_three_small_payments_flagged() {
        let store = store(vec![
            tx("1", "a", "t", 100.0),
            tx("2", "b", "t", 200.0),
            tx("3", "c", "t", 300.0),
        ]);
        let finding = SmurfingDetector::default().detect(&store);

        assert_eq!(finding.evidence.len(), 1);
        match &finding.evidence[0] {
            Evidence::Smurfing {
                account,
                senders,
                transactions,
                total_value,
            } => {
                assert_eq!(account.as_str(), "t");
                assert_eq!(senders.len(), 3);
                assert_eq!(transactions.len(), 3);
                assert_eq!(*total_value, 600.0);
            }
            other => panic!("unexpected evidence {:?}", other),
        }
        assert_eq!(finding.nodes.len(), 4);
        assert_eq!(finding.edges.len(), 3);
    }

    #[test]
    fn test_two_small_payments_not_flagged() {
        let store = store(vec![tx("1", "a", "t", 100.0), tx("2", "b", "t", 200.0)]);
        let finding = SmurfingDetector::default().detect(&store);
        assert!(finding.is_empty());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let store = store(vec![
            tx("1", "a", "t", 100.0),
            tx("2", "b", "t", 200.0),
            tx("3", "c", "t", 10_000.0),
        ]);
        let finding = SmurfingDetector::default().detect(&store);
        assert!(finding.is_empty());
    }

    #[test]
    fn test_zero_value_not_counted() {
        let store = store(vec![
            tx("1", "a", "t", 100.0),
            tx("2", "b", "t", 200.0),
            tx("3", "c", "t", 0.0),
        ]);
        let finding = SmurfingDetector::default().detect(&store);
        assert!(finding.is_empty());
    }

    #[test]
    fn test_repeat_sender_counted_once_as_node() {
        let store = store(vec![
            tx("1", "a", "t", 10.0),
            tx("2", "a", "t", 20.0),
            tx("3", "a", "t", 30.0),
        ]);
        let finding = SmurfingDetector::default().detect(&store);
        assert_eq!(finding.nodes, vec![AccountId::from("t"), AccountId::from("a")]);
        assert_eq!(finding.edges.len(), 3);
    }

    #[test]
    fn test_custom_parameters() {
        let detector = SmurfingDetector {
            threshold: 50.0,
            min_transactions: 2,
        };
        let store = store(vec![
            tx("1", "a", "t", 10.0),
            tx("2", "b", "t", 49.0),
            tx("3", "c", "u", 60.0),
            tx("4", "d", "u", 10.0),
        ]);
        let finding = detector.detect(&store);
        assert_eq!(finding.evidence.len(), 1);
        assert!(finding.contains_node(&"t".into()));
        assert!(!finding.contains_node(&"u".into()));
    }

    #[test]
    fn test_empty_store() {
        let finding = SmurfingDetector::default().detect(&GraphStore::new());
        assert!(finding.is_empty());
    }

    #[test]
    fn test_accounts_without_transactions() {
        let finding = SmurfingDetector::default().detect(&store(vec![]));
        assert!(finding.is_empty());
    }
}
