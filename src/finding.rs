//! Uniform detector output.
//!
//! Every detector returns a [`Finding`]: the flagged accounts, the flagged
//! transactions and one [`Evidence`] entry per reported item. The
//! [`Highlight`] projection keeps only the node and edge sets.

use crate::schemas::{AccountId, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Pattern searched for by a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Smurfing,
    Layering,
    RapidMovement,
}

impl PatternKind {
    pub const ALL: [PatternKind; 3] = [
        PatternKind::Smurfing,
        PatternKind::Layering,
        PatternKind::RapidMovement,
    ];
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Smurfing => write!(f, "smurfing"),
            PatternKind::Layering => write!(f, "layering"),
            PatternKind::RapidMovement => write!(f, "rapid_movement"),
        }
    }
}

/// One reported item, tied to the accounts and amounts it concerns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    /// Many small inbound payments aggregating at one account
    Smurfing {
        account: AccountId,
        senders: Vec<AccountId>,
        transactions: Vec<TransactionId>,
        total_value: f64,
    },
    /// Circular chain in DFS traversal order, not repeating the start
    Cycle {
        path: Vec<AccountId>,
        transactions: Vec<TransactionId>,
    },
    /// Funds received and forwarded within the time window
    PassThrough {
        account: AccountId,
        sender: AccountId,
        recipient: AccountId,
        inbound: TransactionId,
        outbound: TransactionId,
        inbound_value: f64,
        outbound_value: f64,
        elapsed_minutes: f64,
    },
}

impl Evidence {
    /// Transactions this entry refers to
    pub fn transactions(&self) -> Vec<&TransactionId> {
        match self {
            Evidence::Smurfing { transactions, .. } | Evidence::Cycle { transactions, .. } => {
                transactions.iter().collect()
            }
            Evidence::PassThrough {
                inbound, outbound, ..
            } => vec![inbound, outbound],
        }
    }
}

/// Node and edge ids only, the silent-mode projection of a finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub nodes: Vec<AccountId>,
    pub edges: Vec<TransactionId>,
}

impl Highlight {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Result of a single detector run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "FindingRecord")]
pub struct Finding {
    pub kind: PatternKind,
    /// Flagged accounts, first-flagged order, no duplicates
    pub nodes: Vec<AccountId>,
    /// Flagged transactions, first-flagged order, no duplicates
    pub edges: Vec<TransactionId>,
    pub evidence: Vec<Evidence>,
    #[serde(skip)]
    seen_nodes: HashSet<AccountId>,
    #[serde(skip)]
    seen_edges: HashSet<TransactionId>,
}

impl Finding {
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            evidence: Vec::new(),
            seen_nodes: HashSet::new(),
            seen_edges: HashSet::new(),
        }
    }

    pub fn flag_node(&mut self, id: &AccountId) {
        if self.seen_nodes.insert(id.clone()) {
            self.nodes.push(id.clone());
        }
    }

    pub fn flag_edge(&mut self, id: &TransactionId) {
        if self.seen_edges.insert(id.clone()) {
            self.edges.push(id.clone());
        }
    }

    pub fn push_evidence(&mut self, evidence: Evidence) {
        self.evidence.push(evidence);
    }

    /// No flagged elements: the explicit "no findings" state
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.evidence.is_empty()
    }

    pub fn contains_node(&self, id: &AccountId) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, id: &TransactionId) -> bool {
        self.edges.contains(id)
    }

    pub fn highlight(&self) -> Highlight {
        Highlight {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

/// The seen-sets mirror `nodes` and `edges` and take no part in equality
impl PartialEq for Finding {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.evidence == other.evidence
    }
}

/// Serialized shape of a [`Finding`]
#[derive(Deserialize)]
struct FindingRecord {
    kind: PatternKind,
    #[serde(default)]
    nodes: Vec<AccountId>,
    #[serde(default)]
    edges: Vec<TransactionId>,
    #[serde(default)]
    evidence: Vec<Evidence>,
}

impl From<FindingRecord> for Finding {
    fn from(record: FindingRecord) -> Self {
        let mut finding = Finding::new(record.kind);
        record.nodes.iter().for_each(|id| finding.flag_node(id));
        record.edges.iter().for_each(|id| finding.flag_edge(id));
        finding.evidence = record.evidence;
        finding
    }
}
