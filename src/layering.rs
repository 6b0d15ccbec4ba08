//! Layering detection: circular payment chains.
//!
//! Depth-first search over every account (so disconnected components are
//! covered) with a global visited set, an on-path set and the explicit path.
//! Reaching an account that is still on the path closes a cycle: the path
//! slice from that account to the current end. Slices shorter than two
//! accounts (self-loops) are dropped.
//!
//! An account is never explored twice. When an account lies on several
//! cycles, only those visible along the first exploration order are reported,
//! so results depend on account and transaction load order. Full simple-cycle
//! enumeration is out of scope here.

use crate::detector::Detector;
use crate::finding::{Evidence, Finding, PatternKind};
use crate::graph_store::GraphStore;
use crate::schemas::AccountId;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct LayeringDetector;

/// One account on the active DFS path with its pending outbound targets
struct Frame<'a> {
    node: &'a AccountId,
    targets: Vec<&'a AccountId>,
    cursor: usize,
}

/// Bookkeeping for the active traversal
#[derive(Default)]
struct Traversal<'a> {
    visited: HashSet<&'a AccountId>,
    /// Account → its position in `path`, for accounts on the active path
    on_path: HashMap<&'a AccountId, usize>,
    path: Vec<&'a AccountId>,
}

impl<'a> Traversal<'a> {
    fn enter(&mut self, store: &'a GraphStore, node: &'a AccountId) -> Frame<'a> {
        self.visited.insert(node);
        self.on_path.insert(node, self.path.len());
        self.path.push(node);
        Frame {
            node,
            targets: store.outbound(node).into_iter().map(|tx| &tx.to).collect(),
            cursor: 0,
        }
    }

    fn leave(&mut self, frame: &Frame<'a>) {
        self.path.pop();
        self.on_path.remove(frame.node);
    }
}

/// Enumerate cycles in DFS discovery order.
///
/// Iterative, so path depth is bounded by account count rather than by the
/// native call stack.
pub fn find_cycles(store: &GraphStore) -> Vec<Vec<AccountId>> {
    let mut cycles = Vec::new();
    let mut traversal = Traversal::default();

    for root in store.account_ids() {
        if traversal.visited.contains(root) {
            continue;
        }

        let mut stack = vec![traversal.enter(store, root)];

        while let Some(frame) = stack.last_mut() {
            if frame.cursor == frame.targets.len() {
                if let Some(done) = stack.pop() {
                    traversal.leave(&done);
                }
                continue;
            }

            let next = frame.targets[frame.cursor];
            frame.cursor += 1;

            if !traversal.visited.contains(next) {
                let child = traversal.enter(store, next);
                stack.push(child);
            } else if let Some(&start) = traversal.on_path.get(next) {
                let cycle = &traversal.path[start..];
                if cycle.len() > 1 {
                    cycles.push(cycle.iter().map(|&id| id.clone()).collect());
                }
            }
        }
    }

    cycles
}

impl Detector for LayeringDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Layering
    }

    fn detect(&self, store: &GraphStore) -> Finding {
        let mut finding = Finding::new(PatternKind::Layering);

        for path in find_cycles(store) {
            let mut transactions = Vec::with_capacity(path.len());

            for (i, from) in path.iter().enumerate() {
                finding.flag_node(from);
                let to = &path[(i + 1) % path.len()];
                // Parallel transfers: only the earliest-loaded one is reported
                if let Some(tx) = store.first_transaction_between(from, to) {
                    finding.flag_edge(&tx.id);
                    transactions.push(tx.id.clone());
                }
            }

            debug!(length = path.len(), start = %path[0], "Layering cycle found");
            finding.push_evidence(Evidence::Cycle { path, transactions });
        }

        info!(
            "Layering scan: {} cycles over {} accounts",
            finding.evidence.len(),
            finding.nodes.len()
        );
        finding
    }
}
