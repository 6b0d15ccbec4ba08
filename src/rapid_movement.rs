//! Rapid pass-through detection.
//!
//! For every account with both inbound and outbound transfers, each
//! (inbound, outbound) pair is tested: the outbound transfer must follow
//! within `window_minutes` (strictly later) and carry at least
//! `similarity_ratio` of the inbound value.
//!
//! Pairs are neither deduplicated nor ranked. An account with several
//! matching transfers yields one entry per matching pair, including
//! overlapping ones.

use crate::config::RapidMovementConfig;
use crate::detector::Detector;
use crate::finding::{Evidence, Finding, PatternKind};
use crate::graph_store::GraphStore;
use crate::schemas::Transaction;
use tracing::{debug, info};

pub const DEFAULT_WINDOW_MINUTES: f64 = 60.0;
pub const DEFAULT_SIMILARITY_RATIO: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct RapidMovementDetector {
    pub window_minutes: f64,
    pub similarity_ratio: f64,
}

impl Default for RapidMovementDetector {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            similarity_ratio: DEFAULT_SIMILARITY_RATIO,
        }
    }
}

impl From<&RapidMovementConfig> for RapidMovementDetector {
    fn from(config: &RapidMovementConfig) -> Self {
        Self {
            window_minutes: config.window_minutes,
            similarity_ratio: config.similarity_ratio,
        }
    }
}

impl RapidMovementDetector {
    /// Minutes from `inbound` to `outbound` when the pair qualifies
    pub fn qualifies(&self, inbound: &Transaction, outbound: &Transaction) -> Option<f64> {
        let (received, sent) = (inbound.timestamp?, outbound.timestamp?);
        let elapsed = (sent - received).num_milliseconds() as f64 / 60_000.0;

        let in_window = elapsed > 0.0 && elapsed <= self.window_minutes;
        let similar = outbound.value >= inbound.value * self.similarity_ratio;

        (in_window && similar).then_some(elapsed)
    }
}

impl Detector for RapidMovementDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::RapidMovement
    }

    fn detect(&self, store: &GraphStore) -> Finding {
        let mut finding = Finding::new(PatternKind::RapidMovement);

        for account in store.node_ids() {
            let ins = store.inbound(account);
            let outs = store.outbound(account);
            if ins.is_empty() || outs.is_empty() {
                continue;
            }

            for inbound in &ins {
                for outbound in &outs {
                    let Some(elapsed_minutes) = self.qualifies(inbound, outbound) else {
                        continue;
                    };

                    debug!(
                        account = %account,
                        inbound = %inbound.id,
                        outbound = %outbound.id,
                        elapsed_minutes,
                        "Pass-through pair"
                    );

                    finding.flag_node(&inbound.from);
                    finding.flag_node(account);
                    finding.flag_node(&outbound.to);
                    finding.flag_edge(&inbound.id);
                    finding.flag_edge(&outbound.id);
                    finding.push_evidence(Evidence::PassThrough {
                        account: account.clone(),
                        sender: inbound.from.clone(),
                        recipient: outbound.to.clone(),
                        inbound: inbound.id.clone(),
                        outbound: outbound.id.clone(),
                        inbound_value: inbound.value,
                        outbound_value: outbound.value,
                        elapsed_minutes,
                    });
                }
            }
        }

        info!(
            "Rapid movement scan: {} pass-through pairs across {} accounts",
            finding.evidence.len(),
            finding.nodes.len()
        );
        finding
    }
}
