//! Display-state projection of findings onto the account graph.
//!
//! Applying a finding emphasizes its accounts and transactions and dims
//! everything else. `reset` returns every element to the neutral style and
//! can be called any number of times.

use crate::finding::{Finding, PatternKind};
use crate::graph_store::GraphStore;
use crate::schemas::{AccountId, TransactionId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const NEUTRAL_EDGE_WIDTH: f64 = 1.5;
pub const EMPHASIZED_EDGE_WIDTH: f64 = 3.0;
pub const THIN_EDGE_WIDTH: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightGroup {
    Normal,
    Dim,
    Smurfing,
    Layering,
    RapidMovement,
}

impl HighlightGroup {
    pub fn for_kind(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Smurfing => Self::Smurfing,
            PatternKind::Layering => Self::Layering,
            PatternKind::RapidMovement => Self::RapidMovement,
        }
    }

    /// Node fill colour
    pub fn background(&self) -> &'static str {
        match self {
            Self::Normal => "#2a303c",
            Self::Dim => "#12151c",
            Self::Smurfing => "#d97706",
            Self::Layering => "#9333ea",
            Self::RapidMovement => "#dc2626",
        }
    }

    /// Node border colour, also used for emphasized edges
    pub fn accent(&self) -> &'static str {
        match self {
            Self::Normal => "#8a93a5",
            Self::Dim => "#363c4a",
            Self::Smurfing => "#fde68a",
            Self::Layering => "#e9d5ff",
            Self::RapidMovement => "#fecaca",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeStyle {
    pub group: HighlightGroup,
    pub shadow: bool,
}

impl NodeStyle {
    pub const NEUTRAL: NodeStyle = NodeStyle {
        group: HighlightGroup::Normal,
        shadow: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub width: f64,
    /// `None` keeps the default edge colour
    pub color: Option<&'static str>,
}

impl EdgeStyle {
    pub const NEUTRAL: EdgeStyle = EdgeStyle {
        width: NEUTRAL_EDGE_WIDTH,
        color: None,
    };
}

/// Per-element display state for one loaded snapshot
#[derive(Debug, Clone, Default)]
pub struct HighlightState {
    nodes: HashMap<AccountId, NodeStyle>,
    edges: HashMap<TransactionId, EdgeStyle>,
    active: Option<PatternKind>,
}

impl HighlightState {
    /// Neutral state over every account and transaction in `store`
    pub fn new(store: &GraphStore) -> Self {
        Self {
            nodes: store
                .account_ids()
                .map(|id| (id.clone(), NodeStyle::NEUTRAL))
                .collect(),
            edges: store
                .transactions()
                .iter()
                .map(|tx| (tx.id.clone(), EdgeStyle::NEUTRAL))
                .collect(),
            active: None,
        }
    }

    /// Emphasize the finding's elements and dim the rest.
    ///
    /// Replaces whatever finding was applied before.
    pub fn apply(&mut self, finding: &Finding) {
        let group = HighlightGroup::for_kind(finding.kind);
        let flagged_nodes: HashSet<&AccountId> = finding.nodes.iter().collect();
        let flagged_edges: HashSet<&TransactionId> = finding.edges.iter().collect();

        for (id, style) in self.nodes.iter_mut() {
            let flagged = flagged_nodes.contains(id);
            *style = NodeStyle {
                group: if flagged { group } else { HighlightGroup::Dim },
                shadow: flagged,
            };
        }
        for (id, style) in self.edges.iter_mut() {
            *style = if flagged_edges.contains(id) {
                EdgeStyle {
                    width: EMPHASIZED_EDGE_WIDTH,
                    color: Some(group.accent()),
                }
            } else {
                EdgeStyle {
                    width: THIN_EDGE_WIDTH,
                    color: None,
                }
            };
        }

        self.active = Some(finding.kind);
        debug!(
            kind = %finding.kind,
            nodes = finding.nodes.len(),
            edges = finding.edges.len(),
            "Highlight applied"
        );
    }

    /// Restore every element to the neutral style
    pub fn reset(&mut self) {
        self.nodes
            .values_mut()
            .for_each(|style| *style = NodeStyle::NEUTRAL);
        self.edges
            .values_mut()
            .for_each(|style| *style = EdgeStyle::NEUTRAL);
        self.active = None;
    }

    pub fn is_neutral(&self) -> bool {
        self.active.is_none()
            && self.nodes.values().all(|s| *s == NodeStyle::NEUTRAL)
            && self.edges.values().all(|s| *s == EdgeStyle::NEUTRAL)
    }

    pub fn active(&self) -> Option<PatternKind> {
        self.active
    }

    pub fn node(&self, id: &AccountId) -> Option<&NodeStyle> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &TransactionId) -> Option<&EdgeStyle> {
        self.edges.get(id)
    }
}
