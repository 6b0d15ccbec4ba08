//! Snapshot ownership and detector dispatch.
//!
//! The engine holds the current snapshot behind an `Arc`. Every detection
//! call captures that `Arc` once, so a concurrent `load` swaps in a new
//! snapshot without disturbing runs already in flight.

use crate::config::DetectionConfig;
use crate::detector::{detector_for, Detector};
use crate::finding::{Finding, PatternKind};
use crate::graph_store::{GraphStore, LoadReport};
use crate::schemas::{Account, Transaction};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{kind} detector panicked: {message}")]
    DetectorPanicked { kind: PatternKind, message: String },
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(Debug)]
pub struct Engine {
    config: DetectionConfig,
    detectors: Vec<Box<dyn Detector>>,
    snapshot: RwLock<Arc<GraphStore>>,
}

impl Engine {
    pub fn new(config: DetectionConfig) -> Self {
        let detectors = PatternKind::ALL
            .into_iter()
            .map(|kind| detector_for(kind, &config))
            .collect();
        Self {
            config,
            detectors,
            snapshot: RwLock::new(Arc::new(GraphStore::new())),
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Replace the current snapshot.
    ///
    /// The new store is built before the lock is taken; the write lock is
    /// only held for the pointer swap.
    pub fn load(
        &self,
        accounts: impl IntoIterator<Item = Account>,
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> LoadReport {
        let (store, report) = GraphStore::from_snapshot(accounts, transactions);
        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(store);
        report
    }

    /// The snapshot current at the time of the call
    pub fn snapshot(&self) -> Arc<GraphStore> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn detector(&self, kind: PatternKind) -> Option<&dyn Detector> {
        self.detectors
            .iter()
            .find(|d| d.kind() == kind)
            .map(|d| d.as_ref())
    }

    /// Run one detector against the current snapshot
    pub fn detect(&self, kind: PatternKind) -> Finding {
        let store = self.snapshot();
        match self.detector(kind) {
            Some(detector) => detector.detect(&store),
            None => Finding::new(kind),
        }
    }

    /// Run every detector concurrently against one snapshot.
    ///
    /// Results come back in `PatternKind::ALL` order. A detector that panics
    /// fails the whole run; its absence is never reported as "no findings".
    pub fn detect_all(&self) -> Result<Vec<Finding>, EngineError> {
        let store = self.snapshot();
        let store: &GraphStore = &store;

        let findings: Vec<Finding> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .detectors
                .iter()
                .map(|detector| (detector.kind(), scope.spawn(move || detector.detect(store))))
                .collect();

            handles
                .into_iter()
                .map(|(kind, handle)| {
                    handle.join().map_err(|payload| {
                        let message = panic_message(payload.as_ref());
                        error!(%kind, "Detector failed: {}", message);
                        EngineError::DetectorPanicked { kind, message }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        info!(
            "Detection run complete: {}",
            findings
                .iter()
                .map(|f| format!("{}={}", f.kind, f.evidence.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(findings)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<Account>, Vec<Transaction>) {
        let accounts = ["A", "B", "C"].into_iter().map(Account::new).collect();
        let txs = vec![
            Transaction::new("1", "A", "B", 50_000.0, None),
            Transaction::new("2", "B", "C", 50_000.0, None),
            Transaction::new("3", "C", "A", 50_000.0, None),
        ];
        (accounts, txs)
    }

    #[test]
    fn test_empty_engine_finds_nothing() {
        let engine = Engine::default();
        for finding in engine.detect_all().unwrap() {
            assert!(finding.is_empty());
        }
    }

    #[test]
    fn test_detect_all_in_kind_order() {
        let engine = Engine::default();
        let (accounts, txs) = triangle();
        engine.load(accounts, txs);

        let findings = engine.detect_all().unwrap();
        let kinds: Vec<_> = findings.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, PatternKind::ALL.to_vec());
        assert_eq!(findings[1].evidence.len(), 1);
        assert_eq!(findings[1], engine.detect(PatternKind::Layering));
    }

    #[derive(Debug)]
    struct FailingDetector;

    impl Detector for FailingDetector {
        fn kind(&self) -> PatternKind {
            PatternKind::Layering
        }

        fn detect(&self, _store: &GraphStore) -> Finding {
            panic!("adjacency corrupted");
        }
    }

    #[test]
    fn test_detector_panic_is_an_error_not_an_empty_finding() {
        let mut engine = Engine::default();
        let (accounts, txs) = triangle();
        engine.load(accounts, txs);
        engine.detectors[1] = Box::new(FailingDetector);

        match engine.detect_all() {
            Err(EngineError::DetectorPanicked { kind, message }) => {
                assert_eq!(kind, PatternKind::Layering);
                assert_eq!(message, "adjacency corrupted");
            }
            Ok(findings) => panic!("expected failure, got {:?}", findings),
        }

        assert_eq!(engine.detect(PatternKind::Smurfing).kind, PatternKind::Smurfing);
    }

    #[test]
    fn test_held_snapshot_survives_reload() {
        let engine = Engine::default();
        let (accounts, txs) = triangle();
        engine.load(accounts, txs);

        let held = engine.snapshot();
        let report = engine.load(vec![Account::new("Z")], vec![]);

        assert_eq!(report.accounts, 1);
        assert_eq!(held.account_count(), 3);
        assert_eq!(engine.snapshot().account_count(), 1);
        assert!(engine.detect(PatternKind::Layering).is_empty());
    }

    #[test]
    fn test_concurrent_detection_and_load() {
        let engine = Engine::default();
        let (accounts, txs) = triangle();
        engine.load(accounts.clone(), txs.clone());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        let finding = engine.detect(PatternKind::Layering);
                        // Either snapshot is complete: one cycle or none
                        assert!(finding.evidence.len() <= 1);
                    }
                });
            }
            scope.spawn(|| {
                for i in 0..20 {
                    if i % 2 == 0 {
                        engine.load(accounts.clone(), txs.clone());
                    } else {
                        engine.load(Vec::new(), Vec::new());
                    }
                }
            });
        });
    }
}
