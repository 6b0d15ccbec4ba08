use crate::config::DetectionConfig;
use crate::finding::{Finding, PatternKind};
use crate::graph_store::GraphStore;
use crate::layering::LayeringDetector;
use crate::rapid_movement::RapidMovementDetector;
use crate::smurfing::SmurfingDetector;

pub trait Detector: std::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> PatternKind;

    /// Pure analysis over a read-only snapshot; never mutates the store.
    fn detect(&self, store: &GraphStore) -> Finding;
}

/// Build the detector for `kind` from its configured parameters
pub fn detector_for(kind: PatternKind, config: &DetectionConfig) -> Box<dyn Detector> {
    match kind {
        PatternKind::Smurfing => Box::new(SmurfingDetector::from(&config.smurfing)),
        PatternKind::Layering => Box::new(LayeringDetector),
        PatternKind::RapidMovement => {
            Box::new(RapidMovementDetector::from(&config.rapid_movement))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_for_matches_kind() {
        let config = DetectionConfig::default();
        for kind in PatternKind::ALL {
            assert_eq!(detector_for(kind, &config).kind(), kind);
        }
    }
}
