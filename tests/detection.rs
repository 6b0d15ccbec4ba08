use aml_pattern_engine::config::DetectionConfig;
use aml_pattern_engine::highlight::{HighlightGroup, HighlightState};
use aml_pattern_engine::ingest::{
    account_records_from_csv, to_accounts, to_transactions, transaction_records_from_csv,
};
use aml_pattern_engine::report::Report;
use aml_pattern_engine::{Engine, Evidence, PatternKind};

const ACCOUNTS: &str = "\
account_id,total_incoming_value,total_outgoing_value,ml_risk_score
1,0,0,12.5
2,0,0,3
3,0,0,
10,0,0,88
20,0,0,50
21,0,0,10
22,0,0,10
30,0,0,1
31,0,0,1
32,0,0,1
";

const TRANSACTIONS: &str = "\
id,from,to,value,timestamp
s1,1,10,9000,2025-02-01T10:00:00
s2,2,10,9500,2025-02-01T12:00:00
s3,3,10,8800,2025-02-01T14:00:00
c1,20,21,50000,2025-03-01T10:00:00
c2,21,22,48000,2025-03-01T10:15:00
c3,22,20,47000,2025-03-01T10:30:00
r1,30,31,100000,2025-04-01T09:00:00
r2,31,32,97000,2025-04-01T09:20:00
z1,1,2,0,2025-04-02T09:00:00
bad,1,2,notanumber,2025-04-02T09:00:00
";

fn engine() -> Engine {
    let accounts = to_accounts(account_records_from_csv(ACCOUNTS.as_bytes()).unwrap());
    let transactions =
        to_transactions(transaction_records_from_csv(TRANSACTIONS.as_bytes()).unwrap());

    let engine = Engine::new(DetectionConfig::default());
    let report = engine.load(accounts, transactions);
    assert_eq!(report.accounts, 10);
    assert_eq!(report.transactions, 8);
    assert_eq!(report.excluded_transactions, 1);
    engine
}

#[test]
fn test_all_three_patterns_detected() {
    let engine = engine();
    let findings = engine.detect_all().unwrap();
    assert_eq!(findings.len(), 3);

    let smurfing = &findings[0];
    assert_eq!(smurfing.kind, PatternKind::Smurfing);
    assert!(smurfing.contains_node(&"10".into()));
    assert_eq!(smurfing.edges.len(), 3);

    let layering = &findings[1];
    assert_eq!(layering.evidence.len(), 1);
    match &layering.evidence[0] {
        Evidence::Cycle { path, transactions } => {
            assert_eq!(path.len(), 3);
            assert_eq!(transactions.len(), 3);
        }
        other => panic!("unexpected evidence {:?}", other),
    }

    // c1→c2 and c2→c3 forward within 15 minutes at ≥95% of the inbound
    // value, so the cycle also shows up as pass-through
    let rapid = &findings[2];
    assert!(rapid.contains_node(&"31".into()));
    assert!(rapid.contains_edge(&"r1".into()));
    assert!(rapid.contains_edge(&"r2".into()));
    assert_eq!(rapid.evidence.len(), 3);
}

#[test]
fn test_reports_render() {
    let engine = engine();
    let report = Report::from_finding(&engine.detect(PatternKind::Smurfing));
    assert_eq!(report.title, "Smurfing Detected");
    assert_eq!(
        report.lines,
        vec!["Account 10 received 3 payments totaling $27,300."]
    );

    let rapid = Report::from_finding(&engine.detect(PatternKind::RapidMovement));
    assert!(rapid
        .lines
        .contains(&"Acc 31 pass-through: $100,000 in, $97,000 out in 20.0m.".to_string()));
}

#[test]
fn test_highlight_then_reset() {
    let engine = engine();
    let store = engine.snapshot();
    let mut state = HighlightState::new(&store);

    state.apply(&engine.detect(PatternKind::Layering));
    assert_eq!(
        state.node(&"21".into()).map(|s| s.group),
        Some(HighlightGroup::Layering)
    );
    assert_eq!(
        state.node(&"10".into()).map(|s| s.group),
        Some(HighlightGroup::Dim)
    );

    state.reset();
    assert!(state.is_neutral());
}

#[test]
fn test_detection_is_deterministic() {
    let engine = engine();
    assert_eq!(engine.detect_all().unwrap(), engine.detect_all().unwrap());
}
