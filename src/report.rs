//! Text reports over detector findings and account details.

use crate::finding::{Evidence, Finding, PatternKind};
use crate::graph_store::GraphStore;
use crate::schemas::{AccountId, TransactionId};
use serde::Serialize;
use std::fmt;

/// Human-readable summary of one finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: PatternKind,
    pub title: String,
    pub detected: bool,
    pub lines: Vec<String>,
    /// Shown instead of `lines` when nothing was detected
    pub empty_message: Option<String>,
}

impl Report {
    pub fn from_finding(finding: &Finding) -> Self {
        let detected = !finding.evidence.is_empty();
        let (found, not_found, empty) = match finding.kind {
            PatternKind::Smurfing => (
                "Smurfing Detected",
                "No Smurfing Detected",
                "No accounts found with multiple small incoming transactions.",
            ),
            PatternKind::Layering => (
                "Layering Cycles Detected",
                "No Layering Cycles Detected",
                "No circular transaction patterns were found.",
            ),
            PatternKind::RapidMovement => (
                "Rapid Movement Detected",
                "No Rapid Movement Detected",
                "No pass-through accounts with immediate withdrawals were found.",
            ),
        };

        let mut cycle_number = 0;
        let lines = finding
            .evidence
            .iter()
            .map(|evidence| match evidence {
                Evidence::Smurfing {
                    account,
                    transactions,
                    total_value,
                    ..
                } => format!(
                    "Account {} received {} payments totaling ${}.",
                    account,
                    transactions.len(),
                    format_amount(*total_value)
                ),
                Evidence::Cycle { path, .. } => {
                    cycle_number += 1;
                    format!("Cycle {}: {}", cycle_number, cycle_path(path))
                }
                Evidence::PassThrough {
                    account,
                    inbound_value,
                    outbound_value,
                    elapsed_minutes,
                    ..
                } => format!(
                    "Acc {} pass-through: ${} in, ${} out in {:.1}m.",
                    account,
                    format_amount(*inbound_value),
                    format_amount(*outbound_value),
                    elapsed_minutes
                ),
            })
            .collect();

        Self {
            kind: finding.kind,
            title: if detected { found } else { not_found }.to_string(),
            detected,
            lines,
            empty_message: (!detected).then(|| empty.to_string()),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if let Some(message) = &self.empty_message {
            writeln!(f, "{}", message)?;
        }
        for line in &self.lines {
            writeln!(f, "  - {}", line)?;
        }
        Ok(())
    }
}

/// `A → B → C → A`
fn cycle_path(path: &[AccountId]) -> String {
    let mut parts: Vec<&str> = path.iter().map(AccountId::as_str).collect();
    if let Some(first) = parts.first().copied() {
        parts.push(first);
    }
    parts.join(" → ")
}

/// Thousands separators, at most two decimals, trailing zeros dropped
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let cents = (value.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    match frac {
        0 => format!("{}{}", sign, grouped),
        f if f % 10 == 0 => format!("{}{}.{}", sign, grouped, f / 10),
        f => format!("{}{}.{:02}", sign, grouped, f),
    }
}

// ============================================================================
// Account details
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskBand {
    Low,
    Elevated,
    High,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score > 75.0 {
            Self::High
        } else if score > 40.0 {
            Self::Elevated
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Elevated => write!(f, "elevated"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterpartyTransfer {
    pub transaction: TransactionId,
    pub counterparty: AccountId,
    pub value: f64,
}

/// Detail panel for one account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountDetails {
    pub id: AccountId,
    pub label: String,
    /// Missing scores read as 0
    pub risk_score: f64,
    pub risk_band: RiskBand,
    pub transfers: Vec<CounterpartyTransfer>,
}

impl AccountDetails {
    /// `None` when `id` is not a snapshot account
    pub fn from_store(store: &GraphStore, id: &AccountId) -> Option<Self> {
        let account = store.account(id)?;
        let risk_score = account.risk_score.filter(|s| s.is_finite()).unwrap_or(0.0);

        let transfers = store
            .connected(id)
            .into_iter()
            .map(|tx| CounterpartyTransfer {
                transaction: tx.id.clone(),
                counterparty: if &tx.from == id {
                    tx.to.clone()
                } else {
                    tx.from.clone()
                },
                value: tx.value,
            })
            .collect();

        Some(Self {
            id: account.id.clone(),
            label: account.label.clone(),
            risk_score,
            risk_band: RiskBand::from_score(risk_score),
            transfers,
        })
    }
}

impl fmt::Display for AccountDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Account: {}", self.label)?;
        writeln!(f, "ID: {}", self.id)?;
        writeln!(f, "ML Risk Score: {:.2} ({})", self.risk_score, self.risk_band)?;
        writeln!(f, "Transactions:")?;
        if self.transfers.is_empty() {
            writeln!(f, "  - No transactions found.")?;
        }
        for transfer in &self.transfers {
            writeln!(
                f,
                "  - TXN to/from {}: ${}",
                transfer.counterparty,
                format_amount(transfer.value)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use crate::layering::LayeringDetector;
    use crate::schemas::{Account, Transaction};
    use crate::smurfing::SmurfingDetector;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(600.0), "600");
        assert_eq!(format_amount(1_000.0), "1,000");
        assert_eq!(format_amount(1_234_567.891), "1,234,567.89");
        assert_eq!(format_amount(9_999.5), "9,999.5");
        assert_eq!(format_amount(-2_500.25), "-2,500.25");
    }

    #[test]
    fn test_smurfing_report() {
        let accounts = ["a", "b", "c", "t"].into_iter().map(Account::new);
        let txs = vec![
            Transaction::new("1", "a", "t", 100.0, None),
            Transaction::new("2", "b", "t", 200.0, None),
            Transaction::new("3", "c", "t", 300.0, None),
        ];
        let (store, _) = GraphStore::from_snapshot(accounts, txs);
        let report = Report::from_finding(&SmurfingDetector::default().detect(&store));

        assert!(report.detected);
        assert_eq!(report.title, "Smurfing Detected");
        assert_eq!(report.lines, vec!["Account t received 3 payments totaling $600."]);
        assert!(report.empty_message.is_none());
    }

    #[test]
    fn test_cycle_report_closes_path() {
        let accounts = ["A", "B", "C"].into_iter().map(Account::new);
        let txs = vec![
            Transaction::new("1", "A", "B", 5.0, None),
            Transaction::new("2", "B", "C", 5.0, None),
            Transaction::new("3", "C", "A", 5.0, None),
        ];
        let (store, _) = GraphStore::from_snapshot(accounts, txs);
        let report = Report::from_finding(&LayeringDetector.detect(&store));
        assert_eq!(report.lines, vec!["Cycle 1: A → B → C → A"]);
    }

    #[test]
    fn test_empty_report() {
        let report = Report::from_finding(&Finding::new(PatternKind::RapidMovement));
        assert!(!report.detected);
        assert_eq!(report.title, "No Rapid Movement Detected");
        let text = report.to_string();
        assert!(text.contains("No pass-through accounts with immediate withdrawals were found."));
    }

    #[test]
    fn test_pass_through_line() {
        let mut finding = Finding::new(PatternKind::RapidMovement);
        finding.push_evidence(Evidence::PassThrough {
            account: "B".into(),
            sender: "A".into(),
            recipient: "C".into(),
            inbound: "1".into(),
            outbound: "2".into(),
            inbound_value: 1_000.0,
            outbound_value: 960.0,
            elapsed_minutes: 30.0,
        });
        let report = Report::from_finding(&finding);
        assert_eq!(
            report.lines,
            vec!["Acc B pass-through: $1,000 in, $960 out in 30.0m."]
        );
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(RiskBand::from_score(0.0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(40.0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(40.01), RiskBand::Elevated);
        assert_eq!(RiskBand::from_score(75.0), RiskBand::Elevated);
        assert_eq!(RiskBand::from_score(75.5), RiskBand::High);
    }

    #[test]
    fn test_account_details() {
        let mut a = Account::new("a");
        a.risk_score = Some(80.0);
        let accounts = vec![a, Account::new("b")];
        let txs = vec![
            Transaction::new("1", "a", "b", 1_500.0, None),
            Transaction::new("2", "b", "a", 20.0, None),
        ];
        let (store, _) = GraphStore::from_snapshot(accounts, txs);

        let details = AccountDetails::from_store(&store, &"a".into()).unwrap();
        assert_eq!(details.risk_band, RiskBand::High);
        assert_eq!(details.transfers.len(), 2);
        assert!(details
            .transfers
            .iter()
            .all(|t| t.counterparty.as_str() == "b"));

        let b = AccountDetails::from_store(&store, &"b".into()).unwrap();
        assert_eq!(b.risk_score, 0.0);
        assert_eq!(b.risk_band, RiskBand::Low);

        assert!(AccountDetails::from_store(&store, &"zzz".into()).is_none());

        let (empty, _) = GraphStore::from_snapshot(vec![Account::new("solo")], vec![]);
        let text = AccountDetails::from_store(&empty, &"solo".into())
            .unwrap()
            .to_string();
        assert!(text.contains("No transactions found."));
    }
}
