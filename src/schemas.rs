//! Data schemas for the detection engine.
//!
//! Accounts and transactions as loaded into a snapshot, the raw records the
//! ingestion layer produces, and run metadata written alongside findings.
//! This module is the canonical schema definition for the whole crate.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version for tracking changes
pub const SCHEMA_VERSION: &str = "1.0.0";

// ============================================================================
// PART A: Identifiers
// ============================================================================

/// Stable account key, unique within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Transaction key, unique within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// PART B: Snapshot Schema
// ============================================================================

/// Account node in a loaded snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,

    /// Display label (the account id unless the source provides one)
    pub label: String,

    /// Aggregate incoming value, used for sizing only
    pub total_incoming_value: f64,

    /// Aggregate outgoing value, used for sizing only
    pub total_outgoing_value: f64,

    /// Externally computed risk score, carried as-is
    pub risk_score: Option<f64>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        let id = AccountId::new(id);
        Self {
            label: id.to_string(),
            id,
            total_incoming_value: 0.0,
            total_outgoing_value: 0.0,
            risk_score: None,
        }
    }

    /// Combined flow used to size the node when rendered
    pub fn display_value(&self) -> f64 {
        self.total_incoming_value + self.total_outgoing_value
    }
}

/// Directed, timestamped, valued transfer between two accounts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: AccountId,
    pub to: AccountId,
    pub value: f64,

    /// `None` when the source timestamp could not be parsed
    pub timestamp: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: TransactionId::new(id),
            from: AccountId::new(from),
            to: AccountId::new(to),
            value,
            timestamp,
        }
    }

    /// Zero, negative and non-finite values never take part in analysis
    pub fn has_analyzable_value(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}

// ============================================================================
// PART C: Raw Input Records
// ============================================================================

/// Account row as read from an accounts table. Every field may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub account_id: Option<String>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub total_incoming_value: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub total_outgoing_value: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub ml_risk_score: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub incoming_tx_count: Option<u64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub avg_incoming_value: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub outgoing_tx_count: Option<u64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub avg_outgoing_value: Option<f64>,
}

impl AccountRecord {
    /// Convert into a snapshot account; records without an id are dropped
    pub fn into_account(self) -> Option<Account> {
        let id = non_empty(self.account_id)?;
        let mut account = Account::new(id);
        account.total_incoming_value = self.total_incoming_value.unwrap_or(0.0);
        account.total_outgoing_value = self.total_outgoing_value.unwrap_or(0.0);
        account.risk_score = self.ml_risk_score;
        Some(account)
    }
}

/// Transaction row as read from a transactions table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub from: Option<String>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub to: Option<String>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub value: Option<f64>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub timestamp: Option<String>,

    /// Ground-truth marker written by the synthetic generator
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub is_fraud: Option<bool>,
}

impl TransactionRecord {
    /// Convert into a snapshot transaction; records missing `id`, `from`,
    /// `to` or `value` are dropped
    pub fn into_transaction(self) -> Option<Transaction> {
        let id = non_empty(self.id)?;
        let from = non_empty(self.from)?;
        let to = non_empty(self.to)?;
        let value = self.value?;
        let timestamp = self.timestamp.as_deref().and_then(parse_timestamp);
        Some(Transaction::new(id, from, to, value, timestamp))
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a source timestamp into an ordered instant.
///
/// Accepts RFC 3339, naive ISO-8601 date-times (read as UTC), plain dates and
/// integer epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }

    raw.parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}

// ============================================================================
// Metadata Schema
// ============================================================================

/// Run metadata for reproducibility and auditing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Schema version used
    pub schema_version: String,

    /// Detection run timestamp
    pub run_timestamp: DateTime<Utc>,

    /// Accounts input file
    pub accounts_source: String,

    /// Transactions input file
    pub transactions_source: String,

    /// Record counts by type
    pub record_counts: RecordCounts,

    /// Git commit hash (if available)
    pub git_commit: Option<String>,

    /// Engine version
    pub engine_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecordCounts {
    pub accounts: usize,
    pub transactions: usize,
    pub excluded_transactions: usize,
    pub flagged_accounts: usize,
    pub flagged_transactions: usize,
}

impl RunMetadata {
    pub fn new(accounts_source: impl Into<String>, transactions_source: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_timestamp: Utc::now(),
            accounts_source: accounts_source.into(),
            transactions_source: transactions_source.into(),
            record_counts: RecordCounts::default(),
            git_commit: get_git_commit(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn get_git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
}

// ============================================================================
// Polars Schema Definitions
// ============================================================================

use polars::prelude::*;

/// Create Polars schema for accounts.parquet
pub fn accounts_schema() -> Schema {
    Schema::from_iter([
        Field::new("account_id".into(), DataType::String),
        Field::new("total_incoming_value".into(), DataType::Float64),
        Field::new("total_outgoing_value".into(), DataType::Float64),
        Field::new("ml_risk_score".into(), DataType::Float64),
        Field::new("incoming_tx_count".into(), DataType::UInt64),
        Field::new("avg_incoming_value".into(), DataType::Float64),
        Field::new("outgoing_tx_count".into(), DataType::UInt64),
        Field::new("avg_outgoing_value".into(), DataType::Float64),
    ])
}

/// Create Polars schema for transactions.parquet
pub fn transactions_schema() -> Schema {
    Schema::from_iter([
        Field::new("id".into(), DataType::String),
        Field::new("from".into(), DataType::String),
        Field::new("to".into(), DataType::String),
        Field::new("value".into(), DataType::Float64),
        Field::new("timestamp".into(), DataType::String), // ISO-8601 string
        Field::new("is_fraud".into(), DataType::Boolean),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_schema_version() {
        assert!(!SCHEMA_VERSION.is_empty());
    }

    #[test]
    fn test_account_record_without_id_is_dropped() {
        let record = AccountRecord {
            account_id: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(record.into_account().is_none());
    }

    #[test]
    fn test_account_record_defaults_totals() {
        let record = AccountRecord {
            account_id: Some("17".to_string()),
            total_incoming_value: Some(250.0),
            ml_risk_score: Some(42.5),
            ..Default::default()
        };
        let account = record.into_account().unwrap();
        assert_eq!(account.id.as_str(), "17");
        assert_eq!(account.label, "17");
        assert_eq!(account.display_value(), 250.0);
        assert_eq!(account.risk_score, Some(42.5));
    }

    #[test]
    fn test_transaction_record_requires_value() {
        let record = TransactionRecord {
            id: Some("1".to_string()),
            from: Some("a".to_string()),
            to: Some("b".to_string()),
            value: None,
            timestamp: Some("2025-01-01T00:00:00".to_string()),
            is_fraud: None,
        };
        assert!(record.into_transaction().is_none());
    }

    #[test]
    fn test_transaction_record_keeps_bad_timestamp_as_none() {
        let record = TransactionRecord {
            id: Some("1".to_string()),
            from: Some("a".to_string()),
            to: Some("b".to_string()),
            value: Some(10.0),
            timestamp: Some("not a date".to_string()),
            is_fraud: None,
        };
        let tx = record.into_transaction().unwrap();
        assert!(tx.timestamp.is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2025-01-03T12:00:00+00:00").unwrap();
        let naive = parse_timestamp("2025-01-03T12:00:00").unwrap();
        let spaced = parse_timestamp("2025-01-03 12:00:00.000").unwrap();
        assert_eq!(rfc, naive);
        assert_eq!(naive, spaced);

        let date = parse_timestamp("2025-01-03").unwrap();
        assert_eq!(date.hour(), 0);

        let millis = parse_timestamp("0").unwrap();
        assert_eq!(millis, Utc.timestamp_opt(0, 0).unwrap());

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_analyzable_value() {
        assert!(Transaction::new("1", "a", "b", 5.0, None).has_analyzable_value());
        assert!(!Transaction::new("2", "a", "b", 0.0, None).has_analyzable_value());
        assert!(!Transaction::new("3", "a", "b", -1.0, None).has_analyzable_value());
        assert!(!Transaction::new("4", "a", "b", f64::NAN, None).has_analyzable_value());
    }
}
