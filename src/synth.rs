//! Synthetic dataset generation.
//!
//! Background transfers between random account pairs, plus injected
//! smurfing, layering and rapid-movement patterns marked `is_fraud`. Used for
//! demos and for checking the detectors against known ground truth.

use crate::flows::derive_accounts;
use crate::ingest::{write_account_records, write_transaction_records, IngestError, TableFormat};
use crate::schemas::{AccountId, AccountRecord, TransactionRecord};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}

/// Generator parameters
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub num_accounts: usize,
    pub num_transactions: usize,
    pub smurfing_patterns: usize,
    pub layering_cycles: usize,
    pub rapid_movements: usize,
    /// Fixed seed for reproducible output; entropy when absent
    pub seed: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            num_accounts: 200,
            num_transactions: 1000,
            smurfing_patterns: 8,
            layering_cycles: 5,
            rapid_movements: 6,
            seed: None,
        }
    }
}

impl SynthConfig {
    /// Accounts needed to place every requested pattern
    fn min_accounts(&self) -> usize {
        let mut needed = 2;
        if self.smurfing_patterns > 0 {
            needed = needed.max(MAX_SMURFS + 1);
        }
        if self.layering_cycles > 0 {
            needed = needed.max(MAX_CYCLE_LEN);
        }
        if self.rapid_movements > 0 {
            needed = needed.max(3);
        }
        needed
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        let needed = self.min_accounts();
        if self.num_accounts < needed {
            return Err(SynthError::InvalidParameters(format!(
                "num_accounts must be at least {} for the requested patterns, got {}",
                needed, self.num_accounts
            )));
        }
        Ok(())
    }
}

const MIN_SMURFS: usize = 4;
const MAX_SMURFS: usize = 8;
const MIN_CYCLE_LEN: usize = 3;
const MAX_CYCLE_LEN: usize = 5;

/// Ground truth for the injected patterns
#[derive(Debug, Clone, Default)]
pub struct InjectedPatterns {
    pub smurfing_targets: Vec<AccountId>,
    pub cycles: Vec<Vec<AccountId>>,
    /// Middle account of each rapid pass-through
    pub pass_through: Vec<AccountId>,
}

#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub accounts: Vec<AccountRecord>,
    pub transactions: Vec<TransactionRecord>,
    pub injected: InjectedPatterns,
}

impl SyntheticDataset {
    pub fn fraud_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|t| t.is_fraud == Some(true))
            .count()
    }
}

struct Generator {
    rng: StdRng,
    accounts: Vec<String>,
    start: DateTime<Utc>,
    next_id: u64,
    transactions: Vec<TransactionRecord>,
}

impl Generator {
    fn new(config: &SynthConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            accounts: (1..=config.num_accounts).map(|i| i.to_string()).collect(),
            start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            next_id: 1,
            transactions: Vec::with_capacity(config.num_transactions),
        }
    }

    fn push(&mut self, from: &str, to: &str, value: f64, at: DateTime<Utc>, is_fraud: bool) {
        self.transactions.push(TransactionRecord {
            id: Some(self.next_id.to_string()),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            value: Some(value),
            timestamp: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            is_fraud: Some(is_fraud),
        });
        self.next_id += 1;
    }

    /// `count` distinct accounts
    fn pick(&mut self, count: usize) -> Vec<String> {
        index::sample(&mut self.rng, self.accounts.len(), count)
            .into_iter()
            .map(|i| self.accounts[i].clone())
            .collect()
    }

    fn amount(&mut self, low: f64, high: f64) -> f64 {
        round_cents(self.rng.gen_range(low..high))
    }

    fn day_offset(&mut self, from_day: i64, to_day: i64) -> DateTime<Utc> {
        self.start + Duration::days(self.rng.gen_range(from_day..=to_day))
    }

    fn background(&mut self) {
        let pair = self.pick(2);
        let value = self.amount(500.0, 50_000.0);
        let at = self.day_offset(0, 30) + Duration::hours(self.rng.gen_range(0..=23));
        self.push(&pair[0], &pair[1], value, at, false);
    }

    fn smurfing(&mut self) -> AccountId {
        let target = self.pick(1).swap_remove(0);
        let count = self.rng.gen_range(MIN_SMURFS..=MAX_SMURFS);
        let candidates: Vec<String> = self
            .accounts
            .iter()
            .filter(|a| **a != target)
            .cloned()
            .collect();
        let sources: Vec<String> = candidates
            .choose_multiple(&mut self.rng, count)
            .cloned()
            .collect();

        let base = self.day_offset(31, 60);
        for (i, source) in sources.iter().enumerate() {
            let value = self.amount(8_000.0, 9_999.0);
            let offset = Duration::hours(i as i64 * 2) + Duration::seconds(self.rng.gen_range(0..3600));
            self.push(source, &target, value, base + offset, true);
        }
        AccountId::new(target)
    }

    fn layering(&mut self) -> Vec<AccountId> {
        let len = self.rng.gen_range(MIN_CYCLE_LEN..=MAX_CYCLE_LEN);
        let nodes = self.pick(len);
        let base = self.day_offset(61, 90);
        for i in 0..len {
            let value = self.amount(20_000.0, 100_000.0);
            let at = base + Duration::minutes(i as i64 * 15 + self.rng.gen_range(0..=5));
            self.push(&nodes[i], &nodes[(i + 1) % len], value, at, true);
        }
        nodes.into_iter().map(AccountId::new).collect()
    }

    fn rapid_movement(&mut self) -> AccountId {
        let trio = self.pick(3);
        let base = self.day_offset(91, 120);
        let inbound = self.amount(50_000.0, 150_000.0);
        let outbound = round_cents(inbound * self.rng.gen_range(0.96..0.99));
        let delay = Duration::minutes(self.rng.gen_range(5..=25));
        self.push(&trio[0], &trio[1], inbound, base, true);
        self.push(&trio[1], &trio[2], outbound, base + delay, true);
        AccountId::new(trio[1].clone())
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generate a dataset with injected patterns
pub fn generate(config: &SynthConfig) -> Result<SyntheticDataset, SynthError> {
    config.validate()?;
    let mut generator = Generator::new(config);

    for _ in 0..config.num_transactions {
        generator.background();
    }

    let mut injected = InjectedPatterns::default();
    for _ in 0..config.smurfing_patterns {
        let target = generator.smurfing();
        injected.smurfing_targets.push(target);
    }
    for _ in 0..config.layering_cycles {
        let cycle = generator.layering();
        injected.cycles.push(cycle);
    }
    for _ in 0..config.rapid_movements {
        let account = generator.rapid_movement();
        injected.pass_through.push(account);
    }

    let transactions = generator.transactions;
    let snapshot: Vec<_> = transactions
        .iter()
        .cloned()
        .filter_map(TransactionRecord::into_transaction)
        .collect();
    let accounts = derive_accounts(&snapshot);

    let dataset = SyntheticDataset {
        accounts,
        transactions,
        injected,
    };
    info!(
        "Generated {} transactions ({} fraudulent) over {} accounts",
        dataset.transactions.len(),
        dataset.fraud_count(),
        dataset.accounts.len()
    );
    Ok(dataset)
}

/// Write `accounts.<ext>` and `transactions.<ext>` into `dir`
pub fn write_dataset(
    dataset: &SyntheticDataset,
    dir: &Path,
    format: TableFormat,
) -> Result<(PathBuf, PathBuf), SynthError> {
    std::fs::create_dir_all(dir).map_err(IngestError::from)?;
    let accounts_path = dir.join(format!("accounts.{}", format.extension()));
    let transactions_path = dir.join(format!("transactions.{}", format.extension()));

    write_account_records(&dataset.accounts, &accounts_path)?;
    write_transaction_records(&dataset.transactions, &transactions_path)?;
    Ok((accounts_path, transactions_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use crate::graph_store::GraphStore;
    use crate::ingest::{to_accounts, to_transactions};
    use crate::rapid_movement::RapidMovementDetector;
    use crate::smurfing::SmurfingDetector;

    fn seeded(seed: u64) -> SynthConfig {
        SynthConfig {
            seed: Some(seed),
            ..Default::default()
        }
    }

    fn load(dataset: &SyntheticDataset) -> GraphStore {
        GraphStore::from_snapshot(
            to_accounts(dataset.accounts.clone()),
            to_transactions(dataset.transactions.clone()),
        )
        .0
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = generate(&seeded(7)).unwrap();
        let b = generate(&seeded(7)).unwrap();
        assert_eq!(a.transactions, b.transactions);
        assert_eq!(a.accounts, b.accounts);
    }

    #[test]
    fn test_default_counts() {
        let dataset = generate(&seeded(1)).unwrap();
        let fraud = dataset.fraud_count();
        assert_eq!(dataset.transactions.len(), 1000 + fraud);
        assert_eq!(dataset.injected.smurfing_targets.len(), 8);
        assert_eq!(dataset.injected.cycles.len(), 5);
        assert_eq!(dataset.injected.pass_through.len(), 6);
        // 6 pass-throughs contribute exactly 12 transfers
        assert!(fraud >= 8 * MIN_SMURFS + 5 * MIN_CYCLE_LEN + 12);
    }

    #[test]
    fn test_injected_patterns_are_detected() {
        let dataset = generate(&seeded(42)).unwrap();
        let store = load(&dataset);

        let smurfing = SmurfingDetector::default().detect(&store);
        for target in &dataset.injected.smurfing_targets {
            assert!(smurfing.contains_node(target), "missed target {}", target);
        }

        let rapid = RapidMovementDetector::default().detect(&store);
        for account in &dataset.injected.pass_through {
            assert!(rapid.contains_node(account), "missed pass-through {}", account);
        }
    }

    #[test]
    fn test_too_few_accounts_rejected() {
        let config = SynthConfig {
            num_accounts: 4,
            ..seeded(1)
        };
        assert!(matches!(
            generate(&config),
            Err(SynthError::InvalidParameters(_))
        ));

        let background_only = SynthConfig {
            num_accounts: 2,
            num_transactions: 10,
            smurfing_patterns: 0,
            layering_cycles: 0,
            rapid_movements: 0,
            seed: Some(3),
        };
        let dataset = generate(&background_only).unwrap();
        assert_eq!(dataset.transactions.len(), 10);
        assert_eq!(dataset.fraud_count(), 0);
    }
}
