//! AML Pattern Detection CLI
//!
//! Loads an account/transaction snapshot and reports smurfing, layering and
//! rapid pass-through patterns.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use aml_pattern_engine::config::EngineConfig;
use aml_pattern_engine::flows::{account_flows, derive_accounts};
use aml_pattern_engine::graph_store::LoadReport;
use aml_pattern_engine::ingest::{
    read_account_records, read_accounts, read_transaction_records, read_transactions,
    write_account_records, TableFormat,
};
use aml_pattern_engine::report::{format_amount, AccountDetails, Report};
use aml_pattern_engine::schemas::{AccountId, RunMetadata};
use aml_pattern_engine::synth::{generate, write_dataset, SynthConfig};
use aml_pattern_engine::{Engine, Finding, PatternKind};

#[derive(Parser)]
#[command(name = "aml-pattern-engine")]
#[command(version)]
#[command(about = "Smurfing, layering and rapid-movement detection over transaction graphs", long_about = None)]
struct Cli {
    /// Path to configuration file (optional, uses env vars if not provided)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pattern detection over an account/transaction snapshot
    Detect {
        /// Accounts file (.csv or .parquet)
        #[arg(short, long)]
        accounts: Option<PathBuf>,

        /// Transactions file (.csv or .parquet)
        #[arg(short, long)]
        transactions: Option<PathBuf>,

        /// Pattern to look for
        #[arg(short, long, value_enum, default_value = "all")]
        pattern: PatternArg,

        /// Write findings and run metadata as JSON
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// Print only flagged node and edge ids
        #[arg(long)]
        silent: bool,
    },

    /// Show details for one account
    Inspect {
        #[arg(short, long)]
        accounts: Option<PathBuf>,

        #[arg(short, long)]
        transactions: Option<PathBuf>,

        /// Account id
        #[arg(long)]
        account: String,
    },

    /// Build an accounts table from a transactions table
    DeriveAccounts {
        #[arg(short, long)]
        transactions: PathBuf,

        /// Output file (.csv or .parquet)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate a synthetic dataset with injected patterns
    Generate {
        #[arg(short, long, default_value = "data")]
        output_dir: PathBuf,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, value_enum, default_value = "csv")]
        format: FormatArg,

        #[arg(long, default_value = "200")]
        num_accounts: usize,

        #[arg(long, default_value = "1000")]
        num_transactions: usize,
    },

    /// Show configured paths and record counts
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PatternArg {
    Smurfing,
    Layering,
    RapidMovement,
    All,
}

impl PatternArg {
    fn kinds(self) -> Vec<PatternKind> {
        match self {
            PatternArg::Smurfing => vec![PatternKind::Smurfing],
            PatternArg::Layering => vec![PatternKind::Layering],
            PatternArg::RapidMovement => vec![PatternKind::RapidMovement],
            PatternArg::All => PatternKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Parquet,
}

impl From<FormatArg> for TableFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => TableFormat::Csv,
            FormatArg::Parquet => TableFormat::Parquet,
        }
    }
}

/// JSON document written by `detect --json-out`
#[derive(Serialize)]
struct DetectionOutput<'a> {
    metadata: &'a RunMetadata,
    findings: &'a [Finding],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Load configuration
    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => EngineConfig::load().context("Failed to load config from environment")?,
    };
    config
        .detection
        .validate()
        .context("Invalid detection parameters")?;

    match cli.command {
        Commands::Detect {
            accounts,
            transactions,
            pattern,
            json_out,
            silent,
        } => {
            let accounts = accounts.unwrap_or_else(|| config.paths.accounts.clone());
            let transactions = transactions.unwrap_or_else(|| config.paths.transactions.clone());
            cmd_detect(&config, &accounts, &transactions, pattern, json_out.as_deref(), silent)?;
        }
        Commands::Inspect {
            accounts,
            transactions,
            account,
        } => {
            let accounts = accounts.unwrap_or_else(|| config.paths.accounts.clone());
            let transactions = transactions.unwrap_or_else(|| config.paths.transactions.clone());
            cmd_inspect(&config, &accounts, &transactions, &account)?;
        }
        Commands::DeriveAccounts {
            transactions,
            output,
        } => {
            cmd_derive_accounts(&transactions, &output)?;
        }
        Commands::Generate {
            output_dir,
            seed,
            format,
            num_accounts,
            num_transactions,
        } => {
            let synth = SynthConfig {
                num_accounts,
                num_transactions,
                seed,
                ..Default::default()
            };
            cmd_generate(&synth, &output_dir, format.into())?;
        }
        Commands::Status => {
            cmd_status(&config)?;
        }
    }

    Ok(())
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        anyhow::bail!(
            "{} file not found: {:?}. Pass it explicitly or run generate first.",
            what,
            path
        );
    }
    Ok(())
}

fn load_engine(
    config: &EngineConfig,
    accounts_path: &Path,
    transactions_path: &Path,
) -> Result<(Engine, LoadReport)> {
    require_file(accounts_path, "Accounts")?;
    require_file(transactions_path, "Transactions")?;

    let accounts = read_accounts(accounts_path).context("Failed to read accounts")?;
    let transactions =
        read_transactions(transactions_path).context("Failed to read transactions")?;

    let engine = Engine::new(config.detection.clone());
    let report = engine.load(accounts, transactions);
    Ok((engine, report))
}

fn cmd_detect(
    config: &EngineConfig,
    accounts_path: &Path,
    transactions_path: &Path,
    pattern: PatternArg,
    json_out: Option<&Path>,
    silent: bool,
) -> Result<()> {
    info!("=== Running Pattern Detection ===");

    let (engine, load_report) = load_engine(config, accounts_path, transactions_path)?;

    let findings: Vec<Finding> = match pattern {
        PatternArg::All => engine.detect_all().context("Detection run failed")?,
        single => single.kinds().into_iter().map(|k| engine.detect(k)).collect(),
    };

    for finding in &findings {
        if silent {
            println!(
                "{}: {}",
                finding.kind,
                serde_json::to_string(&finding.highlight())?
            );
        } else {
            println!("{}", Report::from_finding(finding));
        }
    }

    // Write metadata
    let flagged_accounts: HashSet<&AccountId> =
        findings.iter().flat_map(|f| f.nodes.iter()).collect();
    let flagged_transactions: HashSet<_> = findings.iter().flat_map(|f| f.edges.iter()).collect();

    let mut metadata = RunMetadata::new(
        accounts_path.display().to_string(),
        transactions_path.display().to_string(),
    );
    metadata.record_counts.accounts = load_report.accounts;
    metadata.record_counts.transactions = load_report.transactions;
    metadata.record_counts.excluded_transactions = load_report.excluded_transactions;
    metadata.record_counts.flagged_accounts = flagged_accounts.len();
    metadata.record_counts.flagged_transactions = flagged_transactions.len();

    config.ensure_directories()?;
    let metadata_path = config.paths.findings_dir.join("detection_metadata.json");
    metadata.save(&metadata_path)?;
    info!("Metadata saved to {:?}", metadata_path);

    if let Some(path) = json_out {
        let output = DetectionOutput {
            metadata: &metadata,
            findings: &findings,
        };
        let json = serde_json::to_string_pretty(&output)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write findings to {:?}", path))?;
        info!("Findings saved to {:?}", path);
    }

    info!(
        "Flagged {} accounts and {} transactions",
        metadata.record_counts.flagged_accounts, metadata.record_counts.flagged_transactions
    );
    Ok(())
}

fn cmd_inspect(
    config: &EngineConfig,
    accounts_path: &Path,
    transactions_path: &Path,
    account: &str,
) -> Result<()> {
    info!("=== Account Details ===");

    let (engine, _) = load_engine(config, accounts_path, transactions_path)?;
    let store = engine.snapshot();

    let id = AccountId::new(account);
    let Some(details) = AccountDetails::from_store(&store, &id) else {
        anyhow::bail!("Account {} not found in {:?}", account, accounts_path);
    };
    println!("{}", details);

    if let Some(flow) = account_flows(&store).get(&id) {
        println!(
            "Incoming: {} transfers, ${} total, ${} average",
            flow.incoming_count,
            format_amount(flow.incoming_total),
            format_amount(flow.avg_incoming())
        );
        println!(
            "Outgoing: {} transfers, ${} total, ${} average",
            flow.outgoing_count,
            format_amount(flow.outgoing_total),
            format_amount(flow.avg_outgoing())
        );
    }
    Ok(())
}

fn cmd_derive_accounts(transactions_path: &Path, output: &Path) -> Result<()> {
    info!("=== Deriving Accounts ===");
    require_file(transactions_path, "Transactions")?;

    let transactions =
        read_transactions(transactions_path).context("Failed to read transactions")?;
    let accounts = derive_accounts(&transactions);
    write_account_records(&accounts, output).context("Failed to write accounts")?;

    info!("Accounts saved to {:?}", output);
    Ok(())
}

fn cmd_generate(synth: &SynthConfig, output_dir: &Path, format: TableFormat) -> Result<()> {
    info!("=== Generating Synthetic Data ===");

    let dataset = generate(synth).context("Failed to generate dataset")?;
    let (accounts_path, transactions_path) =
        write_dataset(&dataset, output_dir, format).context("Failed to write dataset")?;

    let total = dataset.transactions.len();
    let fraud = dataset.fraud_count();
    info!(
        "Fraudulent transactions: {} ({:.2}%)",
        fraud,
        if total == 0 { 0.0 } else { fraud as f64 / total as f64 * 100.0 }
    );
    info!("Accounts saved to {:?}", accounts_path);
    info!("Transactions saved to {:?}", transactions_path);
    Ok(())
}

fn cmd_status(config: &EngineConfig) -> Result<()> {
    info!("=== Engine Status ===");
    info!("Data directory: {:?}", config.paths.data_dir);
    info!(
        "Smurfing: threshold={}, min_transactions={}",
        config.detection.smurfing.threshold, config.detection.smurfing.min_transactions
    );
    info!(
        "Rapid movement: window={}m, similarity_ratio={}",
        config.detection.rapid_movement.window_minutes,
        config.detection.rapid_movement.similarity_ratio
    );

    let files = [
        ("Accounts", config.paths.accounts.clone()),
        ("Transactions", config.paths.transactions.clone()),
    ];

    for (name, path) in files {
        if path.exists() {
            let size_kb = std::fs::metadata(&path)?.len() / 1024;

            // Try to read record count
            let count = match name {
                "Accounts" => read_account_records(&path).map(|v| v.len()),
                _ => read_transaction_records(&path).map(|v| v.len()),
            };
            match count {
                Ok(count) => info!("  ✓ {}: {} records ({} KB)", name, count, size_kb),
                Err(e) => warn!("  ✗ {}: unreadable ({})", name, e),
            }
        } else {
            info!("  ✗ {}: not found ({:?})", name, path);
        }
    }

    let metadata_path = config.paths.findings_dir.join("detection_metadata.json");
    if metadata_path.exists() {
        info!("  ✓ Last run metadata: {:?}", metadata_path);
    } else {
        info!("  ✗ No detection run recorded");
    }

    Ok(())
}
