//! AML Pattern Detection Engine
//!
//! Flags three money-laundering patterns in a transaction graph where
//! accounts are nodes and transactions are directed, timestamped, valued
//! edges.
//!
//! # Detectors
//!
//! 1. **Smurfing** ([`smurfing`]): many small inbound payments aggregating at one account
//! 2. **Layering** ([`layering`]): circular payment chains found by depth-first search
//! 3. **Rapid movement** ([`rapid_movement`]): funds received and forwarded within a short window
//!
//! Each detector reads an immutable [`GraphStore`] snapshot and returns a
//! [`Finding`]: the flagged accounts and transactions plus one evidence entry
//! per reported item. [`Engine`] owns the current snapshot and runs detectors
//! against it, concurrently when asked for all three.
//!
//! # Input Files
//!
//! - `accounts.csv` / `accounts.parquet`: `account_id`, `total_incoming_value`,
//!   `total_outgoing_value`, `ml_risk_score`
//! - `transactions.csv` / `transactions.parquet`: `id`, `from`, `to`, `value`,
//!   `timestamp`
//!
//! # Example
//!
//! ```no_run
//! use aml_pattern_engine::config::DetectionConfig;
//! use aml_pattern_engine::ingest::{read_accounts, read_transactions};
//! use aml_pattern_engine::report::Report;
//! use aml_pattern_engine::Engine;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(DetectionConfig::default());
//!     engine.load(
//!         read_accounts(Path::new("data/accounts.csv"))?,
//!         read_transactions(Path::new("data/transactions.csv"))?,
//!     );
//!     for finding in engine.detect_all()? {
//!         println!("{}", Report::from_finding(&finding));
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detector;
pub mod engine;
pub mod finding;
pub mod flows;
pub mod graph_store;
pub mod highlight;
pub mod ingest;
pub mod layering;
pub mod rapid_movement;
pub mod report;
pub mod schemas;
pub mod smurfing;
pub mod synth;

// Re-export commonly used types
pub use config::{DetectionConfig, EngineConfig};
pub use engine::{Engine, EngineError};
pub use finding::{Evidence, Finding, Highlight, PatternKind};
pub use graph_store::{GraphStore, LoadReport};
pub use schemas::{Account, AccountId, RunMetadata, Transaction, TransactionId};
