//! Tabular ingestion for account and transaction snapshots.
//!
//! CSV and Parquet inputs are both supported; the format is picked from the
//! file extension. Rows that cannot be parsed, or that lack a required field,
//! are skipped with a warning instead of failing the whole load.

use crate::schemas::{
    accounts_schema, transactions_schema, Account, AccountRecord, Transaction, TransactionRecord,
};
use polars::prelude::*;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),
}

/// On-disk table format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("parquet") => Ok(Self::Parquet),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

// ============================================================================
// Readers
// ============================================================================

/// Read account rows from a CSV or Parquet file
pub fn read_account_records(path: &Path) -> Result<Vec<AccountRecord>, IngestError> {
    info!("Reading accounts from {:?}", path);
    match TableFormat::from_path(path)? {
        TableFormat::Csv => account_records_from_csv(std::fs::File::open(path)?),
        TableFormat::Parquet => account_records_from_parquet(path),
    }
}

/// Read transaction rows from a CSV or Parquet file
pub fn read_transaction_records(path: &Path) -> Result<Vec<TransactionRecord>, IngestError> {
    info!("Reading transactions from {:?}", path);
    match TableFormat::from_path(path)? {
        TableFormat::Csv => transaction_records_from_csv(std::fs::File::open(path)?),
        TableFormat::Parquet => transaction_records_from_parquet(path),
    }
}

/// Read and convert accounts, dropping rows without an id
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, IngestError> {
    Ok(to_accounts(read_account_records(path)?))
}

/// Read and convert transactions, dropping rows missing a required field
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>, IngestError> {
    Ok(to_transactions(read_transaction_records(path)?))
}

pub fn to_accounts(records: Vec<AccountRecord>) -> Vec<Account> {
    let total = records.len();
    let accounts: Vec<Account> = records
        .into_iter()
        .filter_map(AccountRecord::into_account)
        .collect();
    if accounts.len() < total {
        warn!("Dropped {} account rows without an id", total - accounts.len());
    }
    accounts
}

pub fn to_transactions(records: Vec<TransactionRecord>) -> Vec<Transaction> {
    let total = records.len();
    let transactions: Vec<Transaction> = records
        .into_iter()
        .filter_map(TransactionRecord::into_transaction)
        .collect();
    if transactions.len() < total {
        warn!(
            "Dropped {} transaction rows missing id, from, to or value",
            total - transactions.len()
        );
    }
    let untimed = transactions.iter().filter(|t| t.timestamp.is_none()).count();
    if untimed > 0 {
        warn!("{} transactions have no parseable timestamp", untimed);
    }
    transactions
}

pub fn account_records_from_csv<R: Read>(reader: R) -> Result<Vec<AccountRecord>, IngestError> {
    deserialize_csv(reader, "account")
}

pub fn transaction_records_from_csv<R: Read>(
    reader: R,
) -> Result<Vec<TransactionRecord>, IngestError> {
    deserialize_csv(reader, "transaction")
}

fn deserialize_csv<R, T>(reader: R, kind: &str) -> Result<Vec<T>, IngestError>
where
    R: Read,
    T: serde::de::DeserializeOwned,
{
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (row, result) in rdr.deserialize::<T>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!("Skipping malformed {} row {}: {}", kind, row + 1, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed {} rows", skipped, kind);
    }
    info!("Parsed {} {} rows", records.len(), kind);
    Ok(records)
}

fn read_parquet(path: &Path, schema: &Schema) -> Result<DataFrame, IngestError> {
    let file = std::fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    conform(df, schema)
}

/// Cast every known column that is present to its canonical type
fn conform(mut df: DataFrame, schema: &Schema) -> Result<DataFrame, IngestError> {
    for (name, dtype) in schema.iter() {
        let Ok(column) = df.column(name.as_str()) else {
            continue;
        };
        if column.dtype() != dtype {
            let cast = column.cast(dtype)?;
            df.with_column(cast)?;
        }
    }
    Ok(df)
}

fn require(df: &DataFrame, name: &str) -> Result<(), IngestError> {
    if df.column(name).is_err() {
        return Err(IngestError::MissingColumn(name.to_string()));
    }
    Ok(())
}

fn str_column(df: &DataFrame, name: &str) -> Result<Option<StringChunked>, IngestError> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.str()?.clone())),
        Err(_) => Ok(None),
    }
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Option<Float64Chunked>, IngestError> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.f64()?.clone())),
        Err(_) => Ok(None),
    }
}

fn u64_column(df: &DataFrame, name: &str) -> Result<Option<UInt64Chunked>, IngestError> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.u64()?.clone())),
        Err(_) => Ok(None),
    }
}

fn bool_column(df: &DataFrame, name: &str) -> Result<Option<BooleanChunked>, IngestError> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.bool()?.clone())),
        Err(_) => Ok(None),
    }
}

fn account_records_from_parquet(path: &Path) -> Result<Vec<AccountRecord>, IngestError> {
    let df = read_parquet(path, &accounts_schema())?;
    require(&df, "account_id")?;

    let ids = str_column(&df, "account_id")?;
    let incoming = f64_column(&df, "total_incoming_value")?;
    let outgoing = f64_column(&df, "total_outgoing_value")?;
    let risk = f64_column(&df, "ml_risk_score")?;
    let incoming_count = u64_column(&df, "incoming_tx_count")?;
    let avg_incoming = f64_column(&df, "avg_incoming_value")?;
    let outgoing_count = u64_column(&df, "outgoing_tx_count")?;
    let avg_outgoing = f64_column(&df, "avg_outgoing_value")?;

    let records = (0..df.height())
        .map(|i| AccountRecord {
            account_id: ids.as_ref().and_then(|c| c.get(i)).map(str::to_string),
            total_incoming_value: incoming.as_ref().and_then(|c| c.get(i)),
            total_outgoing_value: outgoing.as_ref().and_then(|c| c.get(i)),
            ml_risk_score: risk.as_ref().and_then(|c| c.get(i)),
            incoming_tx_count: incoming_count.as_ref().and_then(|c| c.get(i)),
            avg_incoming_value: avg_incoming.as_ref().and_then(|c| c.get(i)),
            outgoing_tx_count: outgoing_count.as_ref().and_then(|c| c.get(i)),
            avg_outgoing_value: avg_outgoing.as_ref().and_then(|c| c.get(i)),
        })
        .collect::<Vec<_>>();

    info!("Parsed {} account rows", records.len());
    Ok(records)
}

fn transaction_records_from_parquet(path: &Path) -> Result<Vec<TransactionRecord>, IngestError> {
    let df = read_parquet(path, &transactions_schema())?;
    for name in ["id", "from", "to", "value"] {
        require(&df, name)?;
    }

    let ids = str_column(&df, "id")?;
    let froms = str_column(&df, "from")?;
    let tos = str_column(&df, "to")?;
    let values = f64_column(&df, "value")?;
    let timestamps = str_column(&df, "timestamp")?;
    let fraud = bool_column(&df, "is_fraud")?;

    let text = |c: &Option<StringChunked>, i: usize| {
        c.as_ref().and_then(|c| c.get(i)).map(str::to_string)
    };

    let records = (0..df.height())
        .map(|i| TransactionRecord {
            id: text(&ids, i),
            from: text(&froms, i),
            to: text(&tos, i),
            value: values.as_ref().and_then(|c| c.get(i)),
            timestamp: text(&timestamps, i),
            is_fraud: fraud.as_ref().and_then(|c| c.get(i)),
        })
        .collect::<Vec<_>>();

    info!("Parsed {} transaction rows", records.len());
    Ok(records)
}

// ============================================================================
// Writers
// ============================================================================

/// Write account rows; the format follows the file extension
pub fn write_account_records(records: &[AccountRecord], path: &Path) -> Result<(), IngestError> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => write_csv(records, path)?,
        TableFormat::Parquet => {
            let ids: Vec<Option<&str>> = records.iter().map(|r| r.account_id.as_deref()).collect();
            let incoming: Vec<Option<f64>> =
                records.iter().map(|r| r.total_incoming_value).collect();
            let outgoing: Vec<Option<f64>> =
                records.iter().map(|r| r.total_outgoing_value).collect();
            let risk: Vec<Option<f64>> = records.iter().map(|r| r.ml_risk_score).collect();
            let incoming_count: Vec<Option<u64>> =
                records.iter().map(|r| r.incoming_tx_count).collect();
            let avg_incoming: Vec<Option<f64>> =
                records.iter().map(|r| r.avg_incoming_value).collect();
            let outgoing_count: Vec<Option<u64>> =
                records.iter().map(|r| r.outgoing_tx_count).collect();
            let avg_outgoing: Vec<Option<f64>> =
                records.iter().map(|r| r.avg_outgoing_value).collect();

            let mut df = DataFrame::new(vec![
                Column::new("account_id".into(), ids),
                Column::new("total_incoming_value".into(), incoming),
                Column::new("total_outgoing_value".into(), outgoing),
                Column::new("ml_risk_score".into(), risk),
                Column::new("incoming_tx_count".into(), incoming_count),
                Column::new("avg_incoming_value".into(), avg_incoming),
                Column::new("outgoing_tx_count".into(), outgoing_count),
                Column::new("avg_outgoing_value".into(), avg_outgoing),
            ])?;
            write_parquet(&mut df, path)?;
        }
    }
    info!("Wrote {} account rows to {:?}", records.len(), path);
    Ok(())
}

/// Write transaction rows; the format follows the file extension
pub fn write_transaction_records(
    records: &[TransactionRecord],
    path: &Path,
) -> Result<(), IngestError> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => write_csv(records, path)?,
        TableFormat::Parquet => {
            let ids: Vec<Option<&str>> = records.iter().map(|r| r.id.as_deref()).collect();
            let froms: Vec<Option<&str>> = records.iter().map(|r| r.from.as_deref()).collect();
            let tos: Vec<Option<&str>> = records.iter().map(|r| r.to.as_deref()).collect();
            let values: Vec<Option<f64>> = records.iter().map(|r| r.value).collect();
            let timestamps: Vec<Option<&str>> =
                records.iter().map(|r| r.timestamp.as_deref()).collect();
            let fraud: Vec<Option<bool>> = records.iter().map(|r| r.is_fraud).collect();

            let mut df = DataFrame::new(vec![
                Column::new("id".into(), ids),
                Column::new("from".into(), froms),
                Column::new("to".into(), tos),
                Column::new("value".into(), values),
                Column::new("timestamp".into(), timestamps),
                Column::new("is_fraud".into(), fraud),
            ])?;
            write_parquet(&mut df, path)?;
        }
    }
    info!("Wrote {} transaction rows to {:?}", records.len(), path);
    Ok(())
}

fn write_csv<T: serde::Serialize>(records: &[T], path: &Path) -> Result<(), IngestError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), IngestError> {
    let file = std::fs::File::create(path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            TableFormat::from_path(Path::new("a/b.CSV")).unwrap(),
            TableFormat::Csv
        );
        assert_eq!(
            TableFormat::from_path(Path::new("x.parquet")).unwrap(),
            TableFormat::Parquet
        );
        assert!(matches!(
            TableFormat::from_path(Path::new("x.json")),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_accounts_csv_with_missing_columns() {
        let data = "account_id,total_incoming_value\n 1 , 500\n2,\n,30\n";
        let records = account_records_from_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].account_id.as_deref(), Some("1"));
        assert_eq!(records[0].total_incoming_value, Some(500.0));
        assert_eq!(records[1].total_incoming_value, None);
        assert_eq!(records[0].ml_risk_score, None);

        let accounts = to_accounts(records);
        assert_eq!(accounts.len(), 2);
    }

    #[test]
    fn test_transactions_csv_bad_fields_become_none() {
        let data = "\
id,from,to,value,timestamp
t1,a,b,100.5,2025-01-01T10:00:00
t2,a,b,lots,2025-01-01T10:00:00
t3,a,c,20,garbage
";
        let records = transaction_records_from_csv(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].value, None);

        let transactions = to_transactions(records);
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0].value, 100.5);
        assert!(transactions[0].timestamp.is_some());
        assert!(transactions[1].timestamp.is_none());
    }

    #[test]
    fn test_csv_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("aml-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("transactions.csv");

        let records = vec![TransactionRecord {
            id: Some("t1".to_string()),
            from: Some("a".to_string()),
            to: Some("b".to_string()),
            value: Some(42.0),
            timestamp: Some("2025-01-01T00:00:00Z".to_string()),
            is_fraud: Some(true),
        }];
        write_transaction_records(&records, &path).unwrap();
        let back = read_transaction_records(&path).unwrap();
        assert_eq!(back, records);

        std::fs::remove_dir_all(&dir).ok();
    }
}
