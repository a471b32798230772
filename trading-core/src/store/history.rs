//! Append-only price history.

use super::poisoned;
use async_trait::async_trait;
use chrono::DateTime;
use log::warn;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use trading::{HistoryLog, Quote, QuoteRecord, StoreError};

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// History kept in memory, in append order.
#[derive(Default)]
pub struct MemoryHistoryLog {
    records: Mutex<Vec<QuoteRecord>>,
}

impl MemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryLog for MemoryHistoryLog {
    async fn append(&self, record: &QuoteRecord) -> Result<(), StoreError> {
        self.records.lock().map_err(poisoned)?.push(record.clone());
        Ok(())
    }

    async fn range(&self, symbol: &str, since: i64) -> Result<Vec<QuoteRecord>, StoreError> {
        let records = self.records.lock().map_err(poisoned)?;
        let mut matching: Vec<QuoteRecord> = records
            .iter()
            .filter(|r| r.quote.symbol() == symbol && r.quote.timestamp() >= since)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.quote.timestamp());
        Ok(matching)
    }
}

/// History appended to a CSV file, one row per record.
///
/// Format: `date,symbol,price,source,timestamp` where `date` is the RFC 3339
/// form of the time the record was written.
pub struct CsvHistoryLog {
    file_path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl CsvHistoryLog {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.file_path
    }

    fn format_row(record: &QuoteRecord) -> String {
        let date = DateTime::from_timestamp(record.recorded_at, 0)
            .unwrap_or_default()
            .to_rfc3339();
        format!(
            "{},{},{},{},{}\n",
            date,
            record.quote.symbol(),
            record.quote.price(),
            record.quote.source(),
            record.quote.timestamp()
        )
    }

    fn parse_row(line: &str) -> Option<QuoteRecord> {
        let mut fields = line.split(',');
        let date = fields.next()?;
        let symbol = fields.next()?;
        let price = Decimal::from_str(fields.next()?).ok()?;
        let source = fields.next()?;
        let timestamp = fields.next()?.trim().parse::<i64>().ok()?;
        if fields.next().is_some() {
            return None;
        }
        let recorded_at = DateTime::parse_from_rfc3339(date).ok()?.timestamp();
        Some(QuoteRecord::new(
            Quote::new(symbol, price, timestamp, source),
            recorded_at,
        ))
    }
}

#[async_trait]
impl HistoryLog for CsvHistoryLog {
    async fn append(&self, record: &QuoteRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
            }
        }

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await
            .map_err(io_error)?;
        file.write_all(Self::format_row(record).as_bytes())
            .await
            .map_err(io_error)?;
        file.flush().await.map_err(io_error)?;
        Ok(())
    }

    async fn range(&self, symbol: &str, since: i64) -> Result<Vec<QuoteRecord>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(err)),
        };

        let mut matching = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match Self::parse_row(line) {
                Some(record) if record.quote.symbol() == symbol && record.quote.timestamp() >= since => {
                    matching.push(record)
                }
                Some(_) => {}
                None => warn!("Skipping malformed history row: {}", line),
            }
        }
        matching.sort_by_key(|r| r.quote.timestamp());
        Ok(matching)
    }
}
