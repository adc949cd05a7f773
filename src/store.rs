use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use log::info;

use crate::error::PipelineError;
use crate::record::Record;

pub const CSV_HEADER: &str = "timestamp,date,rate,raw_date,scrape_time";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Append-only, day-partitioned CSV dataset. One file per capture day; the
/// header exists exactly once per partition; rows are never rewritten.
///
/// Cross-process discipline: a new partition is published via hard-link of a
/// fully written header file, so no reader or concurrent appender can ever
/// observe a headerless partition; rows go out as a single `O_APPEND` write.
pub struct PersistenceStore {
    dir: PathBuf,
}

impl PersistenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn partition_path(&self, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("silver_prices_{}.csv", day.format("%Y%m%d")))
    }

    /// Appends exactly one row for the record to its day partition, creating
    /// the partition (header included) on first use.
    pub fn append(&self, record: &Record) -> Result<PathBuf, PipelineError> {
        let path = self.partition_path(record.capture_timestamp.date_naive());
        self.ensure_partition(&path)?;

        let row = render_row(record);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| persistence_error(&path, "opening partition", e))?;
        file.write_all(row.as_bytes())
            .map_err(|e| persistence_error(&path, "appending row", e))?;

        info!("row appended to {}", path.display());
        Ok(path)
    }

    /// Creates the partition with its header as one atomic step: the header
    /// is fully written to a scratch file which is then hard-linked into
    /// place. Losing the link race means another writer already published the
    /// partition, header included.
    fn ensure_partition(&self, path: &Path) -> Result<(), PipelineError> {
        if path.exists() {
            return Ok(());
        }
        let scratch = self.dir.join(format!(
            ".partition.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&scratch, format!("{CSV_HEADER}\n"))
            .map_err(|e| persistence_error(&scratch, "writing partition header", e))?;
        let linked = fs::hard_link(&scratch, path);
        let _ = fs::remove_file(&scratch);
        match linked {
            Ok(()) => {
                info!("new day partition created: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(persistence_error(path, "publishing partition", e)),
        }
    }
}

fn persistence_error(path: &Path, action: &str, e: std::io::Error) -> PipelineError {
    PipelineError::Persistence(format!("{action} {}: {e}", path.display()))
}

/// Fixed column order: timestamp, date, rate, raw_date, scrape_time.
fn render_row(record: &Record) -> String {
    format!(
        "{},{},{},{},{}\n",
        record.capture_timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.trade_date,
        record.price,
        csv_escape(&record.raw_date_text),
        record.capture_timestamp.format("%H:%M:%S"),
    )
}

/// Raw date text regularly contains commas ("Jul 24, 2025"), so quote when
/// needed, doubling embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extracted, Strategy};
    use crate::record::RecordBuilder;
    use chrono::{DateTime, Local, TimeZone};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn record_at(capture: DateTime<Local>) -> Record {
        RecordBuilder::new().build(
            capture,
            &Extracted::Matched {
                raw: "Jul 24, 2025".to_string(),
                strategy: Strategy::Signature,
            },
            &Extracted::Matched {
                raw: "9,351".to_string(),
                strategy: Strategy::Signature,
            },
        )
    }

    #[test]
    fn header_written_exactly_once_across_repeated_appends() {
        let dir = tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        let record = record_at(local(2025, 7, 24, 10, 30, 0));

        let path = store.append(&record).unwrap();
        store.append(&record).unwrap();
        store.append(&record).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            contents.matches(CSV_HEADER).count(),
            1,
            "header must appear exactly once"
        );
    }

    #[test]
    fn row_has_fixed_column_order_with_escaped_raw_date() {
        let dir = tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        let record = record_at(local(2025, 7, 24, 10, 30, 0));

        let path = store.append(&record).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.ends_with(",2025-07-24,9351,\"Jul 24, 2025\",10:30:00"));
        assert!(row.starts_with("2025-07-24 10:30:00,"));
    }

    #[test]
    fn degraded_record_persists_explicit_invalid_price() {
        let dir = tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        let record = RecordBuilder::new().degraded(local(2025, 7, 24, 10, 30, 0));

        let path = store.append(&record).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        let rate = row.split(',').nth(2).unwrap();
        assert_eq!(rate, "invalid");
    }

    #[test]
    fn concurrent_appends_keep_single_header_and_all_rows() {
        let dir = tempdir().unwrap();
        let store = Arc::new(PersistenceStore::new(dir.path()));
        let record = record_at(local(2025, 7, 24, 10, 30, 0));
        let n = 16;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let store = Arc::clone(&store);
                let record = record.clone();
                std::thread::spawn(move || store.append(&record).unwrap())
            })
            .collect();
        let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let path = paths[0].clone();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1 + n);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1..].iter().all(|l| !l.contains("timestamp")));
    }

    #[test]
    fn partitions_split_by_capture_day() {
        let dir = tempdir().unwrap();
        let store = PersistenceStore::new(dir.path());
        let a = store.append(&record_at(local(2025, 7, 24, 23, 59, 0))).unwrap();
        let b = store.append(&record_at(local(2025, 7, 25, 0, 1, 0))).unwrap();
        assert_ne!(a, b);
    }
}
