//! On-disk metric log plus in-memory history.
//!
//! Layout of the output directory:
//!
//! ```text
//! <out_dir>/metrics.log    one line per message, append-only
//! <out_dir>/latest.json    most recent record, replaced atomically
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::CollectorResult;
use crate::record::{MetricRecord, raw_line};

pub const LOG_FILE: &str = "metrics.log";
pub const LATEST_FILE: &str = "latest.json";

#[derive(Debug, Default)]
struct Recent {
    history: VecDeque<MetricRecord>,
    by_device: BTreeMap<String, MetricRecord>,
}

#[derive(Debug)]
pub struct MetricStore {
    out_dir: PathBuf,
    capacity: usize,
    recent: Mutex<Recent>,
    messages: AtomicU64,
    rejected: AtomicU64,
}

impl MetricStore {
    /// Create the output directory if needed.
    pub fn open(out_dir: &Path, capacity: usize) -> CollectorResult<Self> {
        std::fs::create_dir_all(out_dir)?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            capacity: capacity.max(1),
            recent: Mutex::new(Recent::default()),
            messages: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.out_dir.join(LOG_FILE)
    }

    pub fn latest_path(&self) -> PathBuf {
        self.out_dir.join(LATEST_FILE)
    }

    /// Record one message received at `ts`.
    ///
    /// Returns the normalized record, or `None` if the body was not a JSON
    /// object (it is still logged raw).
    pub fn ingest(&self, topic: &str, payload: &[u8], ts: &str) -> CollectorResult<Option<MetricRecord>> {
        self.messages.fetch_add(1, Ordering::Relaxed);

        let Some(record) = MetricRecord::from_message(topic, payload, ts) else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(%topic, bytes = payload.len(), "non-JSON payload logged raw");
            self.append_line(&raw_line(ts, topic, payload))?;
            return Ok(None);
        };

        self.append_line(&record.log_line())?;
        self.write_latest(&record)?;
        self.remember(record.clone());
        Ok(Some(record))
    }

    /// Last `n` records, oldest first, optionally for one device.
    pub fn history(&self, n: usize, device: Option<&str>) -> Vec<MetricRecord> {
        let recent = self.lock();
        let mut out: Vec<MetricRecord> = recent
            .history
            .iter()
            .rev()
            .filter(|r| device.is_none_or(|d| r.device == d))
            .take(n)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    /// Latest record for every device seen since startup, by device id.
    pub fn latest_per_device(&self) -> Vec<MetricRecord> {
        self.lock().by_device.values().cloned().collect()
    }

    /// Total messages received and how many were not JSON objects.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.messages.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn remember(&self, record: MetricRecord) {
        let mut recent = self.lock();
        recent.by_device.insert(record.device.clone(), record.clone());
        recent.history.push_back(record);
        while recent.history.len() > self.capacity {
            recent.history.pop_front();
        }
    }

    fn append_line(&self, line: &str) -> CollectorResult<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(self.log_path())?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Write to a sibling temp file and rename over `latest.json`.
    fn write_latest(&self, record: &MetricRecord) -> CollectorResult<()> {
        let tmp = self.out_dir.join(format!("{LATEST_FILE}.tmp"));
        let mut body = serde_json::to_string(record)?;
        body.push('\n');
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, self.latest_path())?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recent> {
        // A panic while holding the lock leaves the deques consistent.
        self.recent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
