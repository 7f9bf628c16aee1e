//! Persistent quote history: a CSV table that only grows, plus a JSON snapshot
//! re-exported from it after every merge.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{QuoteRecord, RecordKey};

/// Where the history lives on disk
#[derive(Debug, Clone)]
pub struct HistoryStore {
    csv_path: PathBuf,
    json_path: PathBuf,
}

impl HistoryStore {
    pub fn new(csv_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            json_path: json_path.into(),
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Read the persisted table; `None` when no history file exists yet.
    pub fn load(&self) -> Result<Option<Vec<QuoteRecord>>> {
        if !self.csv_path.exists() {
            debug!("No history at {}, starting fresh", self.csv_path.display());
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&self.csv_path)
            .with_context(|| format!("Failed to open history {}", self.csv_path.display()))?;

        let mut records = Vec::new();
        for (i, row) in reader.deserialize::<QuoteRecord>().enumerate() {
            // +2: header line plus 1-based numbering
            let record = row.with_context(|| {
                format!("Bad history row at line {} of {}", i + 2, self.csv_path.display())
            })?;
            records.push(record);
        }

        debug!("Loaded {} history rows from {}", records.len(), self.csv_path.display());
        Ok(Some(records))
    }

    /// Append `today` after the stored rows, collapse duplicate keys and
    /// rewrite both outputs. Returns the table that was written.
    pub fn merge_and_save(&self, today: Vec<QuoteRecord>) -> Result<Vec<QuoteRecord>> {
        let combined = match self.load()? {
            Some(mut existing) => {
                existing.extend(today);
                existing
            }
            None => today,
        };

        let history = dedup_keep_last(combined);
        self.save(&history)?;

        info!("History now holds {} rows", history.len());
        Ok(history)
    }

    /// Write the CSV table and the JSON snapshot from the same rows.
    pub fn save(&self, history: &[QuoteRecord]) -> Result<()> {
        write_replacing(&self.csv_path, |w| {
            let mut writer = csv::Writer::from_writer(w);
            for record in history {
                writer.serialize(record)?;
            }
            writer.flush()?;
            Ok(())
        })
        .with_context(|| format!("Failed to write history {}", self.csv_path.display()))?;

        write_replacing(&self.json_path, |w| {
            serde_json::to_writer(&mut *w, history)?;
            Ok(())
        })
        .with_context(|| format!("Failed to write snapshot {}", self.json_path.display()))?;

        Ok(())
    }
}

/// Keep the last occurrence of each (date, symbol), leaving survivors in
/// their original relative order.
pub fn dedup_keep_last(records: Vec<QuoteRecord>) -> Vec<QuoteRecord> {
    let last_index: HashMap<RecordKey<'_>, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.key(), i))
        .collect();

    let keep: Vec<bool> = records
        .iter()
        .enumerate()
        .map(|(i, r)| last_index.get(&r.key()) == Some(&i))
        .collect();

    records
        .into_iter()
        .zip(keep)
        .filter_map(|(r, keep)| keep.then_some(r))
        .collect()
}

/// Write to `<path>.tmp` then rename over `path`, so a failed write leaves
/// the previous file untouched.
fn write_replacing<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = fs::File::create(&tmp_path)
        .map_err(anyhow::Error::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            Ok(())
        })
        .and_then(|_| fs::rename(&tmp_path, path).map_err(anyhow::Error::from));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
