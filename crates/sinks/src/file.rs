//! FileSink - appends records as JSON lines, one file per UTC day

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{ContractError, EventRecord, FileSinkConfig, RecordSink};
use tracing::{debug, error, instrument, warn};

/// Sink that appends batches to `<base_path>/events-YYYYMMDD.jsonl`
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
}

impl FileSink {
    /// Create a new FileSink, creating the base directory if needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
        })
    }

    /// Base output directory
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// File a batch saved at `now` is appended to
    pub fn file_for(&self, now: DateTime<Utc>) -> PathBuf {
        self.config
            .base_path
            .join(format!("events-{}.jsonl", now.format("%Y%m%d")))
    }

    /// Serialize the whole batch up front so a bad record never leaves a partial batch
    fn encode_batch(records: &[EventRecord]) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(records.len() * 256);
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }

    /// Append on a blocking thread; the write runs to completion or rolls back
    /// even when the calling future is dropped.
    async fn append_to_disk(&self, path: &Path, bytes: Vec<u8>) -> io::Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || append_whole(&path, &bytes))
            .await
            .map_err(io::Error::other)?
    }
}

/// Append `bytes` to `path`, truncating back to the previous length on failure
fn append_whole(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write_or_truncate(&mut file, |file| {
        file.write_all(bytes)?;
        file.sync_data()
    })
}

fn write_or_truncate<F>(file: &mut File, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let start = file.metadata()?.len();
    if let Err(e) = write(file) {
        if let Err(truncate) = file.set_len(start) {
            warn!(len = start, error = %truncate, "Failed to truncate partial batch");
        }
        return Err(e);
    }
    Ok(())
}

impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_save",
        skip(self, records),
        fields(sink = %self.name, batch_len = records.len())
    )]
    async fn save(&self, records: &[EventRecord]) -> Result<(), ContractError> {
        if records.is_empty() {
            return Ok(());
        }

        let bytes = Self::encode_batch(records)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        let path = self.file_for(Utc::now());

        let len = bytes.len();
        self.append_to_disk(&path, bytes).await.map_err(|e| {
            error!(sink = %self.name, path = %path.display(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })?;

        debug!(path = %path.display(), bytes = len, "Batch appended");
        Ok(())
    }
}
