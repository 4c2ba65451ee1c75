//! Directory-backed result sink
//!
//! Layout of the output directory:
//!
//! - `summary.csv`: one row per job, in index order
//! - `response_NNNN_<params>.txt`: decoded body of every job that got a response
//! - `sent_raw_NNNN.bin`: wire bytes of each request, when raw capture is on

use crate::error::AttackResult;
use crate::traits::ResultSink;
use crate::types::ResultRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub const SUMMARY_FILENAME: &str = "summary.csv";

const SUMMARY_HEADER: &str =
    "index,params,status,length,filename,error,req_time_s,request,full_response,sent_raw_file\n";

const MAX_FRAGMENT_CHARS: usize = 150;

/// Writes responses, raw captures and the CSV summary into one directory
pub struct DirectorySink {
    dir: PathBuf,
    summary: Mutex<File>,
}

impl DirectorySink {
    /// Create the directory and start a fresh `summary.csv`
    pub async fn create(dir: impl Into<PathBuf>) -> AttackResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let summary_path = dir.join(SUMMARY_FILENAME);
        fs::write(&summary_path, SUMMARY_HEADER).await?;
        let summary = OpenOptions::new().append(true).open(&summary_path).await?;

        debug!("Writing results to {}", dir.display());
        Ok(Self {
            dir,
            summary: Mutex::new(summary),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILENAME)
    }

    /// File name used for the response body of a record
    pub fn response_filename(record: &ResultRecord) -> String {
        let fragment: String = sanitize_filename(&record.params)
            .chars()
            .take(MAX_FRAGMENT_CHARS)
            .collect();
        format!("response_{:04}_{}.txt", record.index, fragment)
    }

    pub fn raw_filename(index: usize) -> String {
        format!("sent_raw_{:04}.bin", index)
    }

    fn summary_row(record: &ResultRecord, filename: &str) -> String {
        let status = record
            .status
            .map_or_else(|| "ERROR".to_string(), |s| s.to_string());
        let raw_path = record
            .raw_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let fields = [
            record.index.to_string(),
            csv_escape(&record.params),
            status,
            record.length.to_string(),
            csv_escape(filename),
            csv_escape(record.error.as_deref().unwrap_or_default()),
            format!("{:.3}", record.elapsed.as_secs_f64()),
            csv_escape(&record.request_text),
            csv_escape(&record.response_body),
            csv_escape(&raw_path),
        ];

        let mut row = fields.join(",");
        row.push('\n');
        row
    }
}

#[async_trait]
impl ResultSink for DirectorySink {
    async fn accept(&self, record: &ResultRecord) -> AttackResult<()> {
        let filename = if record.status.is_some() {
            let filename = Self::response_filename(record);
            fs::write(self.dir.join(&filename), record.response_body.as_bytes()).await?;
            filename
        } else {
            String::new()
        };

        let row = Self::summary_row(record, &filename);
        let mut summary = self.summary.lock().await;
        summary.write_all(row.as_bytes()).await?;
        summary.flush().await?;
        Ok(())
    }

    async fn store_raw(&self, index: usize, raw: &[u8]) -> AttackResult<Option<PathBuf>> {
        let path = self.dir.join(Self::raw_filename(index));
        fs::write(&path, raw).await?;
        Ok(Some(path))
    }
}

/// Keep `[A-Za-z0-9_.-]`, replace everything else with `_`
pub fn sanitize_filename(input: &str) -> String {
    let sanitized: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "resp".to_string()
    } else {
        sanitized
    }
}

/// Escape a value for CSV (handle commas, quotes, newlines)
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
