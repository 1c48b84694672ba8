//! Append-only feedback log

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Feedback, FeedbackRecord};

/// Header row written once, before the first record
pub const FEEDBACK_HEADER: [&str; 3] = ["User Question", "Assistant Response", "Feedback"];

/// Destination for submitted feedback
pub trait FeedbackStore: Send + Sync {
    /// Durably append one record
    fn append(&self, record: &FeedbackRecord) -> crate::Result<()>;
}

/// Feedback log stored as a fully quoted UTF-8 CSV file
#[derive(Debug)]
pub struct CsvFeedbackLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvFeedbackLog {
    /// Create a log writing to `path`; nothing is touched until the first append
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, in append order
    ///
    /// A missing log reads as empty.
    pub fn read_all(&self) -> crate::Result<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            if row.len() != FEEDBACK_HEADER.len() {
                return Err(crate::Error::Feedback(format!(
                    "malformed feedback row with {} fields",
                    row.len()
                )));
            }
            records.push(FeedbackRecord {
                question: row[0].to_string(),
                response: row[1].to_string(),
                feedback: row[2].parse::<Feedback>()?,
            });
        }
        Ok(records)
    }
}

impl FeedbackStore for CsvFeedbackLog {
    fn append(&self, record: &FeedbackRecord) -> crate::Result<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(file);

        if needs_header {
            writer.write_record(FEEDBACK_HEADER)?;
        }
        writer.write_record([
            record.question.as_str(),
            record.response.as_str(),
            record.feedback.label(),
        ])?;
        writer.flush()?;

        debug!(path = %self.path.display(), feedback = %record.feedback, "Appended feedback record");
        Ok(())
    }
}
