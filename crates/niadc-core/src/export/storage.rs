//! Append-only CSV storage
//!
//! The file is created exclusively (an existing file is never overwritten),
//! the header is written once, and every append is flushed so a crash loses
//! at most the append in progress.

use crate::acquisition::ring::Row;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the storage sink
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("output file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write rows: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush rows: {0}")]
    Flush(#[source] io::Error),

    #[error("row has {actual} values, expected {expected}")]
    RowWidth { expected: usize, actual: usize },
}

/// Row-oriented CSV sink for one session
pub struct Storage {
    path: Option<PathBuf>,
    writer: csv::Writer<Box<dyn Write + Send>>,
    channel_count: usize,
    rows_written: u64,
}

impl Storage {
    /// Create the output file and write the header row
    ///
    /// `columns` is the full header, timestamp column first.
    pub fn create(path: &Path, columns: &[String]) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_path_buf()),
                _ => StorageError::Create {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?;

        let mut storage = Self::from_writer(file, columns)?;
        storage.path = Some(path.to_path_buf());
        tracing::info!(path = %path.display(), columns = columns.len(), "Created data file");
        Ok(storage)
    }

    /// Write the header to an arbitrary sink
    pub fn from_writer(
        sink: impl Write + Send + 'static,
        columns: &[String],
    ) -> Result<Self, StorageError> {
        let sink: Box<dyn Write + Send> = Box::new(sink);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        writer.write_record(columns)?;
        writer.flush().map_err(StorageError::Flush)?;

        Ok(Self {
            path: None,
            writer,
            channel_count: columns.len().saturating_sub(1),
            rows_written: 0,
        })
    }

    /// Append rows after the existing content and flush
    ///
    /// Rows are validated before anything is written.
    pub fn append_rows(&mut self, rows: &[Row]) -> Result<usize, StorageError> {
        if let Some(bad) = rows.iter().find(|r| r.values.len() != self.channel_count) {
            return Err(StorageError::RowWidth {
                expected: self.channel_count,
                actual: bad.values.len(),
            });
        }

        let mut record: Vec<String> = Vec::with_capacity(self.channel_count + 1);
        for row in rows {
            record.clear();
            record.push(row.timestamp.to_string());
            record.extend(row.values.iter().map(f64::to_string));
            self.writer.write_record(&record)?;
        }
        self.writer.flush().map_err(StorageError::Flush)?;

        self.rows_written += rows.len() as u64;
        Ok(rows.len())
    }

    /// Path of the data file, if backed by one
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rows appended since creation (header excluded)
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}
