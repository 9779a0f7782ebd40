//! Append-only feedback log.
//!
//! One JSON record per line. Each record is written with a single
//! `write_all` on a file opened in append mode, so a record never
//! interleaves with another process's append. A crash mid-write can leave a
//! truncated line; the next append starts a fresh line after it and readers
//! skip it.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::types::FeedbackData;

/// Errors from the feedback log.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Feedback log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize feedback record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Refusing to store record {event_id} from {backend}: revision still pending")]
    Incomplete { event_id: String, backend: String },

    #[error("Corrupt feedback record at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// File name for a scenario's feedback log: `feedback_<name>.json`, with the
/// name lowercased and spaces replaced by underscores.
pub fn feedback_file_name(scenario_name: &str) -> String {
    format!("feedback_{}.json", scenario_name.to_lowercase().replace(' ', "_"))
}

/// Durable, append-only store of evaluation records.
#[derive(Debug, Clone)]
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    /// Store backed by `path`. The file is created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for a scenario under `dir`, creating the directory if needed.
    pub fn for_scenario(dir: impl AsRef<Path>, scenario_name: &str) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self::open(dir.join(feedback_file_name(scenario_name))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one completed record. Records still pending revision are
    /// rejected; I/O and serialization failures are returned.
    pub fn append(&self, record: &FeedbackData) -> Result<(), StoreError> {
        if !record.revision.is_terminal() {
            return Err(StoreError::Incomplete {
                event_id: record.event_id.clone(),
                backend: record.backend.clone(),
            });
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        if ends_mid_line(&mut file).map_err(|source| self.io_error(source))? {
            warn!(path = %self.path.display(), "Feedback log ends mid-record; starting a new line");
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))?;

        debug!(
            path = %self.path.display(),
            event_id = %record.event_id,
            backend = %record.backend,
            "Appended feedback record"
        );
        Ok(())
    }

    /// Read every complete record in append order.
    ///
    /// A missing file is an empty history.
    pub fn read_all(&self) -> Result<Vec<FeedbackData>, StoreError> {
        Self::load(&self.path)
    }

    /// Read every complete record from a log file.
    ///
    /// Truncated records left by an interrupted append are skipped. Any other
    /// malformed line is an error, except on the final line.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<FeedbackData>, StoreError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let lines: Vec<(usize, &str)> = contents
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .collect();
        let last = lines.len().saturating_sub(1);

        let mut records = Vec::with_capacity(lines.len());
        for (position, (index, line)) in lines.iter().enumerate() {
            match serde_json::from_str::<FeedbackData>(line) {
                Ok(record) => records.push(record),
                Err(e) if position == last || e.is_eof() => {
                    warn!(
                        path = %path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping partial record in feedback log"
                    );
                }
                Err(source) => {
                    return Err(StoreError::Corrupt {
                        path: path.to_path_buf(),
                        line: index + 1,
                        source,
                    })
                }
            }
        }
        Ok(records)
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn ends_mid_line(file: &mut fs::File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
