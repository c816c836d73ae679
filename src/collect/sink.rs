use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::pr::EnrichedPullRequest;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to access output file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record {id}: {source}")]
    Serialize {
        id: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Append-only newline-delimited JSON output. Each line is one complete
/// [`EnrichedPullRequest`]; the file is reopened in append mode for every write.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Open the sink at `path`. A last line left unterminated by an
    /// interrupted write is closed off so later appends start on a fresh line.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let sink = Self { path: path.into() };
        sink.terminate_partial_line()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `record` to a single line and append it.
    pub fn append(&self, record: &EnrichedPullRequest) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record).map_err(|source| SinkError::Serialize {
            id: record.id,
            source,
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_error(e))?;
        file.flush().map_err(|e| self.io_error(e))?;
        debug!(id = record.id, bytes = line.len(), "appended record");
        Ok(())
    }

    fn terminate_partial_line(&self) -> Result<(), SinkError> {
        let mut file = match OpenOptions::new().read(true).append(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.io_error(e)),
        };
        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if len == 0 {
            return Ok(());
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1)).map_err(|e| self.io_error(e))?;
        file.read_exact(&mut last).map_err(|e| self.io_error(e))?;
        if last[0] != b'\n' {
            warn!(path = %self.path.display(), "output file ends with a partial line, terminating it");
            file.write_all(b"\n").map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Deserialize)]
struct RecordId {
    id: u64,
}

/// Collect the ids of every record already in the output file.
///
/// A missing file means nothing has been processed yet. Blank lines are
/// ignored and lines that do not parse are skipped with a warning.
pub fn load_processed_ids(path: &Path) -> Result<HashSet<u64>, SinkError> {
    let io_error = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(io_error(e)),
    };

    // Raw bytes: a write cut off mid-character must not make the file unreadable
    let mut ids = HashSet::new();
    for (index, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(io_error)?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<RecordId>(&line) {
            Ok(record) => {
                ids.insert(record.id);
            }
            Err(e) => warn!(line = index + 1, error = %e, "skipping unreadable output line"),
        }
    }
    debug!(path = %path.display(), ids = ids.len(), "loaded processed ids");
    Ok(ids)
}
