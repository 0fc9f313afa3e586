//! JSONL-backed audit ledger
//!
//! One serialized [`AuditRecord`] per line, append-only. Opening an
//! existing file replays every line to rebuild the idempotency set and
//! effectiveness scores, so restarts keep their history.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mend_types::EffectivenessScore;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::LedgerResult;
use crate::ledger::AuditLedger;
use crate::memory::LedgerState;
use crate::record::{AuditFilter, AuditRecord};

struct FileState {
    state: LedgerState,
    file: File,
}

/// Durable ledger writing one JSON record per line
pub struct FileAuditLedger {
    path: PathBuf,
    inner: Mutex<FileState>,
}

impl FileAuditLedger {
    /// Open (or create) the ledger file and replay its contents.
    ///
    /// Lines that fail to parse are skipped with a warning rather than
    /// aborting the replay; a torn final line from a crash must not brick
    /// the ledger.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = LedgerState::default();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let mut replayed = 0usize;
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditRecord>(&line) {
                    Ok(record) => {
                        state.append(record);
                        replayed += 1;
                    }
                    Err(error) => {
                        warn!(
                            path = %path.display(),
                            line = line_no + 1,
                            %error,
                            "Skipping unparseable ledger line"
                        );
                    }
                }
            }
            info!(path = %path.display(), records = replayed, "Audit ledger replayed");
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(FileState { state, file }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLedger for FileAuditLedger {
    async fn record(&self, record: AuditRecord) -> LedgerResult<bool> {
        let line = serde_json::to_string(&record)?;
        let mut inner = self.inner.lock();
        if !inner.state.append(record) {
            return Ok(false);
        }
        writeln!(inner.file, "{line}")?;
        inner.file.flush()?;
        Ok(true)
    }

    async fn query(&self, filter: &AuditFilter) -> LedgerResult<Vec<AuditRecord>> {
        Ok(self.inner.lock().state.query(filter))
    }

    async fn effectiveness(&self) -> LedgerResult<HashMap<String, EffectivenessScore>> {
        Ok(self.inner.lock().state.effectiveness.clone())
    }
}
