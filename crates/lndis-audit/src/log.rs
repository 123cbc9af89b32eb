// log.rs — Append-only JSONL audit log with a hash chain.
//
// One JSON object per line. Each entry carries the SHA-256 of the line before
// it in `previous_hash`, so editing, inserting, or dropping a line breaks the
// chain and `verify_chain` reports where.
//
// Durability: every append is written in one piece, flushed, and synced
// before it returns. If any of that fails the file is truncated back to its
// length before the append, so the next entry still starts on a fresh line.
// If the rollback fails too, the handle is poisoned and refuses all further
// appends. A crash mid-write can still leave a partial last line; `open`
// truncates that torn tail so the chain resumes from the last complete entry.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::entry::AuditEntry;
use crate::error::AuditError;
use crate::hasher;

/// The file operations an [`AuditLog`] needs beyond [`Write`].
///
/// Implemented for [`File`]. Wrappers let tests inject write or sync faults.
pub trait LogFile: Write + Send {
    /// Current length in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Cut the file back to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Push written bytes to stable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Single-writer handle on the audit file. `append` takes `&mut self`, so
/// appends from one handle are serialized by the borrow checker.
pub struct AuditLog {
    file: Box<dyn LogFile>,
    path: PathBuf,
    last_hash: Option<String>,
    len: usize,
    poisoned: bool,
}

impl AuditLog {
    /// Open (or create) the log, repairing a torn tail if one is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Self::open_with(path, |file| file)
    }

    /// Like [`open`](Self::open), with the opened file passed through `wrap`.
    pub fn open_with<F>(
        path: impl AsRef<Path>,
        wrap: impl FnOnce(File) -> F,
    ) -> Result<Self, AuditError>
    where
        F: LogFile + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let open_failed = |source| AuditError::OpenFailed {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_failed)?;
        }

        let (last_hash, len) = if path.exists() {
            repair_torn_tail(&path).map_err(open_failed)?;
            scan_tail_state(&path).map_err(open_failed)?
        } else {
            (None, 0)
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_failed)?;

        tracing::debug!(path = %path.display(), entries = len, "opened audit log");

        Ok(Self {
            file: Box::new(wrap(file)),
            path,
            last_hash,
            len,
            poisoned: false,
        })
    }

    /// Link, serialize, write, and sync one entry.
    ///
    /// On success the entry is on disk and must not be changed afterwards.
    /// On failure nothing of the entry remains in the file (or, if that could
    /// not be guaranteed, the log is poisoned) and the caller must not
    /// proceed as if the call were recorded.
    pub fn append(&mut self, entry: &mut AuditEntry) -> Result<(), AuditError> {
        if self.poisoned {
            return Err(AuditError::Poisoned {
                path: self.path.clone(),
            });
        }

        entry.previous_hash = self.last_hash.clone();
        let line = serde_json::to_string(entry)?;

        let offset = self.file.size()?;
        if let Err(err) = self.write_line(&line) {
            self.roll_back(offset, &err);
            return Err(err.into());
        }

        self.last_hash = Some(hasher::hash_str(&line));
        self.len += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line.as_bytes());
        record.push(b'\n');
        self.file.write_all(&record)?;
        self.file.flush()?;
        self.file.sync()
    }

    fn roll_back(&mut self, offset: u64, cause: &io::Error) {
        let restored = self
            .file
            .truncate(offset)
            .and_then(|()| self.file.sync());
        match restored {
            Ok(()) => tracing::warn!(
                path = %self.path.display(),
                error = %cause,
                "audit append failed; partial entry rolled back"
            ),
            Err(err) => {
                self.poisoned = true;
                tracing::error!(
                    path = %self.path.display(),
                    error = %cause,
                    rollback_error = %err,
                    "audit append failed and could not be rolled back; log poisoned"
                );
            }
        }
    }

    /// Whether an earlier failed append left the file in an unknown state.
    /// A poisoned log refuses every append; reopen it to repair the tail.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The last `n` entries, in append order (oldest of the `n` first).
    pub fn tail(&self, n: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let mut entries = Self::read_all(&self.path)?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.split_off(skip))
    }

    /// Every entry in the file, oldest first. A missing file reads as empty.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, AuditError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Walk the file and check every `previous_hash` link.
    ///
    /// Returns the number of entries verified.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AuditError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut expected: Option<String> = None;
        let mut count = 0;

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line)?;
            if entry.previous_hash != expected {
                return Err(AuditError::IntegrityViolation {
                    line: index + 1,
                    expected: expected.unwrap_or_else(|| "none".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "none".to_string()),
                });
            }
            // Hash the stored bytes, not a re-serialization.
            expected = Some(hasher::hash_str(&line));
            count += 1;
        }

        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in the file, counting those written before this handle opened.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Drop a trailing partial line left by an interrupted write.
fn repair_torn_tail(path: &Path) -> std::io::Result<()> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() || bytes.ends_with(b"\n") {
        return Ok(());
    }
    let keep = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);
    tracing::warn!(
        path = %path.display(),
        dropped_bytes = bytes.len() - keep,
        "audit log ends in a partial entry; truncating it"
    );
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(keep as u64)?;
    file.sync_data()
}

/// Hash of the last non-empty line and the number of non-empty lines.
fn scan_tail_state(path: &Path) -> std::io::Result<(Option<String>, usize)> {
    let mut last: Option<String> = None;
    let mut count = 0;
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            count += 1;
            last = Some(line);
        }
    }
    Ok((last.map(|line| hasher::hash_str(&line)), count))
}
