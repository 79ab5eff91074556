//! # Journaled Result Accumulator
//!
//! Append-only checkpoint log that makes a batch run resumable.
//!
//! ```text
//! line 1:     <query descriptor as a query string>
//! line 2..N:  <item id>\t<query time ms>\t<max score>
//! ```
//!
//! Every entry is written in one call and synced before `add_result`
//! returns. On reopen, lines that do not parse as a complete entry are
//! discarded, and an unterminated tail left by a crash is truncated away so
//! the next append starts on a fresh line.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::accumulator::ResultAccumulator;
use crate::constants::journal::{FIELDS_PER_ENTRY, FIELD_SEPARATOR, LINE_TERMINATOR};
use crate::error::{BatchMatchError, Result};
use crate::logging::log_journal_operation;
use crate::models::MatchResult;
use crate::query::QueryDescriptor;

/// One completed item as recorded in the journal
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub item_id: String,
    pub query_time_ms: i64,
    pub max_score: f32,
}

impl JournalEntry {
    fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != FIELDS_PER_ENTRY || fields[0].is_empty() {
            return None;
        }
        Some(Self {
            item_id: fields[0].to_string(),
            query_time_ms: fields[1].parse().ok()?,
            max_score: fields[2].parse().ok()?,
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{:?}{LINE_TERMINATOR}",
            self.item_id, self.query_time_ms, self.max_score
        )
    }
}

/// State recovered from an existing journal file
#[derive(Debug, Clone)]
pub struct JournalSnapshot {
    pub descriptor: QueryDescriptor,
    pub completed_ids: HashSet<String>,
    /// Well-formed entry lines, duplicates included
    pub entries: usize,
    /// Lines dropped as malformed or unterminated
    pub discarded_lines: usize,
    /// Length of the prefix made of complete lines
    pub valid_len: u64,
}

/// Read a journal without opening it for writing.
///
/// Returns `None` when there is nothing to resume: the file is missing,
/// empty, or its header line was never terminated.
pub fn read_journal(path: &Path) -> Result<Option<JournalSnapshot>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BatchMatchError::journal(path.display(), e)),
    };
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let header_len = reader
        .read_until(b'\n', &mut buf)
        .map_err(|e| BatchMatchError::journal(path.display(), e))?;
    if header_len == 0 || !buf.ends_with(b"\n") {
        return Ok(None);
    }
    let header = std::str::from_utf8(&buf)
        .map_err(|e| BatchMatchError::journal(path.display(), format!("header is not UTF-8: {e}")))?;
    let descriptor = QueryDescriptor::parse(header).map_err(|e| {
        BatchMatchError::journal(path.display(), format!("unreadable header: {e}"))
    })?;

    let mut snapshot = JournalSnapshot {
        descriptor,
        completed_ids: HashSet::new(),
        entries: 0,
        discarded_lines: 0,
        valid_len: header_len as u64,
    };

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| BatchMatchError::journal(path.display(), e))?;
        if read == 0 {
            break;
        }
        if !buf.ends_with(b"\n") {
            warn!(
                journal = %path.display(),
                bytes = read,
                "JOURNAL: discarding unterminated trailing line"
            );
            snapshot.discarded_lines += 1;
            break;
        }
        snapshot.valid_len += read as u64;

        let line = std::str::from_utf8(&buf)
            .ok()
            .map(|line| line.trim_end_matches(['\r', '\n']));
        if line == Some("") {
            continue;
        }
        match line.and_then(JournalEntry::parse) {
            Some(entry) => {
                snapshot.entries += 1;
                snapshot.completed_ids.insert(entry.item_id);
            }
            None => {
                warn!(
                    journal = %path.display(),
                    line = %String::from_utf8_lossy(&buf).trim_end(),
                    "JOURNAL: discarding malformed entry"
                );
                snapshot.discarded_lines += 1;
            }
        }
    }

    Ok(Some(snapshot))
}

struct JournalState {
    /// `None` once closed, or after a failed append
    file: Option<File>,
    completed: HashSet<String>,
    /// Length of the journal made of complete lines
    valid_len: u64,
}

/// Accumulator that appends one synced line per result.
///
/// Only one process may hold a given journal path open at a time; there is
/// no file locking.
pub struct JournalAccumulator {
    path: PathBuf,
    descriptor: QueryDescriptor,
    resuming: bool,
    state: Mutex<JournalState>,
}

impl JournalAccumulator {
    /// Open `path`, creating it with `current` as its header, or reopen it
    /// and replay its entries. A reopened journal keeps its own stored
    /// descriptor; comparing it with `current` is the caller's job.
    pub fn open(path: impl AsRef<Path>, current: &QueryDescriptor) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_journal(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BatchMatchError::journal(path.display(), e))?;
        let on_disk_len = file
            .metadata()
            .map_err(|e| BatchMatchError::journal(path.display(), e))?
            .len();

        let accumulator = match snapshot {
            Some(snapshot) => {
                if on_disk_len > snapshot.valid_len {
                    file.set_len(snapshot.valid_len)
                        .map_err(|e| BatchMatchError::journal(path.display(), e))?;
                    debug!(
                        journal = %path.display(),
                        truncated_bytes = on_disk_len - snapshot.valid_len,
                        "JOURNAL: truncated torn tail"
                    );
                }
                log_journal_operation(
                    "resume",
                    &path,
                    Some(snapshot.completed_ids.len()),
                    "opened",
                    Some(&format!("discarded_lines={}", snapshot.discarded_lines)),
                );
                Self {
                    path,
                    descriptor: snapshot.descriptor,
                    resuming: true,
                    state: Mutex::new(JournalState {
                        file: Some(file),
                        completed: snapshot.completed_ids,
                        valid_len: snapshot.valid_len,
                    }),
                }
            }
            None => {
                if on_disk_len > 0 {
                    warn!(
                        journal = %path.display(),
                        bytes = on_disk_len,
                        "JOURNAL: header was never completed, starting fresh"
                    );
                    file.set_len(0)
                        .map_err(|e| BatchMatchError::journal(path.display(), e))?;
                }
                let header = format!("{}{LINE_TERMINATOR}", current.to_query_string());
                file.write_all(header.as_bytes())
                    .and_then(|()| file.sync_data())
                    .map_err(|e| BatchMatchError::journal(path.display(), e))?;
                log_journal_operation("create", &path, Some(0), "opened", None);
                Self {
                    path,
                    descriptor: current.clone(),
                    resuming: false,
                    state: Mutex::new(JournalState {
                        file: Some(file),
                        completed: HashSet::new(),
                        valid_len: header.len() as u64,
                    }),
                }
            }
        };

        Ok(accumulator)
    }

    /// Whether the journal already existed when opened
    pub fn is_resuming(&self) -> bool {
        self.resuming
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync and release the file handle
    pub fn close(self) -> Result<()> {
        let file = self.state.lock().file.take();
        if let Some(file) = file {
            file.sync_all()
                .map_err(|e| BatchMatchError::journal(self.path.display(), e))?;
            info!(journal = %self.path.display(), "JOURNAL: closed");
        }
        Ok(())
    }
}

impl ResultAccumulator for JournalAccumulator {
    fn add_result(&self, result: MatchResult) -> Result<()> {
        if result.item_id.is_empty() || result.item_id.contains(['\t', '\n', '\r']) {
            return Err(BatchMatchError::journal(
                self.path.display(),
                format!("item id {:?} cannot be journaled", result.item_id),
            ));
        }
        let entry = JournalEntry {
            item_id: result.item_id,
            query_time_ms: result.query_time_ms,
            max_score: result.max_score,
        };
        let line = entry.to_line();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| BatchMatchError::journal(self.path.display(), "journal is closed"))?;
        if let Err(e) = file
            .write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
        {
            // A partial line may be on disk; nothing may be appended after it
            if let Err(truncate_err) = file.set_len(state.valid_len) {
                warn!(
                    journal = %self.path.display(),
                    error = %truncate_err,
                    "JOURNAL: could not cut back partial entry"
                );
            }
            state.file = None;
            log_journal_operation(
                "append",
                &self.path,
                Some(state.completed.len()),
                "failed",
                Some(&e.to_string()),
            );
            return Err(BatchMatchError::journal(self.path.display(), e));
        }
        state.valid_len += line.len() as u64;
        state.completed.insert(entry.item_id);
        Ok(())
    }

    fn completed_ids(&self) -> HashSet<String> {
        self.state.lock().completed.clone()
    }

    fn n_completed(&self) -> usize {
        self.state.lock().completed.len()
    }

    fn query_descriptor(&self) -> QueryDescriptor {
        self.descriptor.clone()
    }
}

impl Drop for JournalAccumulator {
    fn drop(&mut self) {
        if let Some(file) = self.state.get_mut().file.take() {
            if let Err(e) = file.sync_all() {
                warn!(journal = %self.path.display(), error = %e, "JOURNAL: sync on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for JournalAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalAccumulator")
            .field("path", &self.path)
            .field("resuming", &self.resuming)
            .field("n_completed", &self.n_completed())
            .finish()
    }
}
