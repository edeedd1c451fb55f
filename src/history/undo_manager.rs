use crate::data::datatable::TableState;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::storage::FileStore;
use std::collections::VecDeque;
use std::mem;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_UNDO_DEPTH: usize = 10;

/// Sole owner of one database file on disk.
///
/// Not `Clone`: a path is deleted only through `release`, which consumes the
/// owner, so a file cannot be deleted twice or while something still holds it.
#[derive(Debug, PartialEq, Eq)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(self, store: &dyn FileStore) -> AppResult<()> {
        store.delete(&self.path)
    }
}

/// Table data together with the database file it was read from
#[derive(Debug)]
pub struct UndoEntry {
    pub state: TableState,
    pub file: SnapshotFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    /// No edit in flight
    Idle,
    /// Snapshot taken, edit not yet applied
    PreCommit,
    /// Last edit applied and recorded
    Committed,
}

/// Bounded undo history over whole-file snapshots.
///
/// The live database file is owned by `live`; every entry on either stack
/// owns the file it was captured with. An edit goes through
/// `begin_edit` -> (apply) -> `commit_edit`, or `abort_edit` on failure.
#[derive(Debug)]
pub struct UndoManager {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    live: SnapshotFile,
    pending: Option<UndoEntry>,
    phase: EditPhase,
    max_depth: usize,
}

impl UndoManager {
    /// `live_file` is the working copy the database handle currently points at
    pub fn new(live_file: impl Into<PathBuf>, max_depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            live: SnapshotFile::new(live_file),
            pending: None,
            phase: EditPhase::Idle,
            max_depth: max_depth.max(1),
        }
    }

    pub fn phase(&self) -> EditPhase {
        self.phase
    }

    pub fn live_path(&self) -> &Path {
        self.live.path()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Files held by the undo stack, oldest first
    pub fn undo_files(&self) -> impl Iterator<Item = &Path> + '_ {
        self.undo.iter().map(|e| e.file.path())
    }

    /// Take a snapshot of `state` and of the live file, then move the live
    /// handle onto a fresh copy. Nothing live is touched until the copy exists.
    pub fn begin_edit(
        &mut self,
        state: &mut TableState,
        db: &mut dyn Database,
        store: &dyn FileStore,
    ) -> AppResult<()> {
        if self.pending.is_some() {
            return Err(AppError::MalformedEdit(
                "another edit is still being applied".to_string(),
            ));
        }

        db.close_handle();
        let copy = match store.copy_to_temp(self.live.path()) {
            Ok(path) => path,
            Err(e) => {
                db.open_handle(self.live.path())?;
                return Err(e);
            }
        };
        if let Err(e) = db.open_handle(&copy) {
            if let Err(cleanup) = store.delete(&copy) {
                warn!(target: "undo", "Could not remove unused copy: {}", cleanup);
            }
            db.open_handle(self.live.path())?;
            return Err(e);
        }

        let snapshot = state.deep_copy();
        state.set_database_path(&copy);
        let previous = mem::replace(&mut self.live, SnapshotFile::new(copy));
        debug!(
            target: "undo",
            "Snapshot {} taken, live file is now {}",
            previous.path().display(),
            self.live.path().display()
        );

        self.pending = Some(UndoEntry {
            state: snapshot,
            file: previous,
        });
        self.phase = EditPhase::PreCommit;
        Ok(())
    }

    /// Record the pending snapshot. Returns the problems hit while releasing
    /// evicted or invalidated files; none of them undo the commit.
    pub fn commit_edit(&mut self, store: &dyn FileStore) -> AppResult<Vec<AppError>> {
        let entry = self
            .pending
            .take()
            .ok_or_else(|| AppError::MalformedEdit("no edit in progress".to_string()))?;

        let mut problems = Vec::new();
        self.undo.push_back(entry);
        self.enforce_depth(store, &mut problems);

        for stale in self.redo.drain(..) {
            release_logged(stale.file, store, &mut problems);
        }

        self.phase = EditPhase::Committed;
        info!(target: "undo", "Edit committed (undo: {}, redo: {})", self.undo.len(), self.redo.len());
        Ok(problems)
    }

    /// Throw away the copy made by `begin_edit` and go back to the state and
    /// file from before it.
    pub fn abort_edit(
        &mut self,
        state: &mut TableState,
        db: &mut dyn Database,
        store: &dyn FileStore,
    ) -> AppResult<()> {
        let Some(entry) = self.pending.take() else {
            return Ok(());
        };

        db.close_handle();
        let discarded = mem::replace(&mut self.live, entry.file);
        *state = entry.state;
        self.phase = EditPhase::Idle;

        if let Err(e) = discarded.release(store) {
            warn!(target: "undo", "Could not remove aborted copy: {}", e);
        }
        info!(target: "undo", "Edit aborted, live file back to {}", self.live.path().display());
        db.open_handle(self.live.path())
    }

    /// Returns false when there is nothing to undo. If the snapshot cannot be
    /// opened the entry stays on the undo stack and the live file stays open.
    pub fn undo(&mut self, state: &mut TableState, db: &mut dyn Database) -> AppResult<bool> {
        self.ensure_idle()?;
        let Some(entry) = self.undo.pop_back() else {
            return Ok(false);
        };
        match self.swap_live(entry, state, db) {
            Ok(current) => self.redo.push(current),
            Err((entry, e)) => {
                self.undo.push_back(entry);
                return Err(e);
            }
        }
        info!(target: "undo", "Undo (undo: {}, redo: {})", self.undo.len(), self.redo.len());
        Ok(true)
    }

    /// Returns `None` when there is nothing to redo, otherwise the problems
    /// hit while evicting the oldest undo entry, as `commit_edit` does.
    pub fn redo(
        &mut self,
        state: &mut TableState,
        db: &mut dyn Database,
        store: &dyn FileStore,
    ) -> AppResult<Option<Vec<AppError>>> {
        self.ensure_idle()?;
        let Some(entry) = self.redo.pop() else {
            return Ok(None);
        };
        match self.swap_live(entry, state, db) {
            Ok(current) => self.undo.push_back(current),
            Err((entry, e)) => {
                self.redo.push(entry);
                return Err(e);
            }
        }

        let mut problems = Vec::new();
        self.enforce_depth(store, &mut problems);
        info!(target: "undo", "Redo (undo: {}, redo: {})", self.undo.len(), self.redo.len());
        Ok(Some(problems))
    }

    fn ensure_idle(&self) -> AppResult<()> {
        if self.pending.is_some() {
            return Err(AppError::MalformedEdit(
                "finish the current edit before undo/redo".to_string(),
            ));
        }
        Ok(())
    }

    /// Make `entry` live and hand back what was live before. On failure the
    /// entry comes back untouched and the handle points at the live file again.
    fn swap_live(
        &mut self,
        entry: UndoEntry,
        state: &mut TableState,
        db: &mut dyn Database,
    ) -> Result<UndoEntry, (UndoEntry, AppError)> {
        db.close_handle();
        if let Err(e) = db.open_handle(entry.file.path()) {
            warn!(
                target: "undo",
                "Cannot open snapshot {}: {}",
                entry.file.path().display(),
                e
            );
            if let Err(reopen) = db.open_handle(self.live.path()) {
                warn!(target: "undo", "Could not reopen live file: {}", reopen);
            }
            return Err((entry, e));
        }

        let previous_state = mem::replace(state, entry.state);
        let previous_file = mem::replace(&mut self.live, entry.file);
        self.phase = EditPhase::Idle;
        Ok(UndoEntry {
            state: previous_state,
            file: previous_file,
        })
    }

    fn enforce_depth(&mut self, store: &dyn FileStore, problems: &mut Vec<AppError>) {
        while self.undo.len() > self.max_depth {
            if let Some(oldest) = self.undo.pop_front() {
                debug!(target: "undo", "Evicting snapshot {}", oldest.file.path().display());
                release_logged(oldest.file, store, problems);
            }
        }
    }
}

fn release_logged(file: SnapshotFile, store: &dyn FileStore, problems: &mut Vec<AppError>) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.release(store) {
        if e.is_missing_file() {
            warn!(target: "undo", "Snapshot {} was already gone", path.display());
        } else {
            warn!(target: "undo", "Could not delete snapshot {}: {}", path.display(), e);
        }
        problems.push(e);
    }
}
