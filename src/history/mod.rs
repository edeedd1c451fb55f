//! Snapshot-based undo/redo of table data and the database file

pub mod undo_manager;

pub use undo_manager::{EditPhase, SnapshotFile, UndoEntry, UndoManager, DEFAULT_MAX_UNDO_DEPTH};
