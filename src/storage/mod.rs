//! File system collaborator used for snapshots and serialization

pub mod file_store;

pub use file_store::{FileStore, TempFileStore, SNAPSHOT_PREFIX};
