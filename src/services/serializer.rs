use crate::database::Database;
use crate::error::AppResult;
use crate::storage::FileStore;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<stem>-<timestamp><ext>` next to `original`
pub fn copy_name_for(original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "database".to_string());
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    original.with_file_name(format!("{}-{}{}", stem, timestamp, extension))
}

/// Write the live database beside `original` under a new name
pub fn save_copy(
    db: &mut dyn Database,
    store: &dyn FileStore,
    original: &Path,
) -> AppResult<PathBuf> {
    let target = copy_name_for(original);
    write_live_to(db, store, &target)?;
    info!(target: "serialize", "Wrote copy of database to {}", target.display());
    Ok(target)
}

/// Replace `original` with the live database
pub fn overwrite_original(
    db: &mut dyn Database,
    store: &dyn FileStore,
    original: &Path,
) -> AppResult<()> {
    write_live_to(db, store, original)?;
    info!(target: "serialize", "Overwrote {}", original.display());
    Ok(())
}

/// The handle is closed while reading so the bytes on disk are complete,
/// and reopened whatever the outcome
fn write_live_to(db: &mut dyn Database, store: &dyn FileStore, target: &Path) -> AppResult<()> {
    let live = db.file_name().to_path_buf();
    db.close_handle();
    let result = store
        .read(&live)
        .and_then(|bytes| store.write(target, &bytes));
    db.open_handle(&live)?;
    result
}
