use crate::data::datatable::{DataTable, DataValue};
use crate::error::{AppError, AppResult};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// Handles exporting tables to files
pub struct DataExporter;

impl DataExporter {
    /// Write `table` as CSV into `dir`, named after the table and the current
    /// time. NULL cells become empty fields.
    pub fn export_to_csv(table: &DataTable, dir: &Path) -> AppResult<PathBuf> {
        if table.column_count() == 0 {
            return Err(AppError::not_found("No data to export"));
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.csv", table.name, timestamp));
        let to_storage_error =
            |e: csv::Error| AppError::storage(&path, std::io::Error::other(e.to_string()));

        let mut writer = csv::Writer::from_path(&path).map_err(to_storage_error)?;
        writer
            .write_record(table.column_names())
            .map_err(to_storage_error)?;

        for row in 0..table.row_count() {
            let record: Vec<String> = table
                .column_names()
                .iter()
                .map(|column| match table.value(row, column) {
                    Some(DataValue::Null) | None => String::new(),
                    Some(value) => value.to_string(),
                })
                .collect();
            writer.write_record(&record).map_err(to_storage_error)?;
        }
        writer
            .flush()
            .map_err(|e| AppError::storage(&path, e))?;

        info!(target: "export", "Exported {} rows to {}", table.row_count(), path.display());
        Ok(path)
    }

    /// Write already-rendered view text into `dir`
    pub fn export_view_text(table_name: &str, text: &str, dir: &Path) -> AppResult<PathBuf> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_renderView_{}.txt", table_name, timestamp));
        std::fs::write(&path, text).map_err(|e| AppError::storage(&path, e))?;
        info!(target: "export", "Wrote view of {} to {}", table_name, path.display());
        Ok(path)
    }
}
