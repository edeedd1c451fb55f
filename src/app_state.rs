//! Owned application context.
//!
//! `AppState` holds everything the running browser needs: configuration,
//! the database handle and its connection pool, the snapshot store, the
//! loaded tables, undo history and snippets. Nothing here is global; the
//! binary builds one `AppState` and the TUI drives it one event at a time.
//!
//! Recoverable errors never unwind out of the event loop. They are turned
//! into a status message through [`AppState::report_error`].

use crate::config::Config;
use crate::data::data_view::{window_of, ColumnWindow};
use crate::data::datatable::{DataTable, DataValue, TableState};
use crate::data::type_coercion::{coerce_string_to_original_type, string_representation};
use crate::database::{ConnectionPool, Database, SqliteDatabase, QUERY_RESULTS_TABLE};
use crate::error::{AppError, AppResult};
use crate::history::UndoManager;
use crate::services::{serializer, DataExporter, SnippetStore};
use crate::sql::query_builder::PendingUpdate;
use crate::sql::StatementKind;
use crate::storage::{FileStore, TempFileStore};
use crate::ui::coordinate_mapper::{CellPosition, ScrollState, ViewGeometry};
use crate::ui::format_buffer::{pretty_json, FormatBuffer};
use crate::ui::render::{BodyContent, FooterInfo, FrameSnapshot};
use crate::utils::logging::LogRingBuffer;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const LOG_VIEW_ENTRIES: usize = 200;

pub const HELP_TEXT: &str = "\
Navigation
  w/s/a/d, arrows   move the cursor (scrolls at the edges)
  m / n             scroll down / up
  h / l             scroll columns left / right
  j / k             next / previous table
  PgUp / PgDn       page up / down
  c                 expand the column under the cursor
  b                 toggle cell borders
  enter, click      show the full value of the selected cell
  esc               back to the table

Editing
  i                 edit the selected cell inline
  :                 open the command line
  u / r             undo / redo
  p                 write the current view to a text file

Commands
  :edit             edit the selected cell in format mode
  :new              edit the selected cell starting from an empty buffer
  :sql              write SQL in format mode
  :exec             (in :sql) run the buffer
  :stow [name]      (in :sql) save the buffer as a snippet
  :clip             list stored snippets
  :run <n|name>     run a stored snippet
  :w / :wq / :q     (in format mode) write / write and quit / quit
  :s                save a copy of the database next to the original
  :s!               overwrite the original database file
  :d                leave query results
  :export           write the displayed table to CSV
  :log              show recent log entries
  :h                this help

  q, ctrl-c         quit";

/// What the screen is showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Browsing the table
    Table,
    /// Full value of the selected cell
    Selection,
    /// Single-line input at the bottom: a cell value or a `:` command
    EditLine,
    /// Multi-line buffer; `command_focus` means keys go to the command line
    Format { command_focus: bool },
    /// Long text (help, logs, snippets); any key goes back
    Message(String),
}

/// What a format buffer will be written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatTarget {
    Cell {
        table: String,
        row: usize,
        column: String,
    },
    Sql,
}

#[derive(Debug)]
pub struct FormatSession {
    pub buffer: FormatBuffer,
    pub target: FormatTarget,
}

/// Result of a confirmed cell edit
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Applied { old: DataValue, new: DataValue },
    Unchanged,
}

pub struct AppState {
    pub config: Config,
    original_path: PathBuf,
    pool: Arc<ConnectionPool>,
    db: SqliteDatabase,
    store: TempFileStore,
    tables: TableState,
    primary_keys: HashMap<String, Vec<String>>,
    query_result: Option<DataTable>,
    undo: UndoManager,
    snippets: SnippetStore,
    log_buffer: Option<LogRingBuffer>,
    export_dir: PathBuf,

    pub mode: Mode,
    pub scroll: ScrollState,
    pub geometry: ViewGeometry,
    pub format: Option<FormatSession>,
    current_table: usize,
    expanded: Option<usize>,
    border: bool,
    status: Option<String>,
}

impl AppState {
    /// Copy `original` into `temp_dir` and open the copy. Every failure here
    /// is fatal for the caller: there is no usable state without the file.
    pub fn open(original: &Path, config: Config, temp_dir: &Path) -> AppResult<Self> {
        if !original.is_file() {
            return Err(AppError::storage(
                original,
                std::io::Error::new(std::io::ErrorKind::NotFound, "database file not found"),
            ));
        }

        let store = TempFileStore::new(temp_dir)?;
        if config.behavior.clear_temp_on_start {
            store.clear()?;
        }
        let working = store.copy_to_temp(original)?;
        info!(target: "termsql", "Working copy of {} at {}", original.display(), working.display());

        let pool = Arc::new(ConnectionPool::new());
        let db = SqliteDatabase::open(&working, Arc::clone(&pool))?;

        let mut geometry = ViewGeometry::new(80, 24);
        geometry.header_height = config.display.header_height;
        geometry.footer_height = config.display.footer_height;
        geometry.min_column_width = config.display.min_column_width.max(1);

        let mut state = Self {
            original_path: original.to_path_buf(),
            pool,
            db,
            tables: TableState::new(&working),
            primary_keys: HashMap::new(),
            query_result: None,
            undo: UndoManager::new(&working, config.behavior.max_undo_depth),
            snippets: SnippetStore::load(temp_dir),
            log_buffer: None,
            export_dir: PathBuf::from("."),
            mode: Mode::Table,
            scroll: ScrollState::new(geometry.header_height),
            geometry,
            format: None,
            current_table: 0,
            expanded: None,
            border: config.display.border,
            status: None,
            store,
            config,
        };
        state.reload_tables()?;
        Ok(state)
    }

    pub fn with_log_buffer(mut self, buffer: LogRingBuffer) -> Self {
        self.log_buffer = Some(buffer);
        self
    }

    /// Directory CSV and text exports are written to
    pub fn set_export_dir(&mut self, dir: impl Into<PathBuf>) {
        self.export_dir = dir.into();
    }

    pub fn tables(&self) -> &TableState {
        &self.tables
    }

    pub fn database(&self) -> &dyn Database {
        &self.db
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn snippets(&self) -> &SnippetStore {
        &self.snippets
    }

    pub fn query_result(&self) -> Option<&DataTable> {
        self.query_result.as_ref()
    }

    pub fn showing_results(&self) -> bool {
        self.query_result.is_some()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn border(&self) -> bool {
        self.border
    }

    pub fn expanded_column(&self) -> Option<usize> {
        self.expanded
    }

    pub fn connection_count(&self) -> usize {
        self.pool.len()
    }

    /// Re-read every table from the live database file
    pub fn reload_tables(&mut self) -> AppResult<()> {
        let mut tables = TableState::new(self.db.file_name());
        let mut primary_keys = HashMap::new();
        for name in self.db.list_table_names()? {
            primary_keys.insert(name.clone(), self.db.primary_key_columns(&name)?);
            tables.insert_table(self.db.select_all(&name)?);
        }
        debug!(target: "termsql", "Loaded {} tables", tables.table_count());
        self.tables = tables;
        self.primary_keys = primary_keys;
        self.current_table = self
            .current_table
            .min(self.tables.table_count().saturating_sub(1));
        Ok(())
    }

    /// Name of the table on screen
    pub fn current_table_name(&self) -> Option<&str> {
        if self.query_result.is_some() {
            return Some(QUERY_RESULTS_TABLE);
        }
        self.tables
            .table_names()
            .get(self.current_table)
            .map(String::as_str)
    }

    pub fn active_table(&self) -> Option<&DataTable> {
        if let Some(result) = &self.query_result {
            return Some(result);
        }
        let name = self.current_table_name()?;
        self.tables.table(name).ok()
    }

    pub fn set_terminal_size(&mut self, width: u16, height: u16) {
        self.geometry.width = usize::from(width);
        self.geometry.height = usize::from(height);
        if let Some(session) = &mut self.format {
            session.buffer.set_viewport_height(self.geometry.body_height());
        }
    }

    /// Cell under the cursor
    pub fn selected_position(&self) -> CellPosition {
        match self.active_table() {
            Some(table) => self.scroll.map(
                &self.geometry,
                table.row_count(),
                table.column_count(),
                self.expanded,
            ),
            None => CellPosition::OutOfRange,
        }
    }

    /// (table, row, column name, value) under the cursor
    pub fn selected_cell(&self) -> AppResult<(String, usize, String, DataValue)> {
        let table = self
            .active_table()
            .ok_or_else(|| AppError::not_found("No table loaded"))?;
        let (row, col) = self
            .selected_position()
            .cell()
            .ok_or_else(|| AppError::not_found("No cell under the cursor"))?;
        let column = table
            .column_name(col)
            .ok_or_else(|| AppError::not_found(format!("No column {}", col)))?
            .to_string();
        let value = table
            .value(row, &column)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No row {}", row)))?;
        Ok((table.name.clone(), row, column, value))
    }

    // ---- status and errors ----

    pub fn display_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "termsql", "{}", message);
        self.status = Some(message);
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Show `err`. A missing table/column/row also drops back to the table view
    pub fn report_error(&mut self, err: AppError) {
        warn!(target: "termsql", "{}", err);
        if matches!(err, AppError::DataNotFound(_)) {
            self.exit_to_default_view();
        }
        self.status = Some(err.to_string());
    }

    pub fn exit_to_default_view(&mut self) {
        self.mode = Mode::Table;
        self.format = None;
        self.scroll.release_pre_edit();
    }

    // ---- navigation ----

    pub fn next_table(&mut self) {
        self.switch_table(1);
    }

    pub fn previous_table(&mut self) {
        self.switch_table(-1);
    }

    fn switch_table(&mut self, step: isize) {
        let count = self.tables.table_count();
        if self.query_result.is_some() || count == 0 {
            return;
        }
        self.current_table = (self.current_table as isize + step).rem_euclid(count as isize) as usize;
        self.expanded = None;
        self.scroll.reset(&self.geometry);
        debug!(target: "navigation", "Switched to table {}", self.current_table);
    }

    pub fn toggle_border(&mut self) {
        self.border = !self.border;
    }

    /// Show only the column under the cursor, or go back to all columns
    pub fn toggle_expanded_column(&mut self) {
        if self.expanded.take().is_some() {
            return;
        }
        if let Some((_, col)) = self.selected_position().cell() {
            self.expanded = Some(col);
        }
    }

    fn header_count(&self) -> usize {
        self.active_table().map_or(0, DataTable::column_count)
    }

    fn row_count(&self) -> usize {
        self.active_table().map_or(0, DataTable::row_count)
    }

    pub fn cursor_up(&mut self) {
        self.scroll.cursor_up(&self.geometry);
    }

    pub fn cursor_down(&mut self) {
        let rows = self.row_count();
        self.scroll.cursor_down(&self.geometry, rows);
    }

    pub fn cursor_left(&mut self) {
        if self.expanded.is_none() {
            let headers = self.header_count();
            self.scroll.cursor_left(&self.geometry, headers);
        }
    }

    pub fn cursor_right(&mut self) {
        if self.expanded.is_none() {
            let headers = self.header_count();
            self.scroll.cursor_right(&self.geometry, headers);
        }
    }

    pub fn scroll_down(&mut self) {
        let rows = self.row_count();
        self.scroll.scroll_down(rows);
    }

    pub fn scroll_up(&mut self) {
        self.scroll.scroll_up();
    }

    pub fn scroll_left(&mut self) {
        self.scroll.scroll_left();
    }

    pub fn scroll_right(&mut self) {
        let headers = self.header_count();
        self.scroll.scroll_right(&self.geometry, headers);
    }

    pub fn page_down(&mut self) {
        let rows = self.row_count();
        self.scroll.page_down(&self.geometry, rows);
    }

    pub fn page_up(&mut self) {
        self.scroll.page_up(&self.geometry);
    }

    /// Full value of the selected cell, pretty-printed when it is JSON
    pub fn selection_text(&self) -> AppResult<String> {
        let (_, _, _, value) = self.selected_cell()?;
        let raw = string_representation(&value);
        Ok(pretty_json(&raw, self.config.behavior.json_indent).unwrap_or(raw))
    }

    pub fn enter_selection(&mut self) {
        match self.selected_cell() {
            Ok(_) => self.mode = Mode::Selection,
            Err(e) => self.report_error(e),
        }
    }

    // ---- editing ----

    /// Start inline editing. Returns the text the input line starts with.
    pub fn begin_inline_edit(&mut self, command: bool) -> AppResult<String> {
        let initial = if command {
            ":".to_string()
        } else {
            self.refuse_in_results()?;
            let (_, _, _, value) = self.selected_cell()?;
            string_representation(&value)
        };
        self.scroll.capture_pre_edit();
        self.mode = Mode::EditLine;
        Ok(initial)
    }

    /// Confirm a cell edit: coerce, snapshot, write to the database, update
    /// the table, record the snapshot. A failure after the snapshot restores
    /// the state from before it.
    pub fn apply_cell_edit(
        &mut self,
        table: &str,
        row: usize,
        column: &str,
        text: &str,
    ) -> AppResult<EditOutcome> {
        self.refuse_in_results()?;
        let current = self.tables.table(table)?;
        let original = current
            .value(row, column)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("No cell {}.{} at row {}", table, column, row)))?;

        let new_value = coerce_string_to_original_type(text, &original)?;
        if new_value == original {
            return Ok(EditOutcome::Unchanged);
        }

        let primary_key = self.primary_keys.get(table).cloned().unwrap_or_default();
        let update = PendingUpdate::for_cell(current, row, column, new_value.clone(), &primary_key)?;

        self.undo.begin_edit(&mut self.tables, &mut self.db, &self.store)?;
        let applied = self.db.update(&update).and_then(|_| {
            self.tables
                .table_mut(table)?
                .set_value(row, column, new_value.clone())
        });

        match applied {
            Ok(old) => {
                self.commit_snapshot()?;
                info!(target: "query", "Updated {}.{} row {}", table, column, row);
                Ok(EditOutcome::Applied { old, new: new_value })
            }
            Err(e) => {
                self.abort_snapshot();
                Err(e)
            }
        }
    }

    /// Submit the inline input line
    pub fn submit_edit_line(&mut self, input: &str) -> AppResult<()> {
        let input_trimmed = input.trim();
        if input_trimmed.starts_with(':') {
            return self.run_command(input_trimmed);
        }

        let (table, row, column, _) = self.selected_cell()?;
        match self.apply_cell_edit(&table, row, &column, input)? {
            EditOutcome::Applied { old, new } => {
                self.display_message(format!("{}: {} -> {}", column, old, new));
            }
            EditOutcome::Unchanged => {}
        }
        self.exit_to_default_view();
        Ok(())
    }

    /// Commands typed on the input line outside format mode
    pub fn run_command(&mut self, command: &str) -> AppResult<()> {
        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (command, None),
        };
        debug!(target: "command", "Running command {}", name);

        match name {
            ":q" => self.exit_to_default_view(),
            ":h" => self.show_text(HELP_TEXT.to_string()),
            ":log" => self.show_log(),
            ":clip" => self.show_snippets(),
            ":d" => self.leave_results()?,
            ":s" => self.save_copy()?,
            ":s!" => self.overwrite_original()?,
            ":export" => self.export_csv()?,
            ":sql" => self.open_format(FormatTarget::Sql, ""),
            ":edit" | ":new" => {
                self.refuse_in_results()?;
                let (table, row, column, value) = self.selected_cell()?;
                let raw = if name == ":edit" {
                    string_representation(&value)
                } else {
                    String::new()
                };
                self.open_format(FormatTarget::Cell { table, row, column }, &raw);
            }
            ":run" => {
                let key = argument.ok_or_else(|| AppError::not_found("Usage: :run <n|name>"))?;
                let sql = self.snippets.get(key)?.to_string();
                self.exit_to_default_view();
                self.execute_sql(&sql)?;
            }
            other => {
                return Err(AppError::not_found(format!("Unknown command: {}", other)));
            }
        }
        Ok(())
    }

    fn open_format(&mut self, target: FormatTarget, raw: &str) {
        let mut buffer = FormatBuffer::enter(
            raw,
            self.config.behavior.json_indent,
            self.config.behavior.tab_width,
        );
        buffer.set_viewport_height(self.geometry.body_height());
        if !self.scroll.is_modal() {
            self.scroll.capture_pre_edit();
        }
        self.format = Some(FormatSession { buffer, target });
        self.mode = Mode::Format {
            command_focus: false,
        };
    }

    /// Commands typed while a format buffer is open
    pub fn submit_format_command(&mut self, command: &str) -> AppResult<()> {
        let command = command.trim();
        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (command, None),
        };
        let session = self
            .format
            .as_ref()
            .ok_or_else(|| AppError::not_found("Format mode is not active"))?;
        let target = session.target.clone();
        let text = session.buffer.text();

        match (name, &target) {
            (":q", _) => self.exit_to_default_view(),
            (":s", _) => self.save_copy()?,
            (":s!", _) => self.overwrite_original()?,
            (":w" | ":wq", FormatTarget::Cell { table, row, column }) => {
                let committed = session.buffer.clone().exit(true).unwrap_or(text);
                self.apply_cell_edit(table, *row, column, &committed)?;
                if name == ":wq" {
                    self.exit_to_default_view();
                } else {
                    self.display_message(format!("Wrote {}", column));
                    self.mode = Mode::Format {
                        command_focus: false,
                    };
                }
            }
            (":exec", FormatTarget::Sql) => {
                self.exit_to_default_view();
                self.execute_sql(&text)?;
            }
            (":stow", FormatTarget::Sql) => {
                if text.trim().is_empty() {
                    return Err(AppError::MalformedEdit("Nothing to stow".to_string()));
                }
                let stored = self.snippets.stow(argument, &text)?.name.clone();
                let total = self.snippets.len();
                self.display_message(format!(
                    "Wrote SQL snippet {} to {}. Total count is {}",
                    stored,
                    self.snippets.path().display(),
                    total
                ));
                self.mode = Mode::Format {
                    command_focus: false,
                };
            }
            (other, _) => {
                return Err(AppError::MalformedEdit(format!(
                    "{} is not available here",
                    other
                )));
            }
        }
        Ok(())
    }

    pub fn format_buffer_mut(&mut self) -> Option<&mut FormatBuffer> {
        self.format.as_mut().map(|s| &mut s.buffer)
    }

    fn refuse_in_results(&self) -> AppResult<()> {
        if self.query_result.is_some() {
            return Err(AppError::MalformedEdit(
                "Cannot manipulate the database while query results are displayed (:d to leave)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn commit_snapshot(&mut self) -> AppResult<()> {
        for problem in self.undo.commit_edit(&self.store)? {
            warn!(target: "undo", "Snapshot cleanup: {}", problem);
        }
        Ok(())
    }

    fn abort_snapshot(&mut self) {
        if let Err(e) = self
            .undo
            .abort_edit(&mut self.tables, &mut self.db, &self.store)
        {
            warn!(target: "undo", "Could not restore pre-edit state: {}", e);
        }
    }

    // ---- raw SQL ----

    /// Run user SQL. Mutations are snapshotted and all tables reloaded;
    /// anything else is shown as a read-only result table.
    pub fn execute_sql(&mut self, sql: &str) -> AppResult<()> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(AppError::MalformedEdit("No SQL to execute".to_string()));
        }

        match self.statement_kind(sql) {
            StatementKind::Mutation => {
                self.query_result = None;
                self.undo.begin_edit(&mut self.tables, &mut self.db, &self.store)?;
                let outcome = self
                    .db
                    .execute(sql)
                    .and_then(|changed| self.reload_tables().map(|_| changed));
                match outcome {
                    Ok(changed) => {
                        self.commit_snapshot()?;
                        self.display_message(format!("{} rows affected", changed));
                    }
                    Err(e) => {
                        self.abort_snapshot();
                        return Err(e);
                    }
                }
            }
            StatementKind::Query => {
                let result = self.db.query(sql)?;
                let rows = result.row_count();
                self.query_result = Some(result);
                self.expanded = None;
                self.scroll.reset(&self.geometry);
                self.display_message(format!("Query returned {} rows (:d to go back)", rows));
            }
        }
        Ok(())
    }

    /// Asks the engine first; SQL it cannot prepare (a statement using a
    /// table an earlier one creates) falls back to the leading keyword
    fn statement_kind(&self, sql: &str) -> StatementKind {
        match self.db.is_read_only(sql) {
            Ok(read_only) => StatementKind::from_read_only(read_only),
            Err(e) => {
                debug!(target: "query", "Could not prepare for classification: {}", e);
                StatementKind::classify(sql)
            }
        }
    }

    /// Back from query results to the database tables
    pub fn leave_results(&mut self) -> AppResult<()> {
        if self.query_result.take().is_none() {
            return Err(AppError::not_found("No query results are displayed"));
        }
        self.expanded = None;
        self.scroll.reset(&self.geometry);
        self.exit_to_default_view();
        Ok(())
    }

    // ---- undo / redo ----

    pub fn undo(&mut self) -> AppResult<()> {
        self.refuse_in_results()?;
        if self.undo.undo(&mut self.tables, &mut self.db)? {
            self.refresh_keys()?;
            self.display_message("Undid last change");
        } else {
            self.display_message("Nothing to undo");
        }
        Ok(())
    }

    pub fn redo(&mut self) -> AppResult<()> {
        self.refuse_in_results()?;
        match self.undo.redo(&mut self.tables, &mut self.db, &self.store)? {
            Some(problems) => {
                for problem in problems {
                    warn!(target: "undo", "Snapshot cleanup: {}", problem);
                }
                self.refresh_keys()?;
                self.display_message("Redid last change");
            }
            None => self.display_message("Nothing to redo"),
        }
        Ok(())
    }

    /// Schema can differ between snapshots after raw DDL
    fn refresh_keys(&mut self) -> AppResult<()> {
        let mut primary_keys = HashMap::new();
        for name in self.tables.table_names() {
            primary_keys.insert(name.clone(), self.db.primary_key_columns(name)?);
        }
        self.primary_keys = primary_keys;
        self.current_table = self
            .current_table
            .min(self.tables.table_count().saturating_sub(1));
        Ok(())
    }

    // ---- files ----

    pub fn save_copy(&mut self) -> AppResult<()> {
        let path = serializer::save_copy(&mut self.db, &self.store, &self.original_path)?;
        self.exit_to_default_view();
        self.display_message(format!("Wrote copy of database to {}", path.display()));
        Ok(())
    }

    pub fn overwrite_original(&mut self) -> AppResult<()> {
        serializer::overwrite_original(&mut self.db, &self.store, &self.original_path)?;
        self.exit_to_default_view();
        self.display_message("Overwrote original database file with changes");
        Ok(())
    }

    pub fn export_csv(&mut self) -> AppResult<()> {
        let table = self
            .active_table()
            .ok_or_else(|| AppError::not_found("No table to export"))?;
        let path = DataExporter::export_to_csv(table, &self.export_dir)?;
        self.exit_to_default_view();
        self.display_message(format!("Exported to {}", path.display()));
        Ok(())
    }

    /// Write the visible part of the table as plain text
    pub fn export_view(&mut self) -> AppResult<()> {
        let snapshot = self.frame_snapshot(None);
        let mut text = snapshot.headers.join("\t");
        for row in &snapshot.rows {
            text.push('\n');
            text.push_str(&row.join("\t"));
        }
        let name = self.current_table_name().unwrap_or("table").to_string();
        let path = DataExporter::export_view_text(&name, &text, &self.export_dir)?;
        self.display_message(format!("Wrote view to {}", path.display()));
        Ok(())
    }

    // ---- text views ----

    fn show_text(&mut self, text: String) {
        self.format = None;
        self.scroll.release_pre_edit();
        self.mode = Mode::Message(text);
    }

    fn show_log(&mut self) {
        let text = match &self.log_buffer {
            Some(buffer) => buffer
                .get_recent(LOG_VIEW_ENTRIES)
                .iter()
                .map(|e| e.format_for_display())
                .collect::<Vec<_>>()
                .join("\n"),
            None => "Logging is not enabled".to_string(),
        };
        self.show_text(text);
    }

    fn show_snippets(&mut self) {
        if self.snippets.is_empty() {
            self.exit_to_default_view();
            self.display_message("No stored snippets");
            return;
        }
        let text = self
            .snippets
            .list()
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{:>3}. {}\n     {}", i + 1, s.name, s.query))
            .collect::<Vec<_>>()
            .join("\n");
        self.show_text(text);
    }

    // ---- rendering ----

    /// Immutable copy of everything one frame needs. `input` is the input
    /// line text and cursor when it is open.
    pub fn frame_snapshot(&self, input: Option<(String, usize)>) -> FrameSnapshot {
        let table = self.active_table();
        let header_count = table.map_or(0, DataTable::column_count);
        let window = match table {
            Some(_) => self
                .scroll
                .column_window(&self.geometry, header_count, self.expanded),
            None => ColumnWindow::new(0, 1),
        };
        let position = self.selected_position();

        let (headers, rows, top) = match table {
            Some(table) => {
                let top = self.scroll.top_row();
                let slice = window_of(table, top, self.geometry.body_height(), window);
                let headers: Vec<String> = slice.headers().map(str::to_string).collect();
                let rows: Vec<Vec<String>> = (0..slice.row_count())
                    .map(|r| {
                        slice
                            .columns
                            .iter()
                            .map(|c| string_representation(&c.values[r]))
                            .collect()
                    })
                    .collect();
                (headers, rows, slice.top_offset)
            }
            None => (Vec::new(), Vec::new(), 0),
        };

        let visible_start = window.range(header_count).start;
        let highlight = position.cell().and_then(|(row, col)| {
            let screen_row = row.checked_sub(top)?;
            let screen_col = if self.expanded.is_some() {
                0
            } else {
                col.checked_sub(visible_start)?
            };
            Some((screen_row, screen_col))
        });

        let body = match (&self.mode, &self.format) {
            (Mode::Format { .. }, Some(session)) => BodyContent::Editor {
                lines: session.buffer.visible_lines().to_vec(),
                first_line: session.buffer.scroll(),
                cursor: session.buffer.cursor_on_screen(),
            },
            (Mode::Selection, _) => BodyContent::Text(
                self.selection_text()
                    .unwrap_or_default()
                    .lines()
                    .map(str::to_string)
                    .collect(),
            ),
            (Mode::Message(text), _) => {
                BodyContent::Text(text.lines().map(str::to_string).collect())
            }
            _ => BodyContent::Table,
        };

        let title = match self.current_table_name() {
            Some(name) => format!(
                "{} | {} ({}/{})",
                self.original_path.display(),
                name,
                self.current_table + 1,
                self.tables.table_count()
            ),
            None => format!("{} | no tables", self.original_path.display()),
        };

        let position_text = match position.cell() {
            Some((row, col)) => format!("row {} col {}", row + 1, col + 1),
            None => "-".to_string(),
        };

        FrameSnapshot {
            title,
            headers,
            rows,
            cell_width: self.geometry.cell_width(header_count, self.expanded.is_some()),
            highlight,
            body,
            border: self.border,
            ascii: self.config.display.ascii,
            footer: FooterInfo {
                mode: self.mode_label().to_string(),
                position: position_text,
                total_rows: table.map_or(0, DataTable::row_count),
                undo_depth: self.undo.undo_len(),
                redo_depth: self.undo.redo_len(),
                showing_results: self.showing_results(),
                status: self.status.clone(),
                input,
            },
        }
    }

    fn mode_label(&self) -> &'static str {
        match self.mode {
            Mode::Table => "TABLE",
            Mode::Selection => "SELECT",
            Mode::EditLine => "EDIT",
            Mode::Format { .. } => match self.format.as_ref().map(|s| &s.target) {
                Some(FormatTarget::Sql) => "SQL",
                _ => "FORMAT",
            },
            Mode::Message(_) => "VIEW",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::format_buffer::CursorDirection;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn open_app(dir: &TempDir) -> AppState {
        let original = dir.path().join("app.db");
        Connection::open(&original)
            .unwrap()
            .execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);
                 INSERT INTO users VALUES (1, 'Alice', 30), (2, 'Bob', 17), (3, 'Carol', 45);
                 CREATE TABLE notes (body TEXT);
                 INSERT INTO notes VALUES ('{\"a\":1,\"b\":2}');",
            )
            .unwrap();
        let mut app = AppState::open(&original, Config::default(), &dir.path().join(".termsql")).unwrap();
        app.set_export_dir(dir.path());
        app
    }

    #[test]
    fn test_open_copies_and_loads() {
        let dir = TempDir::new().unwrap();
        let app = open_app(&dir);
        assert_eq!(app.tables().table_names(), &["users", "notes"]);
        assert_ne!(app.database().file_name(), dir.path().join("app.db"));
        assert_eq!(app.current_table_name(), Some("users"));
        assert_eq!(app.connection_count(), 1);
    }

    #[test]
    fn test_open_missing_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let result = AppState::open(&dir.path().join("nope.db"), Config::default(), dir.path());
        assert!(matches!(result, Err(ref e) if e.is_missing_file()));
    }

    #[test]
    fn test_inline_edit_of_selected_cell() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.cursor_down();
        app.cursor_right();

        assert_eq!(app.begin_inline_edit(false).unwrap(), "Bob");
        app.submit_edit_line("Bobby").unwrap();
        assert_eq!(app.mode, Mode::Table);
        assert_eq!(
            app.tables().table("users").unwrap().value(1, "name"),
            Some(&DataValue::String("Bobby".into()))
        );
        assert_eq!(app.undo_manager().undo_len(), 1);

        app.undo().unwrap();
        assert_eq!(
            app.tables().table("users").unwrap().value(1, "name"),
            Some(&DataValue::String("Bob".into()))
        );
    }

    #[test]
    fn test_malformed_edit_keeps_edit_mode() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.cursor_right();
        app.cursor_right();
        app.begin_inline_edit(false).unwrap();

        let err = app.submit_edit_line("thirty").unwrap_err();
        assert!(matches!(err, AppError::MalformedEdit(_)));
        app.report_error(err);
        assert_eq!(app.mode, Mode::EditLine);
        assert_eq!(app.undo_manager().undo_len(), 0);
    }

    #[test]
    fn test_unchanged_value_takes_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        let outcome = app.apply_cell_edit("users", 0, "name", "Alice").unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
        assert_eq!(app.undo_manager().undo_len(), 0);
    }

    #[test]
    fn test_format_mode_commits_minified_json() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.next_table();
        app.run_command(":edit").unwrap();
        assert_eq!(app.format.as_ref().unwrap().buffer.line_count(), 4);

        let buffer = app.format_buffer_mut().unwrap();
        buffer.move_cursor(CursorDirection::Down);
        buffer.move_cursor(CursorDirection::Down);
        buffer.move_cursor(CursorDirection::End);
        buffer.insert_char('3');
        app.submit_format_command(":wq").unwrap();

        assert_eq!(app.mode, Mode::Table);
        assert_eq!(
            app.tables().table("notes").unwrap().value(0, "body"),
            Some(&DataValue::String(r#"{"a":1,"b":23}"#.into()))
        );
        assert_eq!(app.undo_manager().undo_len(), 1);
    }

    #[test]
    fn test_raw_sql_mutation_and_query() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);

        app.execute_sql("UPDATE users SET age = age + 1").unwrap();
        assert_eq!(
            app.tables().table("users").unwrap().value(0, "age"),
            Some(&DataValue::Integer(31))
        );
        assert_eq!(app.undo_manager().undo_len(), 1);

        app.execute_sql("SELECT name FROM users WHERE age > 20").unwrap();
        assert_eq!(app.current_table_name(), Some(QUERY_RESULTS_TABLE));
        assert_eq!(app.query_result().unwrap().row_count(), 2);
        assert!(matches!(app.undo(), Err(AppError::MalformedEdit(_))));
        assert!(app.apply_cell_edit("users", 0, "name", "x").is_err());

        app.run_command(":d").unwrap();
        assert!(!app.showing_results());
        app.undo().unwrap();
        assert_eq!(
            app.tables().table("users").unwrap().value(0, "age"),
            Some(&DataValue::Integer(30))
        );
    }

    #[test]
    fn test_failed_sql_restores_state() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        let live_before = app.undo_manager().live_path().to_path_buf();

        let err = app.execute_sql("UPDATE missing SET x = 1").unwrap_err();
        assert!(matches!(err, AppError::QueryExecution(_)));
        assert_eq!(app.undo_manager().undo_len(), 0);
        assert_eq!(app.undo_manager().live_path(), live_before);
        assert_eq!(app.tables().table("users").unwrap().row_count(), 3);
    }

    #[test]
    fn test_commented_and_cte_mutations_are_snapshotted() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);

        app.execute_sql("-- cleanup\nDELETE FROM users").unwrap();
        assert!(!app.showing_results());
        assert_eq!(app.undo_manager().undo_len(), 1);
        assert_eq!(app.tables().table("users").unwrap().row_count(), 0);

        app.undo().unwrap();
        assert_eq!(app.tables().table("users").unwrap().row_count(), 3);

        app.execute_sql("WITH minors AS (SELECT id FROM users WHERE age < 18) DELETE FROM users WHERE id IN (SELECT id FROM minors)")
            .unwrap();
        assert_eq!(app.undo_manager().undo_len(), 1);
        assert_eq!(app.tables().table("users").unwrap().row_count(), 2);

        app.execute_sql("/* totals */ SELECT count(*) FROM users").unwrap();
        assert!(app.showing_results());
        assert_eq!(app.undo_manager().undo_len(), 1);
    }

    #[test]
    fn test_snippets_stow_and_run() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.run_command(":sql").unwrap();
        for c in "SELECT id FROM users".chars() {
            app.format_buffer_mut().unwrap().insert_char(c);
        }
        app.submit_format_command(":stow ids").unwrap();
        app.submit_format_command(":q").unwrap();
        assert_eq!(app.snippets().len(), 1);

        app.run_command(":run ids").unwrap();
        assert_eq!(app.query_result().unwrap().row_count(), 3);
    }

    #[test]
    fn test_unknown_command_returns_to_table() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.begin_inline_edit(true).unwrap();
        let err = app.submit_edit_line(":bogus").unwrap_err();
        app.report_error(err);
        assert_eq!(app.mode, Mode::Table);
        assert!(app.status().unwrap().contains(":bogus"));
    }

    #[test]
    fn test_table_switching_wraps() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.previous_table();
        assert_eq!(app.current_table_name(), Some("notes"));
        app.next_table();
        assert_eq!(app.current_table_name(), Some("users"));
    }

    #[test]
    fn test_frame_snapshot_window() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.set_terminal_size(40, 10);
        let snapshot = app.frame_snapshot(None);
        assert_eq!(snapshot.headers, vec!["id", "name"]);
        assert_eq!(snapshot.rows.len(), 3);
        assert_eq!(snapshot.highlight, Some((0, 0)));
        assert_eq!(snapshot.footer.undo_depth, 0);

        app.toggle_expanded_column();
        let snapshot = app.frame_snapshot(None);
        assert_eq!(snapshot.headers, vec!["id"]);
    }

    #[test]
    fn test_exports() {
        let dir = TempDir::new().unwrap();
        let mut app = open_app(&dir);
        app.run_command(":export").unwrap();
        app.export_view().unwrap();
        let exported: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("users_"))
            .collect();
        assert_eq!(exported.len(), 2);
    }
}
