//! Windowed view over a table.
//!
//! A `ViewSlice` is what the renderer needs for one frame: the visible
//! headers and, per header, the rows `[top, top + height)` clipped to the
//! data. It borrows from the table store and is rebuilt on every scroll,
//! resize or table switch; it is never stored.

use crate::data::datatable::{DataTable, DataValue, TableState};
use crate::error::AppResult;

/// Horizontal window: which contiguous run of headers is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWindow {
    pub x_offset: usize,
    pub max_visible: usize,
}

impl ColumnWindow {
    pub fn new(x_offset: usize, max_visible: usize) -> Self {
        Self {
            x_offset,
            max_visible: max_visible.max(1),
        }
    }

    /// Window showing exactly one column
    pub fn single(column: usize) -> Self {
        Self::new(column, 1)
    }

    /// Header index range this window selects from `header_count` headers.
    /// The offset is clamped so the window never runs past the last header.
    pub fn range(&self, header_count: usize) -> std::ops::Range<usize> {
        let start = self.x_offset.min(header_count.saturating_sub(self.max_visible));
        start..(start + self.max_visible).min(header_count)
    }
}

/// One visible column with its windowed values
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlice<'a> {
    pub index: usize,
    pub name: &'a str,
    pub values: &'a [DataValue],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSlice<'a> {
    pub table: &'a str,
    pub top_offset: usize,
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<ColumnSlice<'a>>,
}

impl<'a> ViewSlice<'a> {
    /// Number of rows actually present in the slice
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn headers(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.columns.iter().map(|c| c.name)
    }
}

/// Slice of `table` in `state` for the given vertical and horizontal window
pub fn get_window<'a>(
    state: &'a TableState,
    table: &str,
    top_offset: usize,
    height: usize,
    window: ColumnWindow,
) -> AppResult<ViewSlice<'a>> {
    let table = state.table(table)?;
    Ok(window_of(table, top_offset, height, window))
}

/// Same as [`get_window`] for a table that is already at hand
pub fn window_of(
    table: &DataTable,
    top_offset: usize,
    height: usize,
    window: ColumnWindow,
) -> ViewSlice<'_> {
    let total_rows = table.row_count();
    let start = top_offset.min(total_rows);
    let end = start.saturating_add(height).min(total_rows);

    let columns = window
        .range(table.column_count())
        .filter_map(|index| {
            let name = table.column_name(index)?;
            let values = table.column(name)?;
            Some(ColumnSlice {
                index,
                name,
                values: &values[start..end],
            })
        })
        .collect();

    ViewSlice {
        table: &table.name,
        top_offset: start,
        total_rows,
        total_columns: table.column_count(),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn numbers(rows: usize, cols: usize) -> TableState {
        let columns = (0..cols).map(|c| format!("col_{}", c)).collect();
        let data = (0..rows)
            .map(|r| (0..cols).map(|c| DataValue::Integer((r * 100 + c) as i64)).collect())
            .collect();
        let mut state = TableState::new("/tmp/test.db");
        state.insert_table(DataTable::load("numbers", columns, data).unwrap());
        state
    }

    #[test]
    fn test_window_clipping_property() {
        let state = numbers(25, 3);
        for top in 0..30 {
            for height in 0..30 {
                let slice =
                    get_window(&state, "numbers", top, height, ColumnWindow::new(0, 10)).unwrap();
                let expected_min = height.min(25usize.saturating_sub(top));
                assert!(slice.row_count() <= height);
                assert!(slice.row_count() >= expected_min);
                for column in &slice.columns {
                    assert_eq!(column.values.len(), slice.row_count());
                }
            }
        }
    }

    #[test]
    fn test_short_table_returns_short_slice() {
        let state = numbers(3, 2);
        let slice = get_window(&state, "numbers", 0, 10, ColumnWindow::new(0, 5)).unwrap();
        assert_eq!(slice.row_count(), 3);
        assert_eq!(slice.columns[1].values[2], DataValue::Integer(201));
    }

    #[test]
    fn test_horizontal_window_selects_contiguous_headers() {
        let state = numbers(2, 8);
        let slice = get_window(&state, "numbers", 0, 2, ColumnWindow::new(2, 3)).unwrap();
        let headers: Vec<&str> = slice.headers().collect();
        assert_eq!(headers, vec!["col_2", "col_3", "col_4"]);

        // Offset past the end is clamped to the last full window
        let slice = get_window(&state, "numbers", 0, 2, ColumnWindow::new(7, 3)).unwrap();
        let headers: Vec<&str> = slice.headers().collect();
        assert_eq!(headers, vec!["col_5", "col_6", "col_7"]);
    }

    #[test]
    fn test_single_column_window() {
        let state = numbers(2, 4);
        let slice = get_window(&state, "numbers", 0, 2, ColumnWindow::single(2)).unwrap();
        assert_eq!(slice.columns.len(), 1);
        assert_eq!(slice.columns[0].name, "col_2");
    }

    #[test]
    fn test_unknown_table() {
        let state = numbers(1, 1);
        let result = get_window(&state, "missing", 0, 1, ColumnWindow::new(0, 1));
        assert!(matches!(result, Err(AppError::DataNotFound(_))));
    }
}
