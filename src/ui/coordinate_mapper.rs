/// CoordinateMapper - screen position to logical cell
///
/// The cursor is a screen position (pointer or keyboard driven). Mapping it
/// to a cell goes through the same column window the body is rendered with,
/// so the highlighted cell and the edited cell are always the same one.
///
/// Layout:
///   header_height rows of headers
///   body rows       -> row = pointer_y - header_height + y_offset
///   footer_height rows of status
use crate::data::data_view::ColumnWindow;
use tracing::debug;

/// Terminal size and the fixed parts of the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewGeometry {
    pub width: usize,
    pub height: usize,
    pub header_height: usize,
    pub footer_height: usize,
    pub min_column_width: usize,
}

impl ViewGeometry {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            header_height: 3,
            footer_height: 3,
            min_column_width: 20,
        }
    }

    /// Rows available for table data
    pub fn body_height(&self) -> usize {
        self.height
            .saturating_sub(self.header_height + self.footer_height)
            .max(1)
    }

    pub fn max_visible_columns(&self) -> usize {
        (self.width / self.min_column_width.max(1)).max(1)
    }

    /// Number of columns drawn for a table with `header_count` columns
    pub fn visible_columns(&self, header_count: usize, expanded: bool) -> usize {
        if expanded || header_count == 0 {
            return 1;
        }
        header_count.min(self.max_visible_columns())
    }

    pub fn cell_width(&self, header_count: usize, expanded: bool) -> usize {
        self.width / self.visible_columns(header_count, expanded) + 1
    }
}

/// Scroll offsets plus the cursor position on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub y_offset: usize,
    pub x_offset: usize,
    pub pointer_x: usize,
    pub pointer_y: usize,
    /// Set while a modal editor has focus
    pre_edit: Option<PreEditCapture>,
}

/// Scroll and cursor position at the moment a modal editor took focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PreEditCapture {
    y_offset: usize,
    x_offset: usize,
    pointer_x: usize,
    pointer_y: usize,
}

/// Result of mapping a screen position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPosition {
    Cell { row: usize, col: usize },
    OutOfRange,
}

impl CellPosition {
    pub fn cell(self) -> Option<(usize, usize)> {
        match self {
            CellPosition::Cell { row, col } => Some((row, col)),
            CellPosition::OutOfRange => None,
        }
    }
}

impl ScrollState {
    pub fn new(header_height: usize) -> Self {
        Self {
            pointer_y: header_height,
            ..Self::default()
        }
    }

    /// Freeze the current position for the duration of a modal edit
    pub fn capture_pre_edit(&mut self) {
        self.pre_edit = Some(PreEditCapture {
            y_offset: self.y_offset,
            x_offset: self.x_offset,
            pointer_x: self.pointer_x,
            pointer_y: self.pointer_y,
        });
    }

    /// Leave modal editing and restore the scroll position it started from
    pub fn release_pre_edit(&mut self) {
        if let Some(capture) = self.pre_edit.take() {
            self.y_offset = capture.y_offset;
            self.x_offset = capture.x_offset;
            self.pointer_x = capture.pointer_x;
            self.pointer_y = capture.pointer_y;
        }
    }

    pub fn is_modal(&self) -> bool {
        self.pre_edit.is_some()
    }

    /// First table row drawn; frozen while a modal editor has focus
    pub fn top_row(&self) -> usize {
        self.effective().y_offset
    }

    /// Column window for the current horizontal offset
    pub fn column_window(
        &self,
        geometry: &ViewGeometry,
        header_count: usize,
        expanded: Option<usize>,
    ) -> ColumnWindow {
        match expanded {
            Some(col) => ColumnWindow::single(col),
            None => ColumnWindow::new(
                self.effective().x_offset,
                geometry.visible_columns(header_count, false),
            ),
        }
    }

    /// Logical cell under the cursor, or `OutOfRange` when it is not over a
    /// populated cell of a table with `total_rows` rows and `header_count`
    /// columns
    pub fn map(
        &self,
        geometry: &ViewGeometry,
        total_rows: usize,
        header_count: usize,
        expanded: Option<usize>,
    ) -> CellPosition {
        let pos = self.effective();

        let body_row = pos.pointer_y.saturating_sub(geometry.header_height);
        if body_row >= geometry.body_height() {
            return CellPosition::OutOfRange;
        }
        let row = body_row + pos.y_offset;

        let col = match expanded {
            Some(col) => col,
            None => {
                let cell_width = geometry.cell_width(header_count, false);
                let window = self.column_window(geometry, header_count, None);
                pos.pointer_x / cell_width + window.range(header_count).start
            }
        };

        if row >= total_rows || col >= header_count {
            return CellPosition::OutOfRange;
        }
        CellPosition::Cell { row, col }
    }

    fn effective(&self) -> PreEditCapture {
        self.pre_edit.unwrap_or(PreEditCapture {
            y_offset: self.y_offset,
            x_offset: self.x_offset,
            pointer_x: self.pointer_x,
            pointer_y: self.pointer_y,
        })
    }

    pub fn scroll_down(&mut self, total_rows: usize) {
        if self.y_offset + 1 < total_rows {
            self.y_offset += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.y_offset = self.y_offset.saturating_sub(1);
    }

    pub fn page_down(&mut self, geometry: &ViewGeometry, total_rows: usize) {
        let last = total_rows.saturating_sub(1);
        self.y_offset = (self.y_offset + geometry.body_height()).min(last);
    }

    pub fn page_up(&mut self, geometry: &ViewGeometry) {
        self.y_offset = self.y_offset.saturating_sub(geometry.body_height());
    }

    pub fn scroll_right(&mut self, geometry: &ViewGeometry, header_count: usize) {
        let max_offset = header_count.saturating_sub(geometry.visible_columns(header_count, false));
        if self.x_offset < max_offset {
            self.x_offset += 1;
        }
    }

    pub fn scroll_left(&mut self) {
        self.x_offset = self.x_offset.saturating_sub(1);
    }

    /// Move the cursor one row down, scrolling when it would leave the body
    pub fn cursor_down(&mut self, geometry: &ViewGeometry, total_rows: usize) {
        let body_row = self.pointer_y.saturating_sub(geometry.header_height);
        if body_row + self.y_offset + 1 >= total_rows {
            return;
        }
        if body_row + 1 >= geometry.body_height() {
            self.y_offset += 1;
        } else {
            self.pointer_y = geometry.header_height + body_row + 1;
        }
    }

    pub fn cursor_up(&mut self, geometry: &ViewGeometry) {
        let body_row = self.pointer_y.saturating_sub(geometry.header_height);
        if body_row == 0 {
            self.scroll_up();
        } else {
            self.pointer_y = geometry.header_height + body_row - 1;
        }
    }

    /// Move the cursor one cell right, scrolling the column window at the edge
    pub fn cursor_right(&mut self, geometry: &ViewGeometry, header_count: usize) {
        let cell_width = geometry.cell_width(header_count, false);
        let visible = geometry.visible_columns(header_count, false);
        let screen_col = self.pointer_x / cell_width;
        if screen_col + 1 < visible {
            self.pointer_x = (screen_col + 1) * cell_width;
        } else {
            self.scroll_right(geometry, header_count);
        }
    }

    pub fn cursor_left(&mut self, geometry: &ViewGeometry, header_count: usize) {
        let cell_width = geometry.cell_width(header_count, false);
        let screen_col = self.pointer_x / cell_width;
        if screen_col > 0 {
            self.pointer_x = (screen_col - 1) * cell_width;
        } else {
            self.scroll_left();
        }
    }

    /// Pointer moved to (x, y); ignored while a modal editor has focus
    pub fn set_pointer(&mut self, x: usize, y: usize) {
        if self.is_modal() {
            debug!(target: "navigation", "Ignoring pointer move during modal edit");
            return;
        }
        self.pointer_x = x;
        self.pointer_y = y;
    }

    /// Back to the top-left, used when switching tables
    pub fn reset(&mut self, geometry: &ViewGeometry) {
        *self = Self::new(geometry.header_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> ViewGeometry {
        // 4 columns of 20 fit, body is 24 - 6 = 18 rows
        ViewGeometry::new(80, 24)
    }

    #[test]
    fn test_cell_width_and_visible_columns() {
        let g = geometry();
        assert_eq!(g.visible_columns(2, false), 2);
        assert_eq!(g.visible_columns(9, false), 4);
        assert_eq!(g.visible_columns(9, true), 1);
        assert_eq!(g.cell_width(9, false), 21);
        assert_eq!(g.cell_width(2, false), 41);
        assert_eq!(g.body_height(), 18);
    }

    #[test]
    fn test_pointer_maps_with_offsets() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        scroll.set_pointer(45, 5);
        scroll.y_offset = 10;
        scroll.x_offset = 2;

        // row = (5 - 3) + 10, col = 45 / 21 + 2
        assert_eq!(scroll.map(&g, 100, 9, None), CellPosition::Cell { row: 12, col: 4 });
    }

    #[test]
    fn test_pointer_in_header_clamps_to_first_row() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        scroll.set_pointer(0, 1);
        assert_eq!(scroll.map(&g, 5, 2, None), CellPosition::Cell { row: 0, col: 0 });
    }

    #[test]
    fn test_out_of_range_instead_of_overflow() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        scroll.set_pointer(0, 10);
        assert_eq!(scroll.map(&g, 3, 2, None), CellPosition::OutOfRange);

        scroll.set_pointer(79, 3);
        assert_eq!(scroll.map(&g, 3, 1, None), CellPosition::Cell { row: 0, col: 0 });
        assert_eq!(scroll.map(&g, 3, 0, None), CellPosition::OutOfRange);

        scroll.set_pointer(0, 23);
        assert_eq!(scroll.map(&g, 100, 2, None), CellPosition::OutOfRange);
    }

    #[test]
    fn test_expanded_ignores_horizontal_offset() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        scroll.x_offset = 3;
        scroll.set_pointer(70, 4);
        assert_eq!(scroll.map(&g, 10, 9, Some(6)), CellPosition::Cell { row: 1, col: 6 });
        assert_eq!(scroll.column_window(&g, 9, Some(6)).range(9), 6..7);
    }

    #[test]
    fn test_clamped_window_is_used_for_mapping() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        // offset past the end is clamped to 9 - 4 = 5 when rendering
        scroll.x_offset = 8;
        scroll.set_pointer(0, 3);
        assert_eq!(scroll.map(&g, 1, 9, None), CellPosition::Cell { row: 0, col: 5 });
    }

    #[test]
    fn test_modal_edit_uses_captured_position() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        scroll.set_pointer(0, 4);
        scroll.y_offset = 2;
        scroll.capture_pre_edit();

        scroll.set_pointer(60, 20);
        scroll.y_offset = 40;
        assert_eq!(scroll.map(&g, 100, 3, None), CellPosition::Cell { row: 3, col: 0 });

        scroll.release_pre_edit();
        assert_eq!(scroll.y_offset, 2);
        assert!(!scroll.is_modal());
    }

    #[test]
    fn test_cursor_scrolls_at_body_edge() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        for _ in 0..17 {
            scroll.cursor_down(&g, 50);
        }
        assert_eq!((scroll.pointer_y, scroll.y_offset), (20, 0));
        scroll.cursor_down(&g, 50);
        assert_eq!((scroll.pointer_y, scroll.y_offset), (20, 1));
        assert_eq!(scroll.map(&g, 50, 1, None), CellPosition::Cell { row: 18, col: 0 });

        let mut short = ScrollState::new(g.header_height);
        short.cursor_down(&g, 2);
        short.cursor_down(&g, 2);
        assert_eq!(short.map(&g, 2, 1, None), CellPosition::Cell { row: 1, col: 0 });
    }

    #[test]
    fn test_cursor_right_scrolls_window() {
        let g = geometry();
        let mut scroll = ScrollState::new(g.header_height);
        for _ in 0..3 {
            scroll.cursor_right(&g, 6);
        }
        assert_eq!(scroll.map(&g, 1, 6, None), CellPosition::Cell { row: 0, col: 3 });
        scroll.cursor_right(&g, 6);
        scroll.cursor_right(&g, 6);
        scroll.cursor_right(&g, 6);
        assert_eq!(scroll.x_offset, 2);
        assert_eq!(scroll.map(&g, 1, 6, None), CellPosition::Cell { row: 0, col: 5 });
    }
}
