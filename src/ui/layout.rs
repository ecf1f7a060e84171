//! Screen layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ console (shell output)       │  console_height rows
//! │                              │
//! ├──────────────────────────────┤
//! │ command strip                │  1 row
//! ├──────────────────────────────┤
//! │ item 0    item 3    item 6   │  menu_rows rows, column-major
//! │ item 1    item 4             │
//! │ item 2    item 5             │
//! └──────────────────────────────┘
//! ```

/// A screen rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub y: u16,
    pub x: u16,
    pub rows: u16,
    pub cols: u16,
}

/// Shape of the column-major menu grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuGrid {
    pub columns: u16,
    pub rows_per_column: u16,
    pub item_width: u16,
}

impl MenuGrid {
    /// Fit `item_count` items of `item_width` columns into `screen_width`.
    ///
    /// The column count is first the number of items that fit side by side,
    /// then reduced to the fewest columns that still hold every item at the
    /// resulting height.
    pub fn compute(screen_width: u16, item_count: usize, item_width: u16) -> Self {
        let item_width = item_width.max(1);
        if item_count == 0 {
            return Self {
                columns: 1,
                rows_per_column: 0,
                item_width,
            };
        }
        let n = item_count as u32;
        let columns = (u32::from(screen_width) / u32::from(item_width)).max(1);
        let rows_per_column = (n + columns - 1) / columns;
        let columns = (n + rows_per_column - 1) / rows_per_column;
        Self {
            columns: columns as u16,
            rows_per_column: rows_per_column as u16,
            item_width,
        }
    }

    /// Grid position (row, col) of item `index`.
    pub fn position(&self, index: usize) -> (u16, u16) {
        let rows = usize::from(self.rows_per_column.max(1));
        ((index % rows) as u16, (index / rows) as u16 * self.item_width)
    }

    pub fn width(&self) -> u16 {
        self.columns.saturating_mul(self.item_width)
    }
}

/// Placement of the three screen regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub console: Rect,
    pub command: Rect,
    pub menu: Rect,
    pub grid: MenuGrid,
}

impl Layout {
    const COMMAND_HEIGHT: u16 = 1;

    pub fn compute(screen_cols: u16, screen_rows: u16, item_count: usize, item_width: u16) -> Self {
        // Some ptys report a zero width before the first resize.
        let screen_cols = screen_cols.max(1);
        let grid = MenuGrid::compute(screen_cols, item_count, item_width);

        // The console keeps at least one row; the menu gives way first.
        let available = screen_rows.saturating_sub(Self::COMMAND_HEIGHT + 1);
        let menu_rows = grid.rows_per_column.min(available);
        let console_rows = screen_rows
            .saturating_sub(Self::COMMAND_HEIGHT + menu_rows)
            .max(1);

        Self {
            console: Rect {
                y: 0,
                x: 0,
                rows: console_rows,
                cols: screen_cols,
            },
            command: Rect {
                y: console_rows,
                x: 0,
                rows: Self::COMMAND_HEIGHT,
                cols: screen_cols,
            },
            menu: Rect {
                y: console_rows + Self::COMMAND_HEIGHT,
                x: 0,
                rows: menu_rows,
                cols: grid.width().min(screen_cols),
            },
            grid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_twelve_items() {
        let grid = MenuGrid::compute(45, 12, 20);
        assert_eq!(grid.columns, 2);
        assert_eq!(grid.rows_per_column, 6);
        assert_eq!(grid.position(7), (1, 20));
    }

    #[test]
    fn test_grid_shrinks_columns() {
        // Four columns fit; nine items at three rows need only three of them.
        let grid = MenuGrid::compute(80, 7, 20);
        assert_eq!(grid.rows_per_column, 2);
        assert_eq!(grid.columns, 4);
        let grid = MenuGrid::compute(80, 9, 20);
        assert_eq!(grid.rows_per_column, 3);
        assert_eq!(grid.columns, 3);
    }

    #[test]
    fn test_grid_narrow_screen_single_column() {
        let grid = MenuGrid::compute(10, 5, 20);
        assert_eq!(grid.columns, 1);
        assert_eq!(grid.rows_per_column, 5);
    }

    #[test]
    fn test_layout_regions_stack() {
        let layout = Layout::compute(80, 24, 13, 20);
        assert_eq!(layout.grid.rows_per_column, 4);
        assert_eq!(layout.console, Rect { y: 0, x: 0, rows: 19, cols: 80 });
        assert_eq!(layout.command, Rect { y: 19, x: 0, rows: 1, cols: 80 });
        assert_eq!(layout.menu, Rect { y: 20, x: 0, rows: 4, cols: 80 });
    }

    #[test]
    fn test_layout_zero_width_screen() {
        let layout = Layout::compute(0, 24, 13, 20);
        assert_eq!(layout.console.cols, 1);
        assert_eq!(layout.command.cols, 1);
        assert_eq!(layout.menu.cols, 1);
        assert_eq!(layout.grid.columns, 1);
        assert_eq!(layout.grid.rows_per_column, 13);
    }

    #[test]
    fn test_layout_keeps_console_row() {
        let layout = Layout::compute(20, 4, 12, 20);
        assert_eq!(layout.console.rows, 1);
        assert_eq!(layout.menu.rows, 2);
        assert_eq!(layout.command.y, 1);
    }
}
