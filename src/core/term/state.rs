//! Virtual screen state
//!
//! A bounded grid of cells that models what the child believes is its
//! terminal. Only the escape interpreter and explicit resizes mutate it.

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

use crate::ui::window::{Attr, Window};

/// Tab stops every 8 columns.
const TAB_WIDTH: u16 = 8;

/// Cursor position. `col` may equal the screen width while a wrap is pending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
}

/// Character grid with cursor and scroll region.
pub struct VirtualScreen {
    cols: u16,
    rows: u16,
    cursor: Cursor,
    grid: Vec<Row>,
    /// Scroll region (top, bottom), 0-indexed, inclusive
    scroll_region: (u16, u16),
    /// Attribute applied to newly written cells
    pen: CellFlags,
}

impl VirtualScreen {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            cursor: Cursor::default(),
            grid: (0..rows).map(|_| Row::new(cols)).collect(),
            scroll_region: (0, rows - 1),
            pen: CellFlags::empty(),
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[allow(dead_code)]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    #[allow(dead_code)]
    pub fn scroll_region(&self) -> (u16, u16) {
        self.scroll_region
    }

    #[allow(dead_code)]
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.grid.get(row as usize).and_then(|r| r.cells.get(col as usize))
    }

    /// Text of a row with trailing blanks removed.
    pub fn row_text(&self, row: u16) -> String {
        let Some(row) = self.grid.get(row as usize) else {
            return String::new();
        };
        let text: String = row.cells.iter().filter(|c| !c.is_continuation()).map(Cell::display_char).collect();
        text.trim_end().to_string()
    }

    /// Resize the grid, truncating or padding rows and columns.
    ///
    /// Scrolled-off content is not recovered. The cursor is clamped inside
    /// the new bounds and the scroll region resets to the full height.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);

        self.grid.truncate(rows as usize);
        while self.grid.len() < rows as usize {
            self.grid.push(Row::new(cols));
        }
        for row in &mut self.grid {
            row.resize(cols);
        }

        self.cols = cols;
        self.rows = rows;
        self.scroll_region = (0, rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.cursor.row = self.cursor.row.min(rows - 1);
    }

    /// Blank every cell and home the cursor. Used for the local refresh key.
    pub fn clear(&mut self) {
        for row in &mut self.grid {
            row.clear();
        }
        self.cursor = Cursor::default();
    }

    /// Move the cursor by a relative offset.
    ///
    /// Column overflow rolls into whole rows (div/mod arithmetic). Moving
    /// above the top clamps to row 0; moving past the bottom of the scroll
    /// region scrolls the region up by the excess.
    pub fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        let width = self.cols as i64;
        // Any explicit movement cancels a pending wrap.
        let col = self.cursor.col.min(self.cols - 1) as i64;
        let total = col + d_col as i64;

        let mut row = self.cursor.row as i64 + d_row as i64 + total.div_euclid(width);
        let col = total.rem_euclid(width);

        if row < 0 {
            row = 0;
        }

        let bottom = self.scroll_region.1 as i64;
        let last = self.rows as i64 - 1;
        if row > bottom && self.cursor.row as i64 <= bottom {
            let excess = row - bottom;
            self.scroll(excess.min(self.rows as i64) as i32);
            row = bottom;
        }

        self.cursor.row = row.min(last) as u16;
        self.cursor.col = col as u16;
    }

    /// Absolute cursor placement, 0-indexed and clamped.
    pub fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor.row = row.min(self.rows - 1);
        self.cursor.col = col.min(self.cols - 1);
    }

    /// Shift the scroll region up by `n` rows; negative `n` shifts it down.
    ///
    /// Rows leaving the region are discarded and blank rows fill the gap.
    pub fn scroll(&mut self, n: i32) {
        let (top, bottom) = (self.scroll_region.0 as usize, self.scroll_region.1 as usize);
        let height = bottom - top + 1;
        let count = (n.unsigned_abs() as usize).min(height);

        for _ in 0..count {
            if n > 0 {
                self.grid.remove(top);
                self.grid.insert(bottom, Row::new(self.cols));
            } else {
                self.grid.remove(bottom);
                self.grid.insert(top, Row::new(self.cols));
            }
        }
    }

    /// Erase in line.
    ///
    /// - 0: cursor to end of line
    /// - 1: start of line through the cursor, inclusive
    /// - 2: delete the cursor's line, shifting rows below up
    pub fn erase_in_line(&mut self, mode: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let cols = self.cols as usize;

        match mode {
            1 => {
                let end = col.min(cols - 1);
                for cell in &mut self.grid[row].cells[..=end] {
                    cell.clear();
                }
                self.repair_wide_edge(row, end + 1);
            }
            2 => {
                self.grid.remove(row);
                self.grid.push(Row::new(self.cols));
            }
            _ => {
                if col < cols {
                    self.repair_wide_edge(row, col);
                    for cell in &mut self.grid[row].cells[col..] {
                        cell.clear();
                    }
                }
            }
        }
    }

    /// Delete `n` characters at the cursor, shifting the rest of the line
    /// left. At least one character is removed. Never touches other rows.
    pub fn delete_chars(&mut self, n: u16) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        let cols = self.cols as usize;
        if col >= cols {
            return;
        }

        let n = (n.max(1) as usize).min(cols - col);
        self.repair_wide_edge(row, col);
        let cells = &mut self.grid[row].cells;
        cells.drain(col..col + n);
        cells.resize(cols, Cell::default());
        if cells[col].is_continuation() {
            cells[col].clear();
        }
    }

    /// Write a run of printable text at the cursor, advancing it.
    ///
    /// Each character is checked on its own: if writing it carried the cursor
    /// from one row onto the next and left it past column 0, the cursor is
    /// pulled back one column to undo the spurious wrap.
    pub fn write_run(&mut self, text: &str) {
        for ch in text.chars() {
            self.write_char(ch);
        }
    }

    fn write_char(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as u16;
        if width == 0 {
            self.append_to_previous(ch);
            return;
        }

        if self.cursor.col >= self.cols {
            self.wrap();
        }
        let start_row = self.cursor.row;

        if width > 1 && self.cursor.col + width > self.cols {
            if width > self.cols {
                return;
            }
            self.wrap();
        }

        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        self.repair_wide_edge(row, col);
        if width == 2 {
            self.repair_wide_edge(row, col + 2);
        }

        let pen = self.pen;
        let cells = &mut self.grid[row].cells;
        cells[col] = Cell {
            grapheme: ch.to_string(),
            width: width as u8,
            flags: pen,
        };
        if width == 2 {
            cells[col + 1] = Cell::continuation(pen);
        }
        self.cursor.col += width;

        // A wrapped character leaves the cursor one column short, as a curses
        // console does. After a wide character that is its right half, so the
        // next write blanks it.
        if self.cursor.row == start_row + 1 && self.cursor.col > 0 {
            self.cursor.col -= 1;
        }
    }

    /// Combining characters join the cell left of the cursor.
    fn append_to_previous(&mut self, ch: char) {
        let row = self.cursor.row as usize;
        let mut col = self.cursor.col.min(self.cols) as usize;
        while col > 0 {
            col -= 1;
            let cell = &mut self.grid[row].cells[col];
            if !cell.is_continuation() {
                if !cell.grapheme.is_empty() {
                    cell.grapheme.push(ch);
                }
                return;
            }
        }
    }

    /// Move to the start of the next row, scrolling at the region bottom.
    fn wrap(&mut self) {
        self.cursor.col = 0;
        self.index();
    }

    /// Blank the halves of a wide character split at column `col`.
    fn repair_wide_edge(&mut self, row: usize, col: usize) {
        let cells = &mut self.grid[row].cells;
        if col < cells.len() && col > 0 && cells[col].is_continuation() {
            cells[col - 1].clear();
            cells[col].clear();
        }
    }

    /// Carriage return
    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
    }

    /// Line feed: next row at column 0, scrolling at the region bottom.
    pub fn line_feed(&mut self) {
        self.cursor.col = 0;
        self.index();
    }

    fn index(&mut self) {
        if self.cursor.row == self.scroll_region.1 {
            self.scroll(1);
        } else if self.cursor.row < self.rows - 1 {
            self.cursor.row += 1;
        }
    }

    /// Backspace: one column left, stopping at column 0.
    pub fn backspace(&mut self) {
        let col = self.cursor.col.min(self.cols - 1);
        self.cursor.col = col.saturating_sub(1);
    }

    /// Horizontal tab to the next multiple of 8, clamped to the last column.
    pub fn horizontal_tab(&mut self) {
        let next = (self.cursor.col / TAB_WIDTH + 1) * TAB_WIDTH;
        self.cursor.col = next.min(self.cols - 1);
    }

    /// Set the scroll region from 1-indexed parameters (0 means default).
    /// Homes the cursor. Regions smaller than two rows are ignored.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = top.max(1) - 1;
        let bottom = if bottom == 0 { self.rows } else { bottom.min(self.rows) } - 1;
        if top < bottom {
            self.scroll_region = (top, bottom);
            self.cursor = Cursor::default();
        }
    }

    /// Erase in display: 0 below, 1 above, 2/3 everything. Cursor stays.
    pub fn erase_in_display(&mut self, mode: u16) {
        let row = self.cursor.row as usize;
        match mode {
            0 => {
                self.erase_in_line(0);
                for r in &mut self.grid[row + 1..] {
                    r.clear();
                }
            }
            1 => {
                for r in &mut self.grid[..row] {
                    r.clear();
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                for r in &mut self.grid {
                    r.clear();
                }
            }
            _ => {}
        }
    }

    pub fn set_reverse(&mut self, on: bool) {
        self.pen.set(CellFlags::REVERSE, on);
    }

    /// Paint the grid into `window`, drawing the cursor cell in reverse
    /// video. The caller must hold the screen lock for the whole call.
    pub fn paint_into(&self, window: &mut Window) {
        window.erase();
        let rows = self.rows.min(window.rows());
        let cols = self.cols.min(window.cols());

        for r in 0..rows {
            let row = &self.grid[r as usize];
            for c in 0..cols {
                let cell = &row.cells[c as usize];
                if cell.is_continuation() {
                    continue;
                }
                let attr = if cell.flags.contains(CellFlags::REVERSE) {
                    Attr::Reverse
                } else {
                    Attr::Normal
                };
                window.set_attr(attr);
                window.put_str_at(r, c, cell.display_char());
            }
        }

        let cursor_row = self.cursor.row;
        let cursor_col = self.cursor.col.min(self.cols - 1);
        if cursor_row < rows && cursor_col < cols {
            let cell = &self.grid[cursor_row as usize].cells[cursor_col as usize];
            let attr = if cell.flags.contains(CellFlags::REVERSE) {
                Attr::Normal
            } else {
                Attr::Reverse
            };
            window.set_attr(attr);
            if cell.is_continuation() {
                window.put_str_at(cursor_row, cursor_col, " ");
            } else {
                window.put_str_at(cursor_row, cursor_col, cell.display_char());
            }
        }
        window.set_attr(Attr::Normal);
    }
}

/// A single row
#[derive(Clone)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
        }
    }

    pub fn resize(&mut self, cols: u16) {
        self.cells.resize(cols as usize, Cell::default());
        if let Some(last) = self.cells.last_mut() {
            // A wide character cut in half by the new edge becomes blank.
            if last.width == 2 {
                last.clear();
            }
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }
}

/// A single cell
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub grapheme: String,
    /// Display width; 0 marks the right half of a wide character.
    pub width: u8,
    pub flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            grapheme: String::new(),
            width: 1,
            flags: CellFlags::empty(),
        }
    }
}

impl Cell {
    pub fn clear(&mut self) {
        self.grapheme.clear();
        self.width = 1;
        self.flags = CellFlags::empty();
    }

    pub fn continuation(flags: CellFlags) -> Self {
        Self {
            grapheme: String::new(),
            width: 0,
            flags,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Get the display character (space if empty)
    pub fn display_char(&self) -> &str {
        if self.grapheme.is_empty() {
            " "
        } else {
            &self.grapheme
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CellFlags: u8 {
        const REVERSE = 0b0000_0001;
    }
}
