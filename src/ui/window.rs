//! Off-screen windows
//!
//! A [`Window`] is a rectangle of cells placed at a position on the physical
//! screen. Components draw into windows; the renderer composes them into a
//! frame and writes only the lines that changed.

use unicode_width::UnicodeWidthChar;

/// Display attribute of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Attr {
    #[default]
    Normal,
    Reverse,
}

/// A single window cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowCell {
    pub ch: String,
    /// Display width; 0 marks the right half of a wide character.
    pub width: u8,
    pub attr: Attr,
}

impl WindowCell {
    fn blank(attr: Attr) -> Self {
        Self {
            ch: " ".to_string(),
            width: 1,
            attr,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

/// A rectangular drawing surface.
#[derive(Clone, Debug)]
pub struct Window {
    y: u16,
    x: u16,
    rows: u16,
    cols: u16,
    cells: Vec<Vec<WindowCell>>,
    /// Attribute for subsequent writes
    attr: Attr,
    /// Attribute erased cells take
    background: Attr,
}

impl Window {
    /// Create a window of `rows` x `cols` with its top-left corner at (`y`, `x`).
    pub fn new(rows: u16, cols: u16, y: u16, x: u16) -> Self {
        Self {
            y,
            x,
            rows,
            cols,
            cells: vec![vec![WindowCell::blank(Attr::Normal); cols as usize]; rows as usize],
            attr: Attr::Normal,
            background: Attr::Normal,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Top-left corner as (y, x).
    pub fn origin(&self) -> (u16, u16) {
        (self.y, self.x)
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&WindowCell> {
        self.cells.get(row as usize).and_then(|r| r.get(col as usize))
    }

    /// Resize, keeping the overlapping content.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let blank = WindowCell::blank(self.background);
        self.cells.resize(rows as usize, vec![blank.clone(); cols as usize]);
        for row in &mut self.cells {
            row.resize(cols as usize, blank.clone());
        }
        self.rows = rows;
        self.cols = cols;
    }

    pub fn move_to(&mut self, y: u16, x: u16) {
        self.y = y;
        self.x = x;
    }

    /// Blank every cell with the background attribute.
    pub fn erase(&mut self) {
        let blank = WindowCell::blank(self.background);
        for row in &mut self.cells {
            row.fill(blank.clone());
        }
    }

    pub fn set_attr(&mut self, attr: Attr) {
        self.attr = attr;
    }

    /// Set the attribute erased cells take, then erase.
    pub fn set_background(&mut self, attr: Attr) {
        self.background = attr;
        self.erase();
    }

    /// Write one character, returning the columns it occupied (0 if clipped).
    pub fn put_char_at(&mut self, row: u16, col: u16, ch: char) -> u16 {
        let width = ch.width().unwrap_or(0) as u16;
        if row >= self.rows || col >= self.cols {
            return 0;
        }
        let (r, c) = (row as usize, col as usize);

        if width == 0 {
            // Combining mark: attach to the cell on the left
            if c > 0 && !self.cells[r][c - 1].is_continuation() {
                self.cells[r][c - 1].ch.push(ch);
            }
            return 0;
        }
        if col + width > self.cols {
            return 0;
        }

        self.split_wide(r, c);
        if width == 2 {
            self.split_wide(r, c + 2);
        }
        self.cells[r][c] = WindowCell {
            ch: ch.to_string(),
            width: width as u8,
            attr: self.attr,
        };
        if width == 2 {
            self.cells[r][c + 1] = WindowCell {
                ch: String::new(),
                width: 0,
                attr: self.attr,
            };
        }
        width
    }

    /// Write a string, clipping at the right edge. Returns columns used.
    pub fn put_str_at(&mut self, row: u16, col: u16, text: &str) -> u16 {
        let mut x = col;
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0) as u16;
            if width > 0 && x + width > self.cols {
                break;
            }
            x += self.put_char_at(row, x, ch);
        }
        x - col
    }

    /// Copy a rectangle from `src` into this window.
    ///
    /// The destination rectangle runs from (`dst_row`, `dst_col`) to
    /// (`dst_max_row`, `dst_max_col`) inclusive; the source rectangle starts
    /// at (`src_row`, `src_col`) and has the same size. Cells outside either
    /// window are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_region(
        &mut self,
        src: &Window,
        src_row: u16,
        src_col: u16,
        dst_row: u16,
        dst_col: u16,
        dst_max_row: u16,
        dst_max_col: u16,
    ) {
        if dst_max_row < dst_row || dst_max_col < dst_col || dst_col >= self.cols {
            return;
        }
        for dr in dst_row..=dst_max_row {
            let sr = src_row + (dr - dst_row);
            if dr >= self.rows || sr >= src.rows {
                break;
            }
            for dc in dst_col..=dst_max_col {
                let sc = src_col + (dc - dst_col);
                if dc >= self.cols || sc >= src.cols {
                    break;
                }
                let cell = src.cells[sr as usize][sc as usize].clone();
                // A wide character must not hang over the right edge of the copy.
                if cell.width == 2 && (dc == dst_max_col || dc + 1 >= self.cols) {
                    self.cells[dr as usize][dc as usize] = WindowCell::blank(cell.attr);
                } else {
                    self.cells[dr as usize][dc as usize] = cell;
                }
            }
            // Orphaned right half at the left edge of the copy
            let first = &mut self.cells[dr as usize][dst_col as usize];
            if first.is_continuation() {
                *first = WindowCell::blank(first.attr);
            }
        }
    }

    /// Row as text, trailing blanks removed.
    pub fn row_text(&self, row: u16) -> String {
        let Some(cells) = self.cells.get(row as usize) else {
            return String::new();
        };
        let text: String = cells.iter().filter(|c| !c.is_continuation()).map(|c| c.ch.as_str()).collect();
        text.trim_end().to_string()
    }

    /// Blank both halves of a wide character that straddles `col`.
    fn split_wide(&mut self, r: usize, c: usize) {
        let row = &mut self.cells[r];
        if c > 0 && c < row.len() && row[c].is_continuation() {
            row[c - 1] = WindowCell::blank(row[c - 1].attr);
            row[c] = WindowCell::blank(row[c].attr);
        }
    }
}
