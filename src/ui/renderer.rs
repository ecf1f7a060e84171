//! Terminal renderer using crossterm
//!
//! Composes windows into a frame and writes the lines that changed since the
//! previous frame.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::debug;

use super::window::{Attr, Window, WindowCell};

/// The physical display the UI draws on.
pub trait Display {
    /// Size as (cols, rows).
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Show `windows` on screen, later windows drawn over earlier ones.
    fn refresh(&mut self, windows: &[&Window]) -> io::Result<()>;

    /// Forget what is on screen so the next refresh redraws everything.
    fn invalidate(&mut self);

    fn bell(&mut self) -> io::Result<()>;
}

type Frame = Vec<Vec<WindowCell>>;

/// Lay `windows` out on a `cols` x `rows` frame. Cells falling off the frame
/// are clipped.
pub fn compose(cols: u16, rows: u16, windows: &[&Window]) -> Frame {
    let blank = WindowCell {
        ch: " ".to_string(),
        width: 1,
        attr: Attr::Normal,
    };
    let mut frame = vec![vec![blank.clone(); cols as usize]; rows as usize];

    for window in windows {
        let (y, x) = window.origin();
        for r in 0..window.rows() {
            let fy = y as usize + r as usize;
            if fy >= rows as usize {
                break;
            }
            for c in 0..window.cols() {
                let fx = x as usize + c as usize;
                if fx >= cols as usize {
                    break;
                }
                if let Some(cell) = window.cell(r, c) {
                    frame[fy][fx] = cell.clone();
                }
            }
            // A wide char cut by the frame edge would spill onto the next line.
            if let Some(last) = frame[fy].last_mut() {
                if last.width == 2 {
                    *last = WindowCell { ch: " ".to_string(), width: 1, attr: last.attr };
                }
            }
        }
    }
    frame
}

/// Write one frame line starting at column 0.
fn write_line<W: Write>(out: &mut W, row: u16, cells: &[WindowCell]) -> io::Result<()> {
    queue!(out, MoveTo(0, row), SetAttribute(Attribute::Reset))?;
    let mut attr = Attr::Normal;
    for cell in cells.iter().filter(|c| !c.is_continuation()) {
        if cell.attr != attr {
            attr = cell.attr;
            match attr {
                Attr::Reverse => queue!(out, SetAttribute(Attribute::Reverse))?,
                Attr::Normal => queue!(out, SetAttribute(Attribute::Reset))?,
            }
        }
        queue!(out, Print(&cell.ch))?;
    }
    queue!(out, SetAttribute(Attribute::Reset))
}

/// Write the lines of `frame` that differ from `prev`. Returns how many
/// lines were written.
pub fn render_frame<W: Write>(out: &mut W, frame: &Frame, prev: &Frame) -> io::Result<usize> {
    let mut written = 0;
    for (row, cells) in frame.iter().enumerate() {
        if prev.get(row) == Some(cells) {
            continue;
        }
        write_line(out, row as u16, cells)?;
        written += 1;
    }
    Ok(written)
}

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Previous frame for diff rendering
    prev: Frame,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            prev: Vec::new(),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.initialized = true;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        debug!("Terminal initialized");
        Ok(())
    }

    /// Restore the terminal. Safe to call more than once.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show);
        let _ = execute!(stdout, EnableLineWrap);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()?;
        debug!("Terminal restored");
        Ok(())
    }
}

impl Display for Renderer {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn refresh(&mut self, windows: &[&Window]) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        let frame = compose(cols, rows, windows);
        if self.prev.len() != frame.len() || self.prev.first().map(Vec::len) != frame.first().map(Vec::len) {
            self.prev.clear();
        }

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());
        render_frame(&mut stdout, &frame, &self.prev)?;
        stdout.flush()?;

        self.prev = frame;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.prev.clear();
    }

    fn bell(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// In-memory display for tests.
#[cfg(test)]
pub struct MemoryDisplay {
    pub cols: u16,
    pub rows: u16,
    pub frame: Frame,
    pub refreshes: usize,
    pub bells: usize,
}

#[cfg(test)]
impl MemoryDisplay {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            frame: compose(cols, rows, &[]),
            refreshes: 0,
            bells: 0,
        }
    }

    pub fn line(&self, row: u16) -> String {
        let text: String = self.frame[row as usize]
            .iter()
            .filter(|c| !c.is_continuation())
            .map(|c| c.ch.as_str())
            .collect();
        text.trim_end().to_string()
    }
}

#[cfg(test)]
impl Display for MemoryDisplay {
    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((self.cols, self.rows))
    }

    fn refresh(&mut self, windows: &[&Window]) -> io::Result<()> {
        self.frame = compose(self.cols, self.rows, windows);
        self.refreshes += 1;
        Ok(())
    }

    fn invalidate(&mut self) {}

    fn bell(&mut self) -> io::Result<()> {
        self.bells += 1;
        Ok(())
    }
}
