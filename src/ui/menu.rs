//! Command menu
//!
//! Items are laid out column-major: down the first column, then the next.
//! Titles are rendered once into an off-screen pad and copied into the menu
//! window on every redraw.

use unicode_width::UnicodeWidthStr;

use super::layout::MenuGrid;
use super::window::{Attr, Window};

/// A single item in the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Display label.
    pub title: String,
    /// Command line sent to the shell. Empty for items that only act locally.
    pub command: String,
    /// Shortcut key, matched case-insensitively or as its control form.
    pub shortcut: Option<char>,
}

impl MenuItem {
    pub fn new(title: impl Into<String>, command: impl Into<String>, shortcut: Option<char>) -> Self {
        Self {
            title: title.into(),
            command: command.into(),
            shortcut,
        }
    }
}

/// Menu state
pub struct Menu {
    items: Vec<MenuItem>,
    selected: usize,
    /// Widest title in display columns
    item_width: u16,
    /// Titles pre-rendered one per row
    pad: Window,
}

impl Menu {
    pub fn new(items: Vec<MenuItem>) -> Self {
        let item_width = items
            .iter()
            .map(|item| item.title.width())
            .max()
            .unwrap_or(0)
            .clamp(1, u16::MAX as usize) as u16;

        let mut pad = Window::new(items.len() as u16, item_width, 0, 0);
        for (i, item) in items.iter().enumerate() {
            pad.put_str_at(i as u16, 0, &item.title);
        }

        Self {
            items,
            selected: 0,
            item_width,
            pad,
        }
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_width(&self) -> u16 {
        self.item_width
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&MenuItem> {
        self.items.get(self.selected)
    }

    /// Select `index` if it names an item.
    pub fn select(&mut self, index: usize) {
        if index < self.items.len() {
            self.selected = index;
        }
    }

    /// Move selection up
    pub fn up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    /// Move selection down
    pub fn down(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    /// Move one column left, staying put in the first column.
    pub fn left(&mut self, rows_per_column: u16) {
        let step = usize::from(rows_per_column);
        if step > 0 && self.selected >= step {
            self.selected -= step;
        }
    }

    /// Move one column right, staying put when the target would be past the
    /// last item.
    pub fn right(&mut self, rows_per_column: u16) {
        let step = usize::from(rows_per_column);
        if step > 0 && self.selected + step < self.items.len() {
            self.selected += step;
        }
    }

    /// Draw the grid into `window`, the selected title in reverse video.
    pub fn draw(&self, window: &mut Window, grid: &MenuGrid) {
        window.erase();
        let width = self.item_width;
        for i in 0..self.items.len() {
            let (row, col) = grid.position(i);
            window.copy_region(&self.pad, i as u16, 0, row, col, row, col + width - 1);
        }

        if let Some(item) = self.selected_item() {
            let (row, col) = grid.position(self.selected);
            window.set_attr(Attr::Reverse);
            window.put_str_at(row, col, &item.title);
            window.set_attr(Attr::Normal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::layout::Layout;

    fn menu(n: usize) -> Menu {
        Menu::new((0..n).map(|i| MenuItem::new(format!("item{:02}", i), format!("cmd{}", i), None)).collect())
    }

    #[test]
    fn test_item_width_uses_display_columns() {
        let menu = Menu::new(vec![
            MenuItem::new("L ファイル一覧", "ls", Some('L')),
            MenuItem::new("Q quit", "", Some('Q')),
        ]);
        // Two ASCII columns plus six double-width characters.
        assert_eq!(menu.item_width(), 14);

        let menu = Menu::new(vec![MenuItem::new("漢字", "", None), MenuItem::new("abc", "", None)]);
        assert_eq!(menu.item_width(), 4);
    }

    #[test]
    fn test_up_down_clamp() {
        let mut menu = menu(3);
        menu.up();
        assert_eq!(menu.selected(), 0);
        menu.down();
        menu.down();
        menu.down();
        assert_eq!(menu.selected(), 2);
    }

    #[test]
    fn test_left_right_move_by_column() {
        let mut menu = menu(12);
        menu.right(6);
        assert_eq!(menu.selected(), 6);
        menu.right(6);
        assert_eq!(menu.selected(), 6);
        menu.down();
        menu.left(6);
        assert_eq!(menu.selected(), 1);
        menu.left(6);
        assert_eq!(menu.selected(), 1);
    }

    #[test]
    fn test_right_stops_before_end() {
        let mut menu = menu(5);
        menu.select(3);
        menu.right(2);
        assert_eq!(menu.selected(), 3);
        menu.select(2);
        menu.right(2);
        assert_eq!(menu.selected(), 4);
    }

    #[test]
    fn test_draw_column_major_with_selection() {
        let mut menu = menu(5);
        let grid = MenuGrid::compute(14, menu.len(), menu.item_width());
        assert_eq!((grid.columns, grid.rows_per_column), (2, 3));

        menu.select(4);
        let mut window = Window::new(3, grid.width(), 0, 0);
        menu.draw(&mut window, &grid);
        assert_eq!(window.row_text(0), "item00item03");
        assert_eq!(window.row_text(1), "item01item04");
        assert_eq!(window.row_text(2), "item02");
        assert_eq!(window.cell(1, 6).unwrap().attr, Attr::Reverse);
        assert_eq!(window.cell(0, 6).unwrap().attr, Attr::Normal);
    }

    #[test]
    fn test_draw_on_zero_width_screen() {
        let mut menu = Menu::new(crate::config::default_menu());
        menu.select(5);
        let layout = Layout::compute(0, 24, menu.len(), menu.item_width());
        let mut window = Window::new(layout.menu.rows, layout.menu.cols, layout.menu.y, layout.menu.x);
        menu.draw(&mut window, &layout.grid);

        let mut empty = Window::new(layout.menu.rows, 0, 0, 0);
        menu.draw(&mut empty, &layout.grid);
        assert_eq!(empty.row_text(0), "");
    }
}
