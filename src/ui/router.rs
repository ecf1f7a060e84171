//! Input routing
//!
//! Two modes. In `Menu` mode keys navigate and trigger menu items; in
//! `Console` mode they go to the shell, apart from Escape (back to the menu)
//! and the refresh key.
//!
//! ```text
//!            toggle item / Ctrl+toggle
//!   ┌──────┐ ─────────────────────────▶ ┌─────────┐
//!   │ Menu │                            │ Console │
//!   └──────┘ ◀───────────────────────── └─────────┘
//!      │              Escape
//!      │ quit item
//!      ▼
//!    Quit
//! ```

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use super::keymapper::{ctrl, KeyMapper};
use super::menu::{Menu, MenuItem};

/// Start of line, then kill to end of line (readline).
const CLEAR_LINE: &[u8] = b"\x01\x0B";
const LINE_START: u8 = 0x01;

/// Routing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Menu,
    Console,
}

/// What the caller should do after a key was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing changed
    None,
    /// Menu state changed; repaint
    Redraw,
    /// Write these bytes to the shell
    Send(Vec<u8>),
    /// Blank the console view locally and repaint
    ClearConsole,
    /// Mode changed; repaint
    ModeChanged(Mode),
    Quit,
}

/// Designated shortcut keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcuts {
    pub quit: char,
    pub toggle: char,
    /// Console key, used with Ctrl
    pub refresh: char,
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            quit: 'Q',
            toggle: '[',
            refresh: 'L',
        }
    }
}

/// Bytes that replace the shell's input line with `command`, leaving the
/// cursor at the start of the line.
pub fn preview_bytes(command: &str) -> Vec<u8> {
    let mut bytes = CLEAR_LINE.to_vec();
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(LINE_START);
    bytes
}

/// Bytes that run `command`: `^A ^K`, the command, then a newline.
///
/// A bare `command + "\n"` would be typed in front of the preview already on
/// the shell's input line and run together with it, so the line is cleared
/// first.
/// Empty commands send nothing.
pub fn execute_bytes(command: &str) -> Vec<u8> {
    if command.is_empty() {
        return Vec::new();
    }
    let mut bytes = CLEAR_LINE.to_vec();
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(b'\n');
    bytes
}

/// Two-mode key dispatcher
pub struct InputRouter {
    mode: Mode,
    shortcuts: Shortcuts,
}

impl InputRouter {
    pub fn new(shortcuts: Shortcuts) -> Self {
        Self {
            mode: Mode::Menu,
            shortcuts,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Route one key press. `rows_per_column` is the current menu grid height.
    pub fn handle_key(&mut self, event: &KeyEvent, menu: &mut Menu, rows_per_column: u16) -> Action {
        match self.mode {
            Mode::Menu => self.handle_menu_key(event, menu, rows_per_column),
            Mode::Console => self.handle_console_key(event),
        }
    }

    /// Preview bytes for the selected item while in menu mode.
    pub fn preview(&self, menu: &Menu) -> Option<Vec<u8>> {
        if self.mode != Mode::Menu {
            return None;
        }
        menu.selected_item().map(|item| preview_bytes(&item.command))
    }

    fn handle_menu_key(&mut self, event: &KeyEvent, menu: &mut Menu, rows_per_column: u16) -> Action {
        match event.code {
            KeyCode::Up => menu.up(),
            KeyCode::Down => menu.down(),
            KeyCode::Left => menu.left(rows_per_column),
            KeyCode::Right => menu.right(rows_per_column),
            KeyCode::Enter => {
                return match menu.selected_item() {
                    Some(item) => self.activate(item),
                    None => Action::None,
                };
            }
            _ => return self.match_shortcut(event, menu),
        }
        Action::Redraw
    }

    /// First item whose shortcut matches wins: its control form activates
    /// it, the plain key (either case) only selects it.
    fn match_shortcut(&mut self, event: &KeyEvent, menu: &mut Menu) -> Action {
        let Some(key) = KeyMapper::key_byte(event) else {
            return Action::None;
        };

        for (index, item) in menu.items().iter().enumerate() {
            let Some(shortcut) = item.shortcut.filter(char::is_ascii) else {
                continue;
            };
            let shortcut = shortcut as u8;
            if ctrl(shortcut) == key {
                return self.activate(item);
            }
            if shortcut.eq_ignore_ascii_case(&key) {
                menu.select(index);
                return Action::Redraw;
            }
        }
        Action::None
    }

    fn activate(&mut self, item: &MenuItem) -> Action {
        match item.shortcut {
            Some(s) if s.eq_ignore_ascii_case(&self.shortcuts.quit) => Action::Quit,
            Some(s) if s.eq_ignore_ascii_case(&self.shortcuts.toggle) => self.set_mode(Mode::Console),
            _ => {
                debug!("Executing {:?}", item.command);
                let bytes = execute_bytes(&item.command);
                if bytes.is_empty() {
                    Action::None
                } else {
                    Action::Send(bytes)
                }
            }
        }
    }

    fn handle_console_key(&mut self, event: &KeyEvent) -> Action {
        if event.code == KeyCode::Esc {
            return self.set_mode(Mode::Menu);
        }
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char(ch) = event.code {
                if ch.eq_ignore_ascii_case(&self.shortcuts.refresh) {
                    return Action::ClearConsole;
                }
            }
        }
        match KeyMapper::map(event) {
            Some(bytes) if !bytes.is_empty() => Action::Send(bytes),
            _ => Action::None,
        }
    }

    fn set_mode(&mut self, mode: Mode) -> Action {
        debug!("Mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        Action::ModeChanged(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl_key(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn test_menu() -> Menu {
        Menu::new(vec![
            MenuItem::new("T top", "", Some('T')),
            MenuItem::new("L list", "ls", Some('L')),
            MenuItem::new("  long list", "ls -l", None),
            MenuItem::new("[ switch", "", Some('[')),
            MenuItem::new("Q quit", "", Some('Q')),
        ])
    }

    #[test]
    fn test_wire_formats() {
        assert_eq!(preview_bytes("ls -l"), b"\x01\x0Bls -l\x01".to_vec());
        assert_eq!(execute_bytes("ls -l"), b"\x01\x0Bls -l\n".to_vec());
        assert!(execute_bytes("").is_empty());
    }

    #[test]
    fn test_arrows_move_selection() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        assert_eq!(router.handle_key(&key(KeyCode::Down), &mut menu, 3), Action::Redraw);
        assert_eq!(menu.selected(), 1);
        router.handle_key(&key(KeyCode::Right), &mut menu, 3);
        assert_eq!(menu.selected(), 4);
        router.handle_key(&key(KeyCode::Left), &mut menu, 3);
        assert_eq!(menu.selected(), 1);
        router.handle_key(&key(KeyCode::Up), &mut menu, 3);
        router.handle_key(&key(KeyCode::Up), &mut menu, 3);
        assert_eq!(menu.selected(), 0);
    }

    #[test]
    fn test_enter_executes_selected() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        menu.select(2);
        assert_eq!(
            router.handle_key(&key(KeyCode::Enter), &mut menu, 3),
            Action::Send(b"\x01\x0Bls -l\n".to_vec())
        );
        menu.select(0);
        assert_eq!(router.handle_key(&key(KeyCode::Enter), &mut menu, 3), Action::None);
    }

    #[test]
    fn test_enter_on_quit_and_toggle() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        menu.select(4);
        assert_eq!(router.handle_key(&key(KeyCode::Enter), &mut menu, 3), Action::Quit);
        menu.select(3);
        assert_eq!(
            router.handle_key(&key(KeyCode::Enter), &mut menu, 3),
            Action::ModeChanged(Mode::Console)
        );
        assert_eq!(router.mode(), Mode::Console);
    }

    #[test]
    fn test_plain_shortcut_selects_only() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        assert_eq!(router.handle_key(&key(KeyCode::Char('l')), &mut menu, 3), Action::Redraw);
        assert_eq!(menu.selected(), 1);
        assert_eq!(router.handle_key(&key(KeyCode::Char('q')), &mut menu, 3), Action::Redraw);
        assert_eq!(menu.selected(), 4);
        assert_eq!(router.mode(), Mode::Menu);
        assert_eq!(router.handle_key(&key(KeyCode::Char('z')), &mut menu, 3), Action::None);
    }

    #[test]
    fn test_control_shortcut_activates() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        assert_eq!(
            router.handle_key(&ctrl_key('l'), &mut menu, 3),
            Action::Send(b"\x01\x0Bls\n".to_vec())
        );
        assert_eq!(menu.selected(), 0);
        assert_eq!(router.handle_key(&ctrl_key('q'), &mut menu, 3), Action::Quit);
    }

    #[test]
    fn test_escape_toggles_both_ways() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        assert_eq!(
            router.handle_key(&key(KeyCode::Esc), &mut menu, 3),
            Action::ModeChanged(Mode::Console)
        );
        assert_eq!(router.preview(&menu), None);
        assert_eq!(
            router.handle_key(&key(KeyCode::Esc), &mut menu, 3),
            Action::ModeChanged(Mode::Menu)
        );
        assert_eq!(router.preview(&menu), Some(b"\x01\x0B\x01".to_vec()));
    }

    #[test]
    fn test_console_forwards_keys() {
        let mut router = InputRouter::new(Shortcuts::default());
        let mut menu = test_menu();
        router.handle_key(&key(KeyCode::Esc), &mut menu, 3);

        assert_eq!(router.handle_key(&key(KeyCode::Char('x')), &mut menu, 3), Action::Send(b"x".to_vec()));
        assert_eq!(router.handle_key(&key(KeyCode::Up), &mut menu, 3), Action::Send(vec![0x10]));
        assert_eq!(router.handle_key(&key(KeyCode::Backspace), &mut menu, 3), Action::Send(vec![0x08]));
        assert_eq!(router.handle_key(&ctrl_key('l'), &mut menu, 3), Action::ClearConsole);
        assert_eq!(router.handle_key(&ctrl_key('c'), &mut menu, 3), Action::Send(vec![0x03]));
        assert_eq!(menu.selected(), 0);
    }
}
