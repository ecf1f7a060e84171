//! Main loop
//!
//! Polls the keyboard with a short tick, routes keys, drains events from the
//! output pump and repaints when anything changed.

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tracing::{debug, info};

use crate::config::Config;
use crate::core::pty::WindowSize;
use crate::core::session::{Session, SessionEvent};
use crate::ui::layout::{Layout, Rect};
use crate::ui::menu::Menu;
use crate::ui::renderer::Display;
use crate::ui::router::{Action, InputRouter, Mode};
use crate::ui::window::{Attr, Window};

/// How long to wait for a key before checking on the shell.
const TICK: Duration = Duration::from_millis(10);

fn window_for(rect: Rect) -> Window {
    Window::new(rect.rows, rect.cols, rect.y, rect.x)
}

fn place(window: &mut Window, rect: Rect) {
    window.resize(rect.rows, rect.cols);
    window.move_to(rect.y, rect.x);
}

/// The running application
pub struct App<D: Display> {
    display: D,
    session: Session,
    menu: Menu,
    router: InputRouter,
    layout: Layout,
    console_win: Window,
    command_win: Window,
    menu_win: Window,
    dirty: bool,
}

impl<D: Display> App<D> {
    /// Lay out the screen for `display` and start the shell on the console.
    pub fn new(display: D, config: &Config) -> Result<Self> {
        let (cols, rows) = display.size().context("failed to query terminal size")?;
        let menu = Menu::new(config.menu_items());
        let layout = Layout::compute(cols, rows, menu.len(), menu.item_width());
        info!("Terminal size: {}x{}, console {}x{}", cols, rows, layout.console.cols, layout.console.rows);

        let session = Session::start(
            &config.shell,
            &config.shell_args,
            &config.term,
            WindowSize::new(layout.console.cols, layout.console.rows),
        )?;

        let mut command_win = window_for(layout.command);
        command_win.set_background(Attr::Reverse);

        let mut app = Self {
            display,
            session,
            menu,
            router: InputRouter::new(config.shortcuts()),
            console_win: window_for(layout.console),
            command_win,
            menu_win: window_for(layout.menu),
            layout,
            dirty: true,
        };
        app.send_preview();
        Ok(app)
    }

    /// Run until the quit item is chosen or the shell exits.
    pub fn run(&mut self) -> Result<()> {
        self.redraw()?;
        loop {
            if event::poll(TICK)? {
                let ev = event::read()?;
                if !self.handle_event(ev) {
                    info!("Quit requested");
                    break;
                }
            }
            self.drain_session()?;
            if self.session.has_exited() {
                info!("Shell exited");
                break;
            }
            if self.dirty {
                self.redraw()?;
            }
        }
        Ok(())
    }

    /// Returns false when the application should quit.
    pub fn handle_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(&key),
            Event::Resize(cols, rows) => {
                self.resize(cols, rows);
                true
            }
            _ => true,
        }
    }

    /// Returns false when the application should quit.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let action = self
            .router
            .handle_key(key, &mut self.menu, self.layout.grid.rows_per_column);
        debug!("Key {:?} -> {:?}", key.code, action);

        match action {
            Action::Quit => return false,
            Action::Send(bytes) => {
                self.session.write(&bytes);
            }
            Action::ClearConsole => {
                self.session.screen().clear();
                self.display.invalidate();
                self.dirty = true;
            }
            Action::Redraw | Action::ModeChanged(_) => self.dirty = true,
            Action::None => {}
        }

        if self.router.mode() == Mode::Menu {
            self.send_preview();
        }
        true
    }

    /// Recompute the layout for a new terminal size and resize the shell.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.layout = Layout::compute(cols, rows, self.menu.len(), self.menu.item_width());
        place(&mut self.console_win, self.layout.console);
        place(&mut self.command_win, self.layout.command);
        place(&mut self.menu_win, self.layout.menu);
        self.session
            .resize(WindowSize::new(self.layout.console.cols, self.layout.console.rows));
        self.display.invalidate();
        self.dirty = true;
    }

    /// Apply pending pump events.
    pub fn drain_session(&mut self) -> io::Result<()> {
        while let Some(event) = self.session.try_event() {
            match event {
                SessionEvent::Output => self.dirty = true,
                SessionEvent::Bell => self.display.bell()?,
                SessionEvent::Exited => break,
            }
        }
        Ok(())
    }

    /// Paint every region and push the frame to the display.
    pub fn redraw(&mut self) -> io::Result<()> {
        self.session.screen().paint_into(&mut self.console_win);
        self.draw_command();
        self.menu.draw(&mut self.menu_win, &self.layout.grid);

        self.display
            .refresh(&[&self.console_win, &self.command_win, &self.menu_win])?;
        self.dirty = false;
        Ok(())
    }

    /// Hang up the shell. Returns its exit code.
    pub fn close(self) -> Option<i32> {
        self.session.close()
    }

    fn draw_command(&mut self) {
        let win = &mut self.command_win;
        win.erase();
        win.set_attr(Attr::Reverse);

        let tag = match self.router.mode() {
            Mode::Menu => " MENU ",
            Mode::Console => " CONSOLE ",
        };
        let tag_col = win.cols().saturating_sub(tag.len() as u16);
        if self.router.mode() == Mode::Menu {
            if let Some(item) = self.menu.selected_item() {
                win.put_str_at(0, 0, &item.command);
            }
        }
        win.put_str_at(0, tag_col, tag);
        win.set_attr(Attr::Normal);
    }

    fn send_preview(&mut self) {
        if let Some(bytes) = self.router.preview(&self.menu) {
            self.session.write(&bytes);
            self.dirty = true;
        }
    }

    #[cfg(test)]
    fn display(&self) -> &D {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::renderer::MemoryDisplay;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn config() -> Config {
        Config {
            shell: "/bin/cat".to_string(),
            shell_args: Vec::new(),
            ..Config::default()
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_initial_frame() {
        let mut app = App::new(MemoryDisplay::new(80, 24), &config()).unwrap();
        app.redraw().unwrap();

        // 13 items of width 19 in 4 columns of 4 rows.
        assert_eq!(app.layout.console.rows, 19);
        assert_eq!(app.display().refreshes, 1);
        let display = app.display();
        assert!(display.line(19).ends_with("MENU"));
        assert!(display.line(20).starts_with("T メニュー先頭"));
        assert_eq!(display.frame[20][0].attr, Attr::Reverse);
        app.close();
    }

    #[test]
    fn test_selection_updates_command_strip() {
        let mut app = App::new(MemoryDisplay::new(80, 24), &config()).unwrap();
        assert!(app.handle_key(&key(KeyCode::Down)));
        app.redraw().unwrap();
        assert!(app.display().line(19).starts_with("ls "));
        app.close();
    }

    #[test]
    fn test_escape_enters_console() {
        let mut app = App::new(MemoryDisplay::new(80, 24), &config()).unwrap();
        assert!(app.handle_key(&key(KeyCode::Esc)));
        app.redraw().unwrap();
        assert_eq!(app.display().line(19).trim(), "CONSOLE");
        app.close();
    }

    #[test]
    fn test_quit_item() {
        let mut app = App::new(MemoryDisplay::new(80, 24), &config()).unwrap();
        let quit = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);
        assert!(!app.handle_key(&quit));
        app.close();
    }

    #[test]
    fn test_resize_relayouts_and_resizes_screen() {
        let mut app = App::new(MemoryDisplay::new(80, 24), &config()).unwrap();
        app.resize(40, 30);
        assert_eq!(app.layout.grid.columns, 2);
        assert_eq!(app.layout.console.rows, 30 - 1 - 7);
        {
            let screen = app.session.screen();
            assert_eq!((screen.cols(), screen.rows()), (40, 22));
        }
        app.close();
    }

    #[test]
    fn test_bell_rings_display() {
        let mut app = App::new(MemoryDisplay::new(80, 24), &config()).unwrap();
        assert!(app.handle_key(&key(KeyCode::Esc)));
        assert!(app.handle_key(&KeyEvent::new(KeyCode::Char('g'), KeyModifiers::CONTROL)));
        assert!(app.handle_key(&key(KeyCode::Enter)));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while app.display().bells == 0 && std::time::Instant::now() < deadline {
            app.drain_session().unwrap();
            std::thread::sleep(TICK);
        }
        assert!(app.display().bells > 0);
        app.close();
    }
}
