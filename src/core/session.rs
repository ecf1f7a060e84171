//! Session management
//!
//! Owns the pty, the shared virtual screen and the output pump for the one
//! child shell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use super::pty::{PtySession, WindowSize};
use super::pump;
use super::term::VirtualScreen;

/// Session events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output was applied to the screen
    Output,
    /// The child rang the bell
    Bell,
    /// The child has gone away
    Exited,
}

/// A shell session
pub struct Session {
    pty: Option<PtySession>,
    screen: Arc<Mutex<VirtualScreen>>,
    /// Set by whichever side first sees the child go away
    exited: Arc<AtomicBool>,
    events: Receiver<SessionEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Session {
    /// Start `shell` with `args` on a new pty of `size`, exporting `term` as
    /// `TERM` to the child.
    pub fn start(shell: &str, args: &[String], term: &str, size: WindowSize) -> Result<Self> {
        let mut pty = PtySession::open(size).context("failed to allocate pty")?;

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(shell.to_string());
        argv.extend(args.iter().cloned());
        pty.spawn_child_with_env(&argv, &[("TERM", term)])
            .context("failed to start shell")?;

        let screen = Arc::new(Mutex::new(VirtualScreen::new(size.cols, size.rows)));
        let exited = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let reader = pty.reader().context("failed to clone pty reader")?;
        let pump = pump::spawn(reader, screen.clone(), exited.clone(), tx).context("failed to start output pump")?;

        info!("Session started: {} {:?} ({}x{})", shell, args, size.cols, size.rows);
        Ok(Self {
            pty: Some(pty),
            screen,
            exited,
            events: rx,
            pump: Some(pump),
        })
    }

    /// Write bytes to the child. A failed write marks the child as exited.
    pub fn write(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() || self.has_exited() {
            return false;
        }
        let Some(pty) = &self.pty else {
            return false;
        };
        match pty.write(bytes) {
            Ok(_) => true,
            Err(e) => {
                error!("PTY write failed: {}", e);
                self.exited.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    /// Resize the pty and the screen together under the screen lock, so the
    /// pump never applies output sized for the old window to the new grid.
    pub fn resize(&mut self, size: WindowSize) {
        let mut screen = self.screen.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pty) = &mut self.pty {
            if let Err(e) = pty.resize(size) {
                warn!("PTY resize failed: {}", e);
            }
        }
        screen.resize(size.cols, size.rows);
        info!("Session resized to {}x{}", size.cols, size.rows);
    }

    /// Next pending event, if any.
    pub fn try_event(&self) -> Option<SessionEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.exited.store(true, Ordering::SeqCst);
                None
            }
        }
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Lock the screen for painting or local edits.
    pub fn screen(&self) -> MutexGuard<'_, VirtualScreen> {
        self.screen.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hang up the child, reap it and wait for the pump. Returns the exit code.
    pub fn close(mut self) -> Option<i32> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<i32> {
        self.exited.store(true, Ordering::SeqCst);

        let code = match self.pty.take().map(PtySession::close) {
            Some(Ok(code)) => code,
            Some(Err(e)) => {
                warn!("PTY close failed: {}", e);
                None
            }
            None => None,
        };

        // The reader sees EIO once the child and all slave handles are gone.
        if let Some(handle) = self.pump.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                debug!("Output pump still blocked, detaching");
            }
        }
        info!("Session closed (exit code {:?})", code);
        code
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.pty.is_some() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(session: &Session, pred: impl Fn(&VirtualScreen) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            while session.try_event().is_some() {}
            if pred(&*session.screen()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn screen_contains(screen: &VirtualScreen, needle: &str) -> bool {
        (0..screen.rows()).any(|r| screen.row_text(r).contains(needle))
    }

    #[test]
    fn test_output_reaches_screen() {
        let args = vec!["-c".to_string(), "echo hello-menush".to_string()];
        let session = Session::start("/bin/sh", &args, "xterm", WindowSize::new(40, 5)).unwrap();
        assert!(wait_for(&session, |s| screen_contains(s, "hello-menush")));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.has_exited() && Instant::now() < deadline {
            while session.try_event().is_some() {}
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(session.has_exited());
        assert_eq!(session.close(), Some(0));
    }

    #[test]
    fn test_write_echoes_through_shell() {
        let session = Session::start("/bin/cat", &[], "xterm", WindowSize::new(40, 5)).unwrap();
        assert!(session.write(b"ping\n"));
        assert!(wait_for(&session, |s| screen_contains(s, "ping")));
        assert!(!session.write(b""));
        session.close();
    }

    #[test]
    fn test_child_sees_term() {
        let args = vec!["-c".to_string(), "echo TERM=$TERM".to_string()];
        let session = Session::start("/bin/sh", &args, "vt100", WindowSize::new(40, 5)).unwrap();
        assert!(wait_for(&session, |s| screen_contains(s, "TERM=vt100")));
        session.close();
    }

    #[test]
    fn test_resize_updates_screen() {
        let mut session = Session::start("/bin/cat", &[], "xterm", WindowSize::new(40, 5)).unwrap();
        session.resize(WindowSize::new(30, 8));
        {
            let screen = session.screen();
            assert_eq!((screen.cols(), screen.rows()), (30, 8));
        }
        session.close();
    }

    #[test]
    fn test_missing_shell_reports_exit() {
        let session = Session::start("/nonexistent/shell", &[], "xterm", WindowSize::new(40, 5)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.has_exited() && Instant::now() < deadline {
            while session.try_event().is_some() {}
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(session.has_exited());
        assert!(!session.write(b"ls\n"));
    }
}
