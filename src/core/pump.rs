//! Output pump
//!
//! A background thread that blocks on the pty master, feeds everything it
//! reads through the escape interpreter into the shared virtual screen and
//! tells the main loop to repaint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use super::pty::PtyReader;
use super::session::SessionEvent;
use super::term::{Interpreter, VirtualScreen};

const READ_BUFFER_SIZE: usize = 4096;

/// Start the pump on its own thread.
///
/// The thread ends when the master reports end-of-stream or an error; either
/// way it sets `exited` and sends [`SessionEvent::Exited`].
pub fn spawn(
    reader: PtyReader,
    screen: Arc<Mutex<VirtualScreen>>,
    exited: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("output-pump".to_string())
        .spawn(move || run(reader, screen, exited, events))
}

fn run(
    mut reader: PtyReader,
    screen: Arc<Mutex<VirtualScreen>>,
    exited: Arc<AtomicBool>,
    events: Sender<SessionEvent>,
) {
    let mut interpreter = Interpreter::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => {
                info!("PTY reached end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("PTY read failed: {}", e);
                break;
            }
        };

        let outcome = {
            let mut screen = screen.lock().unwrap_or_else(|e| e.into_inner());
            interpreter.feed(&buffer[..n], &mut screen)
        };

        if events.send(SessionEvent::Output).is_err() {
            debug!("Event receiver gone, stopping pump");
            break;
        }
        if outcome.bells > 0 && events.send(SessionEvent::Bell).is_err() {
            break;
        }
    }

    exited.store(true, Ordering::SeqCst);
    let _ = events.send(SessionEvent::Exited);
}
