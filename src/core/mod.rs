//! Core terminal components.
//!
//! - **pty**: Unix pseudo-terminal wrapper (allocate, fork/exec, resize, hang up)
//! - **term**: virtual screen and escape sequence interpreter
//! - **pump**: background thread feeding pty output into the screen
//! - **session**: the child shell with its screen and pump
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── PtySession (master fd, child pid)
//! ├── Arc<Mutex<VirtualScreen>>
//! └── output pump thread
//!     ├── PtyReader
//!     └── Interpreter ──▶ VirtualScreen
//! ```

pub mod pty;
pub mod pump;
pub mod session;
pub mod term;
