//! Unix pseudo-terminal wrapper
//!
//! Allocates a master/slave pty pair, forks a child shell onto the slave side
//! and exposes blocking I/O on the master.
//!
//! # Lifecycle
//!
//! ```text
//! PtySession::open(size)        posix_openpt + grantpt + unlockpt, open slave
//!     │
//!     ▼
//! spawn_child(argv)             fork ── child: setsid, open slave, dup2 0/1/2,
//!     │                                        TIOCSWINSZ, setenv, execvp
//!     │                         parent: close slave
//!     ▼
//! read / write / resize         master only
//!     │
//!     ▼
//! close()                       close master, SIGHUP, wait, SIGKILL, reap
//! ```
//!
//! Dropping a session without calling [`PtySession::close`] performs the same
//! teardown, so the child is reaped on every exit path.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::libc;
use nix::pty::{grantpt, posix_openpt, ptsname, unlockpt};
use nix::sys::signal::{self, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Time the child gets to exit after SIGHUP before it is killed.
const HANGUP_GRACE: Duration = Duration::from_millis(100);
const HANGUP_POLL: Duration = Duration::from_millis(10);

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY master: {0}")]
    OpenMaster(#[source] nix::Error),

    #[error("Failed to grant PTY access: {0}")]
    Grant(#[source] nix::Error),

    #[error("Failed to unlock PTY: {0}")]
    Unlock(#[source] nix::Error),

    #[error("Failed to get slave name: {0}")]
    SlaveName(#[source] nix::Error),

    #[error("Failed to open slave PTY {path}: {source}")]
    OpenSlave {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("Invalid argument for exec: {0}")]
    InvalidArgument(String),

    #[error("A child process is already attached to this PTY")]
    AlreadySpawned,

    #[error("Failed to fork process: {0}")]
    Fork(#[source] nix::Error),

    #[error("Failed to set window size: {0}")]
    SetWindowSize(#[source] nix::Error),

    #[error("Failed to read from PTY: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to clone PTY handle: {0}")]
    Clone(#[source] io::Error),

    #[error("Failed to signal child: {0}")]
    Signal(#[source] nix::Error),

    #[error("Failed to wait for child: {0}")]
    Wait(#[source] nix::Error),

    #[error("PTY master is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    fn to_winsize(self) -> libc::winsize {
        libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// A pty master with at most one child attached to its slave side.
pub struct PtySession {
    master: Option<File>,
    /// Parent's handle to the slave, held only until the child is forked.
    slave: Option<OwnedFd>,
    slave_path: PathBuf,
    child: Option<Pid>,
    size: WindowSize,
}

impl PtySession {
    /// Allocate a pty pair sized to `size`.
    pub fn open(size: WindowSize) -> Result<Self> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::OpenMaster)?;
        grantpt(&master).map_err(PtyError::Grant)?;
        unlockpt(&master).map_err(PtyError::Unlock)?;

        // ptsname uses a static buffer; only the main thread opens ptys.
        let slave_path = PathBuf::from(unsafe { ptsname(&master) }.map_err(PtyError::SlaveName)?);

        let master = unsafe { File::from_raw_fd(master.into_raw_fd()) };

        // Keeping the slave open until the child has it avoids EIO on the
        // master between fork and the child's own open.
        let slave = open_slave(&slave_path, OFlag::O_NOCTTY)?;

        let session = Self {
            master: Some(master),
            slave: Some(slave),
            slave_path,
            child: None,
            size,
        };
        session.apply_size(size)?;

        debug!("Opened PTY {} ({}x{})", session.slave_path.display(), size.cols, size.rows);
        Ok(session)
    }

    /// Fork and exec `argv` on the slave side. Returns the child pid.
    ///
    /// If exec fails the child prints the OS error and exits with the errno
    /// value; the parent sees that as end-of-stream on the master.
    pub fn spawn_child<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<Pid> {
        self.spawn_child_with_env(argv, &[])
    }

    /// Like [`spawn_child`](Self::spawn_child), setting `env` in the child
    /// before exec.
    pub fn spawn_child_with_env<S: AsRef<str>>(&mut self, argv: &[S], env: &[(&str, &str)]) -> Result<Pid> {
        if self.child.is_some() {
            return Err(PtyError::AlreadySpawned);
        }
        let argv = argv
            .iter()
            .map(|arg| CString::new(arg.as_ref()).map_err(|e| PtyError::InvalidArgument(e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        if argv.is_empty() {
            return Err(PtyError::InvalidArgument("empty command".to_string()));
        }
        // Built before fork so the child does not allocate.
        let env = env
            .iter()
            .map(|(key, value)| {
                let key = CString::new(*key).map_err(|e| PtyError::InvalidArgument(e.to_string()))?;
                let value = CString::new(*value).map_err(|e| PtyError::InvalidArgument(e.to_string()))?;
                Ok((key, value))
            })
            .collect::<Result<Vec<_>>>()?;
        let slave_path = CString::new(self.slave_path.as_os_str().as_bytes())
            .map_err(|e| PtyError::InvalidArgument(e.to_string()))?;
        let master_fd = self.master()?.as_raw_fd();
        let inherited_slave = self.slave.as_ref().map(|fd| fd.as_raw_fd());
        let winsize = self.size.to_winsize();
        let exec_step = format!("execvp {:?}", argv[0]).into_bytes();

        match unsafe { unistd::fork() }.map_err(PtyError::Fork)? {
            ForkResult::Parent { child } => {
                // The child now holds the slave; drop the parent's reference.
                self.slave = None;
                self.child = Some(child);
                info!("Spawned {:?} as pid {}", argv[0], child);
                Ok(child)
            }
            ForkResult::Child => exec_child(master_fd, inherited_slave, &slave_path, &winsize, &argv, &env, &exec_step),
        }
    }

    /// Apply a new window size to the pty.
    ///
    /// The kernel delivers SIGWINCH to the foreground process group. Callers
    /// must resize the matching virtual screen right after this returns.
    pub fn resize(&mut self, size: WindowSize) -> Result<()> {
        self.apply_size(size)?;
        self.size = size;
        debug!("PTY resized to {}x{}", size.cols, size.rows);
        Ok(())
    }

    fn apply_size(&self, size: WindowSize) -> Result<()> {
        let winsize = size.to_winsize();
        let fd = self.master()?.as_raw_fd();
        unsafe {
            if libc::ioctl(fd, libc::TIOCSWINSZ, &winsize) < 0 {
                return Err(PtyError::SetWindowSize(nix::Error::last()));
            }
        }
        Ok(())
    }

    /// Write bytes to the master and flush them to the line discipline.
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut master = self.master()?;
        master.write_all(bytes).map_err(PtyError::Write)?;
        master.flush().map_err(PtyError::Write)?;
        Ok(bytes.len())
    }

    /// Blocking read from the master. `Ok(0)` means end of stream.
    #[allow(dead_code)]
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        read_master(self.master()?, buf)
    }

    /// An independent handle for a reader thread.
    pub fn reader(&self) -> Result<PtyReader> {
        let file = self.master()?.try_clone().map_err(PtyError::Clone)?;
        Ok(PtyReader { file })
    }

    #[allow(dead_code)]
    pub fn size(&self) -> WindowSize {
        self.size
    }

    #[allow(dead_code)]
    pub fn child_pid(&self) -> Option<Pid> {
        self.child
    }

    #[allow(dead_code)]
    pub fn slave_path(&self) -> &Path {
        &self.slave_path
    }

    /// Close the master and reap the child.
    ///
    /// Returns the child's exit code (128 + signal number when it was
    /// killed), or `None` if no child was spawned.
    pub fn close(mut self) -> Result<Option<i32>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<Option<i32>> {
        self.master = None;
        self.slave = None;

        let Some(pid) = self.child.take() else {
            return Ok(None);
        };

        if let Some(code) = try_reap(pid)? {
            return Ok(Some(code));
        }

        // Cloned reader handles keep the master alive, so hang up explicitly.
        match signal::kill(pid, Signal::SIGHUP) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(PtyError::Signal(e)),
        }

        let mut waited = Duration::ZERO;
        while waited < HANGUP_GRACE {
            if let Some(code) = try_reap(pid)? {
                info!("Child {} exited with {}", pid, code);
                return Ok(Some(code));
            }
            thread::sleep(HANGUP_POLL);
            waited += HANGUP_POLL;
        }

        warn!("Child {} ignored SIGHUP, killing", pid);
        match signal::kill(pid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(PtyError::Signal(e)),
        }
        match waitpid(pid, None) {
            Ok(status) => Ok(exit_code(status)),
            Err(Errno::ECHILD) => Ok(None),
            Err(e) => Err(PtyError::Wait(e)),
        }
    }

    fn master(&self) -> Result<&File> {
        self.master.as_ref().ok_or(PtyError::Closed)
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.shutdown() {
                warn!("PTY teardown failed: {}", e);
            }
        }
    }
}

/// Read half of a pty master, owned by the output pump thread.
pub struct PtyReader {
    file: File,
}

impl PtyReader {
    /// Blocking read. `Ok(0)` means the slave side is gone.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        read_master(&self.file, buf)
    }
}

fn read_master(mut file: &File, buf: &mut [u8]) -> Result<usize> {
    loop {
        match file.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            // Linux reports a hung-up slave as EIO rather than EOF.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => return Ok(0),
            Err(e) => return Err(PtyError::Read(e)),
        }
    }
}

fn open_slave(path: &Path, extra: OFlag) -> Result<OwnedFd> {
    let fd = fcntl::open(path, OFlag::O_RDWR | extra, Mode::empty()).map_err(|source| PtyError::OpenSlave {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn try_reap(pid: Pid) -> Result<Option<i32>> {
    match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(status) => Ok(exit_code(status).or(Some(0))),
        Err(Errno::ECHILD) => Ok(Some(0)),
        Err(e) => Err(PtyError::Wait(e)),
    }
}

fn exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
        _ => None,
    }
}

/// Runs in the forked child. Never returns.
///
/// Only async-signal-safe calls from here on: no allocation, no stdio locks.
fn exec_child(
    master_fd: RawFd,
    inherited_slave: Option<RawFd>,
    slave_path: &CString,
    winsize: &libc::winsize,
    argv: &[CString],
    env: &[(CString, CString)],
    exec_step: &[u8],
) -> ! {
    unsafe {
        libc::close(master_fd);
    }

    if let Err(e) = unistd::setsid() {
        child_fail(b"setsid", e as i32);
    }

    // As a fresh session leader, opening the slave makes it our controlling terminal.
    let slave = unsafe { libc::open(slave_path.as_ptr(), libc::O_RDWR) };
    if slave < 0 {
        child_fail(b"open slave PTY", Errno::last() as i32);
    }
    unsafe {
        libc::ioctl(slave, libc::TIOCSCTTY as _, 0);
    }

    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if let Err(e) = unistd::dup2(slave, target) {
            child_fail(b"dup2", e as i32);
        }
    }
    if slave > libc::STDERR_FILENO {
        let _ = unistd::close(slave);
    }
    if let Some(fd) = inherited_slave {
        if fd > libc::STDERR_FILENO {
            let _ = unistd::close(fd);
        }
    }

    unsafe {
        if libc::ioctl(libc::STDOUT_FILENO, libc::TIOCSWINSZ, winsize) < 0 {
            child_report(b"ioctl TIOCSWINSZ", Errno::last() as i32);
        }
    }

    // Restore default dispositions that the parent may have changed.
    for sig in [Signal::SIGCHLD, Signal::SIGHUP, Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM, Signal::SIGPIPE] {
        unsafe {
            let _ = signal::signal(sig, signal::SigHandler::SigDfl);
        }
    }

    for (key, value) in env {
        unsafe {
            libc::setenv(key.as_ptr(), value.as_ptr(), 1);
        }
    }

    let err = match unistd::execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    child_fail(exec_step, err as i32)
}

/// Write `step: description` straight to fd 2, which is the slave by now.
fn child_report(step: &[u8], errno: i32) {
    let desc = Errno::from_i32(errno).desc().as_bytes();
    for part in [step, b": ".as_slice(), desc, b"\r\n".as_slice()] {
        let _ = unistd::write(libc::STDERR_FILENO, part);
    }
}

fn child_fail(step: &[u8], errno: i32) -> ! {
    child_report(step, errno);
    unsafe { libc::_exit(errno) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Read until `needle` appears or the deadline passes.
    fn read_until(pty: &PtySession, needle: &str) -> String {
        let mut reader = pty.reader().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = String::new();
        let mut buf = [0u8; 1024];
        while Instant::now() < deadline && !output.contains(needle) {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => output.push_str(&String::from_utf8_lossy(&buf[..n])),
            }
        }
        output
    }

    /// Read until the child closes the slave side.
    fn drain(pty: &PtySession) -> String {
        let mut reader = pty.reader().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = String::new();
        let mut buf = [0u8; 1024];
        while Instant::now() < deadline {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => output.push_str(&String::from_utf8_lossy(&buf[..n])),
            }
        }
        output
    }

    #[test]
    fn test_open_reports_slave_and_size() {
        let pty = PtySession::open(WindowSize::new(100, 30)).unwrap();
        assert!(pty.slave_path().starts_with("/dev"));
        assert_eq!(pty.size(), WindowSize::new(100, 30));
        assert!(pty.child_pid().is_none());
    }

    #[test]
    fn test_spawn_echo() {
        let mut pty = PtySession::open(WindowSize::default()).unwrap();
        pty.spawn_child(&["/bin/echo", "hello from pty"]).unwrap();

        let output = drain(&pty);
        assert!(output.contains("hello from pty"), "got {:?}", output);

        assert_eq!(pty.close().unwrap(), Some(0));
    }

    #[test]
    fn test_read_reports_end_of_stream() {
        let mut pty = PtySession::open(WindowSize::default()).unwrap();
        pty.spawn_child(&["/bin/sh", "-c", "exit 0"]).unwrap();

        let mut buf = [0u8; 256];
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            assert!(Instant::now() < deadline, "no end of stream");
            if pty.read(&mut buf).unwrap() == 0 {
                break;
            }
        }
        pty.close().unwrap();
    }

    #[test]
    fn test_write_reaches_child() {
        let mut pty = PtySession::open(WindowSize::default()).unwrap();
        pty.spawn_child(&["/bin/cat"]).unwrap();

        pty.write(b"ping\n").unwrap();
        let output = read_until(&pty, "ping");
        assert!(output.contains("ping"));

        // cat keeps running; close must hang it up and reap it.
        let code = pty.close().unwrap();
        assert!(code.is_some());
    }

    #[test]
    fn test_child_sees_window_size() {
        let mut pty = PtySession::open(WindowSize::new(77, 19)).unwrap();
        pty.spawn_child(&["/bin/sh", "-c", "stty size"]).unwrap();

        let output = read_until(&pty, "19 77");
        assert!(output.contains("19 77"), "got {:?}", output);
        pty.close().unwrap();
    }

    #[test]
    fn test_exec_failure_exits_with_errno() {
        let mut pty = PtySession::open(WindowSize::default()).unwrap();
        pty.spawn_child(&["/nonexistent/menush-test-binary"]).unwrap();

        // The message is written to the slave's fd 2, never to the parent's stderr.
        let output = drain(&pty);
        assert!(output.contains("execvp \"/nonexistent/menush-test-binary\""), "got {:?}", output);
        assert!(output.contains("No such file or directory"), "got {:?}", output);
        assert_eq!(pty.close().unwrap(), Some(libc::ENOENT));
    }

    #[test]
    fn test_second_spawn_is_rejected() {
        let mut pty = PtySession::open(WindowSize::default()).unwrap();
        pty.spawn_child(&["/bin/cat"]).unwrap();
        assert!(matches!(pty.spawn_child(&["/bin/cat"]), Err(PtyError::AlreadySpawned)));
    }

    #[test]
    fn test_resize_updates_size() {
        let mut pty = PtySession::open(WindowSize::new(80, 24)).unwrap();
        pty.resize(WindowSize::new(40, 24)).unwrap();
        assert_eq!(pty.size(), WindowSize::new(40, 24));
    }
}
