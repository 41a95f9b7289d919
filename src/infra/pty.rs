use crate::error::HangarError;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Ctrl+Q. Typed by the user while attached, it detaches instead of being
/// forwarded to the session.
pub const DETACH_BYTE: u8 = 0x11;

/// How long the input loop waits on the keyboard before checking whether
/// the attachment ended some other way.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Resolves when the attachment ends. The sender is dropped exactly once, so
/// `changed()` returning an error also means "done".
pub type DoneSignal = watch::Receiver<bool>;

/// Whatever keeps an attachment's terminal alive. Closing it must make the
/// forwarding loops wind down.
pub trait PtyLink: Send {
    fn close(&mut self);
}

#[derive(Default)]
struct AttachSlot {
    link: Option<Box<dyn PtyLink>>,
    done: Option<watch::Sender<bool>>,
}

/// Live attachments, at most one per session name.
///
/// The outer map lock is only held to find or insert a slot; attach and
/// detach on the same name serialize on the slot's own lock, so different
/// sessions never wait on each other.
#[derive(Default)]
pub struct AttachTable {
    slots: Mutex<HashMap<String, Arc<Mutex<AttachSlot>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AttachTable {
    fn slot(&self, name: &str) -> Arc<Mutex<AttachSlot>> {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    fn existing_slot(&self, name: &str) -> Option<Arc<Mutex<AttachSlot>>> {
        lock(&self.slots).get(name).cloned()
    }

    pub fn is_attached(&self, name: &str) -> bool {
        self.existing_slot(name)
            .is_some_and(|slot| lock(&slot).link.is_some())
    }

    /// Register an attachment for `name`, opening it with `open` while the
    /// slot is held. A second attach to the same name is refused.
    pub fn attach(
        &self,
        name: &str,
        open: impl FnOnce() -> Result<Box<dyn PtyLink>, HangarError>,
    ) -> Result<DoneSignal, HangarError> {
        let slot = self.slot(name);
        let mut guard = lock(&slot);
        if guard.link.is_some() {
            return Err(HangarError::AlreadyAttached(name.to_string()));
        }
        let link = open()?;
        let (tx, rx) = watch::channel(false);
        guard.link = Some(link);
        guard.done = Some(tx);
        debug!(session = name, "attached");
        Ok(rx)
    }

    /// Close the attachment and fire its done signal.
    pub fn detach(&self, name: &str) -> Result<(), HangarError> {
        let slot = self
            .existing_slot(name)
            .ok_or_else(|| HangarError::NotAttached(name.to_string()))?;
        let mut guard = lock(&slot);
        let Some(mut link) = guard.link.take() else {
            return Err(HangarError::NotAttached(name.to_string()));
        };
        link.close();
        if let Some(done) = guard.done.take() {
            let _ = done.send(true);
        }
        debug!(session = name, "detached");
        Ok(())
    }
}

/// Wait for an attachment to finish.
pub async fn wait_done(mut done: DoneSignal) {
    while !*done.borrow_and_update() {
        if done.changed().await.is_err() {
            break;
        }
    }
}

/// Split a chunk of user input at the detach key. Returns the bytes to
/// forward and whether the detach key was seen.
pub fn split_at_detach(buf: &[u8]) -> (&[u8], bool) {
    match buf.iter().position(|&b| b == DETACH_BYTE) {
        Some(i) => (&buf[..i], true),
        None => (buf, false),
    }
}

type SharedWriter = Arc<Mutex<Option<Box<dyn Write + Send>>>>;

/// Something the input loop can wait on without committing to a read.
trait InputSource {
    /// Wait up to `timeout` for input. `Ok(false)` means nothing arrived.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Raw fd 0. Reads bypass std's stdin buffer so `poll` sees every pending
/// byte.
struct StdinSource;

impl InputSource for StdinSource {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut fd = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        // SAFETY: a single pollfd that outlives the call.
        let rc = unsafe { libc::poll(&mut fd, 1, ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(rc > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        usize::try_from(n).map_err(|_| io::Error::last_os_error())
    }
}

/// Forward keystrokes to the attach client until Ctrl+Q, end of input, or
/// the writer being taken by a detach from elsewhere.
fn forward_input(
    mut input: impl InputSource,
    writer: &SharedWriter,
    table: &AttachTable,
    session: &str,
) {
    let mut buf = [0u8; 1024];
    loop {
        if lock(writer).is_none() {
            break;
        }
        match input.wait_readable(INPUT_POLL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(session, error = %e, "waiting on stdin failed");
                break;
            }
        }
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        let (forward, detach) = split_at_detach(&buf[..n]);
        let mut guard = lock(writer);
        let Some(w) = guard.as_mut() else {
            break;
        };
        if !forward.is_empty() && w.write_all(forward).and_then(|_| w.flush()).is_err() {
            warn!(session, "write to attach client failed");
            break;
        }
        drop(guard);
        if detach {
            let _ = table.detach(session);
            break;
        }
    }
    debug!(session, "input forwarding stopped");
}

/// A `tmux attach-session` client running in its own pseudo-terminal.
struct TmuxPtyLink {
    killer: Box<dyn ChildKiller + Send + Sync>,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: SharedWriter,
}

impl PtyLink for TmuxPtyLink {
    fn close(&mut self) {
        // Only the attach client dies; the tmux session keeps running.
        if let Err(e) = self.killer.kill() {
            debug!(error = %e, "attach client already gone");
        }
        lock(&self.writer).take();
        self.master.take();
    }
}

fn terminal_size() -> PtySize {
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Spawn `argv` (a tmux attach client) in a new PTY and start forwarding the
/// user's terminal to it. Ctrl+Q or the client exiting detaches `session`
/// from `table`.
pub fn spawn_attach(
    argv: Vec<String>,
    table: Arc<AttachTable>,
    session: String,
) -> Result<Box<dyn PtyLink>, HangarError> {
    let pty_err = |what: &str, e: anyhow::Error| HangarError::Pty(format!("{what}: {e}"));

    let pair = native_pty_system()
        .openpty(terminal_size())
        .map_err(|e| pty_err("open pty", e))?;

    let mut cmd = CommandBuilder::from_argv(argv.into_iter().map(OsString::from).collect());
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd.env(
        "TERM",
        std::env::var("TERM").unwrap_or_else(|_| "xterm-256color".to_string()),
    );

    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| pty_err("spawn attach client", e))?;
    drop(pair.slave);

    let killer = child.clone_killer();
    let mut reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| pty_err("clone pty reader", e))?;
    let writer: SharedWriter = Arc::new(Mutex::new(Some(
        pair.master
            .take_writer()
            .map_err(|e| pty_err("take pty writer", e))?,
    )));

    // Reap the client so it never lingers as a zombie.
    std::thread::spawn(move || {
        let _ = child.wait();
    });

    // Session output -> user terminal. EOF means the client went away.
    {
        let table = Arc::clone(&table);
        let session = session.clone();
        std::thread::spawn(move || {
            let mut stdout = std::io::stdout();
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stdout.write_all(&buf[..n]).is_err() {
                            break;
                        }
                        let _ = stdout.flush();
                    }
                }
            }
            let _ = table.detach(&session);
        });
    }

    // User keyboard -> session input, watching for Ctrl+Q.
    {
        let writer = Arc::clone(&writer);
        std::thread::spawn(move || forward_input(StdinSource, &writer, &table, &session));
    }

    Ok(Box::new(TmuxPtyLink {
        killer,
        master: Some(pair.master),
        writer,
    }))
}
