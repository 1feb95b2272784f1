//! Lifecycle owner for one external speech-recognizer process.
//!
//! The recognizer is a long-lived child process that writes newline-delimited
//! UTF-8 utterances to its combined stdout/stderr stream. This crate owns the
//! child exclusively: it spawns it with merged output, reads lines on a
//! detached background thread, strips the decorative utterance marker, and
//! hands each non-empty utterance to the caller-supplied handler in line
//! order. Handlers are expected to marshal onto the presentation surface's
//! drain queue; the bridge never touches UI state itself.
//!
//! `stop_listening` is idempotent and infallible from the caller's view:
//! graceful termination first, then a force-kill after a bounded grace
//! period. The reader thread is never joined; it exits on its own once the
//! output pipe closes.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// Decorative prefix the recognizer prints before each utterance.
pub const UTTERANCE_MARKER: &str = "🗣️";

/// How long `stop_listening` waits for voluntary exit before force-killing.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Failure starting a listen session.
#[derive(Debug, Error)]
pub enum StartError {
    /// A recognizer process is already live; stop it before starting another.
    #[error("recognizer is already listening")]
    AlreadyListening,
    /// The recognizer executable could not be launched.
    #[error("failed to launch recognizer: {0}")]
    Spawn(#[source] io::Error),
}

/// How to launch the recognizer executable.
///
/// Interpreter and script resolution is deliberately the caller's concern;
/// pass the interpreter's unbuffered flag (for example `python3 -u`) so
/// lines are observed with minimal latency.
#[derive(Debug, Clone)]
pub struct RecognizerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl RecognizerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the child's working directory. Defaults to the parent's.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.stdin(Stdio::null());
        if let Some(working_dir) = &self.working_dir {
            command.current_dir(working_dir);
        }
        command
    }
}

/// Owns at most one live recognizer process and its reader thread.
pub struct SpeechBridge {
    command: RecognizerCommand,
    session: Mutex<Option<Child>>,
}

impl SpeechBridge {
    pub fn new(command: RecognizerCommand) -> Self {
        Self {
            command,
            session: Mutex::new(None),
        }
    }

    /// Launches the recognizer and begins delivering utterances to
    /// `on_utterance` from a detached reader thread.
    ///
    /// Fails with [`StartError::AlreadyListening`] while a previous session's
    /// process is still alive; a session whose process already exited on its
    /// own is reaped and replaced.
    pub fn start_listening<F>(&self, on_utterance: F) -> Result<(), StartError>
    where
        F: FnMut(String) + Send + 'static,
    {
        let mut session = lock_unpoisoned(&self.session);
        if let Some(child) = session.as_mut() {
            match child.try_wait() {
                Ok(Some(_)) => {
                    *session = None;
                }
                Ok(None) | Err(_) => return Err(StartError::AlreadyListening),
            }
        }

        let (mut child, output) = spawn_with_merged_output(&self.command).map_err(StartError::Spawn)?;
        let reader = BufReader::new(output);

        let spawned = thread::Builder::new()
            .name("speech-bridge-reader".to_string())
            .spawn(move || read_loop(reader, on_utterance));
        if let Err(error) = spawned {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StartError::Spawn(error));
        }

        *session = Some(child);
        Ok(())
    }

    /// Stops the active recognizer, if any. Never fails observably: with no
    /// active session this is a no-op, and termination problems are logged.
    ///
    /// Blocks the calling thread for up to [`STOP_GRACE_PERIOD`] while the
    /// process exits voluntarily; call from a background context if that
    /// stall would freeze an interface.
    pub fn stop_listening(&self) {
        let child = lock_unpoisoned(&self.session).take();
        let Some(mut child) = child else {
            return;
        };

        terminate(&mut child);
    }

    /// Returns true while a recognizer process is live.
    pub fn is_listening(&self) -> bool {
        let mut session = lock_unpoisoned(&self.session);
        match session.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(_)) => {
                    *session = None;
                    false
                }
                Ok(None) => true,
                Err(_) => true,
            },
            None => false,
        }
    }
}

impl Drop for SpeechBridge {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

fn terminate(child: &mut Child) {
    request_graceful_exit(child);

    match child.wait_timeout(STOP_GRACE_PERIOD) {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::debug!("recognizer did not exit within grace period; force-killing");
            let _ = child.kill();
            let _ = child.wait();
        }
        Err(error) => {
            tracing::warn!(%error, "waiting for recognizer exit failed; force-killing");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(unix)]
fn request_graceful_exit(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn request_graceful_exit(child: &mut Child) {
    let _ = child.kill();
}

/// Spawns the recognizer with stderr merged into stdout so diagnostics and
/// utterances arrive on one stream in write order.
#[cfg(unix)]
fn spawn_with_merged_output(
    command: &RecognizerCommand,
) -> io::Result<(Child, Box<dyn Read + Send>)> {
    use std::fs::File;
    use std::os::unix::io::FromRawFd;

    let (read_fd, stdout_fd, stderr_fd) = merged_output_pipe()?;

    // Stdio takes ownership of the write ends; spawn closes the parent's
    // copies, so EOF on read_fd tracks child exit exactly.
    let stdout = unsafe { Stdio::from_raw_fd(stdout_fd) };
    let stderr = unsafe { Stdio::from_raw_fd(stderr_fd) };
    let output = unsafe { File::from_raw_fd(read_fd) };

    let child = command.command().stdout(stdout).stderr(stderr).spawn()?;
    Ok((child, Box::new(output)))
}

/// Builds the shared pipe behind the merged stream: one read end and two
/// write ends destined for the child's stdout and stderr slots.
///
/// All three descriptors carry `FD_CLOEXEC`; children must see only the
/// dup2'd stdio copies. A raw write end leaking into any exec'd process
/// would hold EOF on the read end open past child exit.
#[cfg(unix)]
fn merged_output_pipe() -> io::Result<(i32, i32, i32)> {
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let [read_fd, write_fd] = fds;

    let stderr_fd = (|| {
        set_cloexec(read_fd)?;
        set_cloexec(write_fd)?;
        let stderr_fd = unsafe { libc::fcntl(write_fd, libc::F_DUPFD_CLOEXEC, 0) };
        if stderr_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(stderr_fd)
    })();

    match stderr_fd {
        Ok(stderr_fd) => Ok((read_fd, write_fd, stderr_fd)),
        Err(error) => {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            Err(error)
        }
    }
}

#[cfg(unix)]
fn set_cloexec(fd: i32) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn spawn_with_merged_output(
    command: &RecognizerCommand,
) -> io::Result<(Child, Box<dyn Read + Send>)> {
    let mut child = command
        .command()
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let output = child.stdout.take().ok_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "recognizer stdout was not captured")
    })?;
    Ok((child, Box::new(output)))
}

fn read_loop<R, F>(mut reader: R, mut on_utterance: F)
where
    R: BufRead,
    F: FnMut(String),
{
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                if let Some(utterance) = clean_utterance(&line) {
                    on_utterance(utterance);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "recognizer output read failed; ending listen session");
                break;
            }
        }
    }
}

/// Normalizes one raw output line into an utterance.
///
/// Blank lines are dropped. A leading [`UTTERANCE_MARKER`] set off by
/// whitespace is stripped together with that whitespace; a line that is
/// only the marker carries no utterance and is dropped. A marker glued
/// directly to text is part of the utterance and stays.
fn clean_utterance(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Some(rest) = trimmed.strip_prefix(UTTERANCE_MARKER) else {
        return Some(trimmed.to_string());
    };

    if rest.is_empty() {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return Some(trimmed.to_string());
    }

    Some(rest.trim_start().to_string())
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
