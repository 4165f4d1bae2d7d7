//! The pseudoterminal pair and the shell running on it.

use crate::engine::ShellPort;
use crate::error::SessionError;
use crate::terminal::{self, WindowSize};
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

/// The program started on the slave side of the pty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The configured shell, else `$SHELL`, else `sh`.
    pub fn resolve(configured: Option<&str>) -> Self {
        Self::resolve_from(configured, std::env::var("SHELL").ok())
    }

    fn resolve_from(configured: Option<&str>, env_shell: Option<String>) -> Self {
        let program = configured
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| env_shell.filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| "sh".to_string());
        let args = if is_posix_like(&program) {
            vec!["-i".to_string()]
        } else {
            Vec::new()
        };
        Self { program, args }
    }
}

/// bash, zsh, sh and friends are started interactive.
fn is_posix_like(program: &str) -> bool {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with("sh"))
}

/// A shell running on the slave side of a pseudoterminal.
pub struct ShellPty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    slave_path: Option<PathBuf>,
}

impl ShellPty {
    /// Open a pty pair of `size` and start `command` on it in the current
    /// directory. The slave handle is released once the child has it.
    pub fn spawn(command: &ShellCommand, size: WindowSize) -> Result<Self, SessionError> {
        let pty_system = portable_pty::native_pty_system();
        let pair = pty_system
            .openpty(size.into())
            .map_err(|e| SessionError::Pty(format!("cannot open pty: {e}")))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        let cwd = std::env::current_dir()?;
        cmd.cwd(cwd);

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            SessionError::Process(format!("cannot start {}: {e}", command.program))
        })?;
        drop(pair.slave);

        let mut session = ShellPty {
            slave_path: pair.master.as_raw_fd().and_then(slave_device),
            writer: Box::new(std::io::sink()),
            master: pair.master,
            child,
        };
        match session.master.take_writer() {
            Ok(writer) => session.writer = writer,
            Err(e) => {
                session.terminate();
                return Err(SessionError::Pty(format!("cannot write to pty: {e}")));
            }
        }
        tracing::debug!(
            "started {} (pid {:?}) on {:?}",
            command.program,
            session.child.process_id(),
            session.slave_path
        );
        Ok(session)
    }

    /// An independent reader of the shell's output.
    pub fn reader(&self) -> Result<Box<dyn Read + Send>, SessionError> {
        self.master
            .try_clone_reader()
            .map_err(|e| SessionError::Pty(format!("cannot read from pty: {e}")))
    }

    /// The master descriptor, for polling.
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.master.as_raw_fd()
    }

    /// Device path of the slave side, e.g. `/dev/pts/3`.
    pub fn slave_path(&self) -> Option<&Path> {
        self.slave_path.as_deref()
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn resize(&self, size: WindowSize) -> Result<(), SessionError> {
        self.master
            .resize(size.into())
            .map_err(|e| SessionError::Pty(format!("cannot resize pty: {e}")))
    }

    /// Kill the shell and reap it without blocking.
    pub fn terminate(&mut self) {
        terminate(self.child.as_mut());
    }

    /// Close the master side, keeping only the child handle.
    pub fn close(self) -> Box<dyn Child + Send + Sync> {
        drop(self.writer);
        drop(self.master);
        self.child
    }
}

/// Device path of the slave side of the pty whose master is `fd`.
#[cfg(target_os = "linux")]
fn slave_device(fd: RawFd) -> Option<PathBuf> {
    use std::ffi::{CStr, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let mut buffer = [0 as libc::c_char; 128];
    // SAFETY: the buffer outlives the call and its length is passed along.
    if unsafe { libc::ptsname_r(fd, buffer.as_mut_ptr(), buffer.len()) } != 0 {
        return None;
    }
    // SAFETY: ptsname_r succeeded, so the buffer holds a NUL-terminated name.
    let name = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    Some(PathBuf::from(OsStr::from_bytes(name.to_bytes())))
}

#[cfg(not(target_os = "linux"))]
fn slave_device(fd: RawFd) -> Option<PathBuf> {
    use std::ffi::{CStr, OsStr};
    use std::os::unix::ffi::OsStrExt;

    // SAFETY: ptsname returns NULL or a pointer to a static NUL-terminated
    // buffer, copied out before anything else can call it on this thread.
    let name = unsafe { libc::ptsname(fd) };
    if name.is_null() {
        return None;
    }
    // SAFETY: checked for NULL above.
    let name = unsafe { CStr::from_ptr(name) };
    Some(PathBuf::from(OsStr::from_bytes(name.to_bytes())))
}

/// Kill `child` unless it has already exited, then reap it without blocking.
pub fn terminate(child: &mut (dyn Child + Send + Sync)) {
    if let Ok(Some(status)) = child.try_wait() {
        tracing::debug!("shell already exited: {status:?}");
        return;
    }
    if let Err(err) = child.kill() {
        tracing::debug!("killing shell: {err}");
    }
    match child.try_wait() {
        Ok(Some(status)) => tracing::debug!("shell reaped: {status:?}"),
        Ok(None) => tracing::debug!("shell not reaped yet"),
        Err(err) => tracing::warn!("reaping shell: {err}"),
    }
}

impl ShellPort for ShellPty {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.write(bytes)
    }

    fn sync_window_size(&mut self) -> Result<(), SessionError> {
        let size = terminal::window_size()?;
        tracing::debug!("window size {}x{}", size.cols, size.rows);
        self.resize(size)
    }
}

impl From<WindowSize> for PtySize {
    fn from(size: WindowSize) -> Self {
        PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}
