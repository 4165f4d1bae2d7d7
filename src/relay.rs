//! Background relay of shell output to the real terminal.

use crate::state::{OutputMode, SessionState};
use std::io::{self, Read, Write};
use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long one poll of the pty waits before `shutdown` is checked again.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const CHUNK_SIZE: usize = 4096;

/// Spawn the `pty-relay` thread.
///
/// `fd` is polled for readability and `reader` is read from; both must refer
/// to the same pty master. Output reaches `console` only while the output
/// mode is [`OutputMode::All`].
pub fn spawn<R, W>(
    state: Arc<SessionState>,
    fd: RawFd,
    reader: R,
    console: W,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name("pty-relay".to_string())
        .spawn(move || relay(&state, fd, reader, console))
}

/// Copy from `reader` to `console` until shutdown, EOF or a read error.
pub fn relay<R: Read, W: Write>(state: &SessionState, fd: RawFd, mut reader: R, mut console: W) {
    let mut buffer = [0u8; CHUNK_SIZE];
    while !state.is_shutdown() {
        match wait_readable(fd, POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                tracing::error!("polling pty master failed: {err}");
                break;
            }
        }

        let n = match reader.read(&mut buffer) {
            Ok(0) => {
                tracing::debug!("pty master reached end of file");
                break;
            }
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                // EIO once the shell has exited and the slave is closed
                tracing::debug!("pty master read ended: {err}");
                break;
            }
        };

        if state.output_mode() != OutputMode::All {
            continue;
        }
        if let Err(err) = console.write_all(&buffer[..n]).and_then(|()| console.flush()) {
            tracing::error!("writing shell output failed: {err}");
            break;
        }
    }
    tracing::debug!("relay stopped");
}

/// Poll `fd` for input. Interrupted polls count as a timeout.
fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    // SAFETY: `fds` points to exactly one initialized pollfd.
    let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_relays_until_eof() {
        let (mut shell, master) = UnixStream::pair().unwrap();
        let state = Arc::new(SessionState::default());
        let sink = Sink::default();

        let fd = master.as_raw_fd();
        let handle = spawn(Arc::clone(&state), fd, master, sink.clone()).unwrap();
        shell.write_all(b"hello\r\n").unwrap();
        drop(shell);
        handle.join().unwrap();

        assert_eq!(sink.0.lock().unwrap().as_slice(), b"hello\r\n");
    }

    #[test]
    fn test_drops_output_when_muted() {
        let (mut shell, master) = UnixStream::pair().unwrap();
        let state = Arc::new(SessionState::default());
        let sink = Sink::default();

        let fd = master.as_raw_fd();
        let handle = spawn(Arc::clone(&state), fd, master, sink.clone()).unwrap();

        state.set_output_mode(OutputMode::None);
        shell.write_all(b"hidden").unwrap();
        thread::sleep(Duration::from_millis(200));
        state.set_output_mode(OutputMode::All);
        shell.write_all(b"shown").unwrap();
        wait_until(|| !sink.0.lock().unwrap().is_empty());

        state.request_shutdown();
        handle.join().unwrap();
        assert_eq!(sink.0.lock().unwrap().as_slice(), b"shown");
    }

    #[test]
    fn test_stops_on_shutdown() {
        let (_shell, master) = UnixStream::pair().unwrap();
        let state = Arc::new(SessionState::default());
        let fd = master.as_raw_fd();
        let handle = spawn(Arc::clone(&state), fd, master, io::sink()).unwrap();

        let started = Instant::now();
        state.request_shutdown();
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
