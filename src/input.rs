//! Operator keystrokes.
//!
//! Playback reads keys through the [`KeySource`] trait so that the state
//! machine can be driven from the real keyboard ([`StdinKeys`]) or from a
//! fixed list of keys ([`ScriptedKeys`]).

use crate::keytree::KeyTree;
use std::collections::VecDeque;
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// A source of operator keys. One key is one byte or one recognized
/// multi-byte sequence.
pub trait KeySource {
    /// Block until the next key. `None` means input has ended.
    fn read_key(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Wait up to `timeout` for a key to become available. A zero timeout
    /// checks without blocking. End of input counts as available.
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;
}

impl<K: KeySource + ?Sized> KeySource for &mut K {
    fn read_key(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).read_key()
    }

    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).poll(timeout)
    }
}

/// Raw keyboard input from a file descriptor (standard input by default).
///
/// Reads go straight to the descriptor with `read(2)`; a buffered reader
/// would hide bytes from `poll(2)`.
pub struct StdinKeys {
    fd: RawFd,
    tree: KeyTree,
    pending: VecDeque<u8>,
    eof: bool,
}

impl StdinKeys {
    pub fn new(tree: KeyTree) -> Self {
        Self::from_fd(libc::STDIN_FILENO, tree)
    }

    /// Read keys from `fd`, which must stay open for the lifetime of `self`.
    pub fn from_fd(fd: RawFd, tree: KeyTree) -> Self {
        Self {
            fd,
            tree,
            pending: VecDeque::new(),
            eof: false,
        }
    }

    fn fill(&mut self) -> io::Result<usize> {
        let mut buf = [0u8; 256];
        loop {
            // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
            let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            let n = n as usize;
            self.pending.extend(&buf[..n]);
            return Ok(n);
        }
    }

    fn split_key(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let bytes = self.pending.make_contiguous();
        let len = self.tree.key_len(bytes).unwrap_or(1);
        Some(self.pending.drain(..len).collect())
    }
}

impl KeySource for StdinKeys {
    fn read_key(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.pending.is_empty() {
            if self.eof {
                return Ok(None);
            }
            if self.fill()? == 0 {
                tracing::debug!("operator input closed");
                self.eof = true;
                return Ok(None);
            }
        }
        Ok(self.split_key())
    }

    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        if !self.pending.is_empty() || self.eof {
            return Ok(true);
        }
        let mut fds = libc::pollfd {
            fd: self.fd,
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
}

/// A fixed sequence of keys, ending in end-of-input.
#[derive(Debug, Default, Clone)]
pub struct ScriptedKeys {
    keys: VecDeque<Vec<u8>>,
}

impl ScriptedKeys {
    pub fn new<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// One key per byte of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(bytes.iter().map(|&b| vec![b]))
    }

    pub fn push(&mut self, key: impl Into<Vec<u8>>) {
        self.keys.push_back(key.into());
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl KeySource for ScriptedKeys {
    fn read_key(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.keys.pop_front())
    }

    /// Available while keys remain. Once they run out only a blocking
    /// [`read_key`](KeySource::read_key) reports the end of input, so Auto
    /// mode keeps typing.
    fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(!self.keys.is_empty())
    }
}
