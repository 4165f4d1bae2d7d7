//! Operator interrupt and quit signals.
//!
//! While a session runs, SIGINT and SIGQUIT only record themselves in an
//! atomic. Playback picks the signal up at its next key check and ends the
//! session through the normal teardown path instead of dying mid-flight.

use crate::error::{Outcome, SessionError};
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

static PENDING: AtomicI32 = AtomicI32::new(0);

/// Only touches an atomic (async-signal-safe).
extern "C" fn record_signal(signal: libc::c_int) {
    PENDING.store(signal, Ordering::SeqCst);
}

/// A signal the operator can send from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSignal {
    /// SIGINT, the Ctrl-C byte `0x03`.
    Interrupt,
    /// SIGQUIT, the Ctrl-\ byte `0x1c`.
    Quit,
}

impl OperatorSignal {
    pub const ALL: [OperatorSignal; 2] = [OperatorSignal::Interrupt, OperatorSignal::Quit];

    pub fn number(self) -> libc::c_int {
        match self {
            OperatorSignal::Interrupt => libc::SIGINT,
            OperatorSignal::Quit => libc::SIGQUIT,
        }
    }

    pub fn from_number(signal: libc::c_int) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.number() == signal)
    }

    /// The signal a key byte stands for, if any.
    pub fn from_key(byte: u8) -> Option<Self> {
        match byte {
            0x03 => Some(OperatorSignal::Interrupt),
            0x1c => Some(OperatorSignal::Quit),
            _ => None,
        }
    }

    /// How the session ends when this signal arrives.
    pub fn outcome(self) -> Outcome {
        match self {
            OperatorSignal::Interrupt => Outcome::EarlyExit,
            OperatorSignal::Quit => Outcome::NormalExit,
        }
    }
}

/// Route SIGINT and SIGQUIT to the recording handler.
pub fn install() -> Result<(), SessionError> {
    let handler = record_signal as *const () as libc::sighandler_t;
    for signal in OperatorSignal::ALL {
        // SAFETY: `record_signal` only stores to an atomic.
        if unsafe { libc::signal(signal.number(), handler) } == libc::SIG_ERR {
            return Err(SessionError::Io(io::Error::last_os_error()));
        }
    }
    PENDING.store(0, Ordering::SeqCst);
    tracing::debug!("operator signal handlers installed");
    Ok(())
}

/// Put back the default dispositions.
pub fn restore() {
    for signal in OperatorSignal::ALL {
        // SAFETY: resetting to SIG_DFL has no preconditions.
        if unsafe { libc::signal(signal.number(), libc::SIG_DFL) } == libc::SIG_ERR {
            tracing::error!("could not restore handler for signal {}", signal.number());
        }
    }
}

/// Send `signal` to every process in our process group.
pub fn raise_to_group(signal: OperatorSignal) -> io::Result<()> {
    // SAFETY: kill(2) with pid 0 targets the caller's own process group.
    if unsafe { libc::kill(0, signal.number()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Forward a signal typed as a key to the process group, then drop the copy
/// our own handler recorded.
pub fn deliver(signal: OperatorSignal) {
    if let Err(err) = raise_to_group(signal) {
        tracing::warn!("could not signal process group: {err}");
    }
    take_pending();
}

/// The most recent recorded signal, clearing it.
pub fn take_pending() -> Option<OperatorSignal> {
    OperatorSignal::from_number(PENDING.swap(0, Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bytes() {
        assert_eq!(OperatorSignal::from_key(0x03), Some(OperatorSignal::Interrupt));
        assert_eq!(OperatorSignal::from_key(0x1c), Some(OperatorSignal::Quit));
        assert_eq!(OperatorSignal::from_key(b'q'), None);
    }

    #[test]
    fn test_outcomes() {
        assert_eq!(OperatorSignal::Interrupt.outcome().exit_code(), 1);
        assert_eq!(OperatorSignal::Quit.outcome().exit_code(), 0);
    }

    #[test]
    fn test_handler_records_signal() {
        record_signal(libc::SIGQUIT);
        assert_eq!(take_pending(), Some(OperatorSignal::Quit));
        assert_eq!(take_pending(), None);
    }
}
