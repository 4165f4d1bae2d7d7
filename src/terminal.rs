//! The operator's real terminal: raw mode and window geometry.

use crate::error::SessionError;
use crossterm::terminal;
use std::io::{self, IsTerminal};

/// Rows and columns of a terminal window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Current size of the controlling terminal.
pub fn window_size() -> Result<WindowSize, SessionError> {
    let (cols, rows) = terminal::size()
        .map_err(|e| SessionError::Terminal(format!("cannot read window size: {e}")))?;
    Ok(WindowSize { rows, cols })
}

/// Check that standard input is a terminal and read its size.
pub fn capture() -> Result<WindowSize, SessionError> {
    if !io::stdin().is_terminal() {
        return Err(SessionError::Terminal(
            "standard input is not a terminal".to_string(),
        ));
    }
    window_size()
}

/// Keeps the terminal in raw mode until restored or dropped.
#[derive(Debug)]
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn enter() -> Result<Self, SessionError> {
        terminal::enable_raw_mode()
            .map_err(|e| SessionError::Terminal(format!("cannot enter raw mode: {e}")))?;
        tracing::debug!("terminal in raw mode");
        Ok(Self { active: true })
    }

    /// Leave raw mode. Calling this more than once is harmless.
    pub fn restore(&mut self) -> Result<(), SessionError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        terminal::disable_raw_mode()
            .map_err(|e| SessionError::Terminal(format!("cannot restore terminal: {e}")))?;
        tracing::debug!("terminal restored");
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::error!("{err}");
        }
    }
}
