//! The [`Directive`] trait and the [`Context`] directives receive when executed.

use crate::error::SessionError;
use crate::input::KeySource;
use crate::signals::{self, OperatorSignal};
use crate::state::SessionState;
use std::path::Path;
use std::time::Duration;

/// How long a blocking key wait sleeps between checks for operator signals.
pub(crate) const SIGNAL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// What playback does after a directive has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Step to the next script line.
    Continue,
    /// End the session normally.
    Exit,
    /// The operator interrupted playback.
    Interrupted(OperatorSignal),
}

/// One operator key, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Pressed(Vec<u8>),
    /// Operator input has closed.
    Closed,
    Signalled(OperatorSignal),
}

/// Block for the next key. With `watch_signals` set, signals recorded by
/// [`signals::install`] end the wait.
pub(crate) fn next_key(keys: &mut dyn KeySource, watch_signals: bool) -> Result<Key, SessionError> {
    if watch_signals {
        while !keys.poll(SIGNAL_CHECK_INTERVAL)? {
            if let Some(signal) = signals::take_pending() {
                return Ok(Key::Signalled(signal));
            }
        }
    }
    Ok(match keys.read_key()? {
        Some(key) => Key::Pressed(key),
        None => Key::Closed,
    })
}

pub(crate) fn single_byte(key: &[u8]) -> Option<u8> {
    match key {
        [byte] => Some(*byte),
        _ => None,
    }
}

/// Execution context passed to [`Directive::execute`].
///
/// Gives access to the shared session state, the operator's keyboard and the
/// position of the directive in the script.
pub struct Context<'a> {
    pub(crate) state: &'a SessionState,
    pub(crate) keys: &'a mut dyn KeySource,
    pub(crate) line_index: usize,
    pub(crate) output_dir: &'a Path,
    pub(crate) handle_signals: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        state: &'a SessionState,
        keys: &'a mut dyn KeySource,
        line_index: usize,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            state,
            keys,
            line_index,
            output_dir,
            handle_signals: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        self.state
    }

    /// Zero-based index of the directive line in the script.
    pub fn line_index(&self) -> usize {
        self.line_index
    }

    /// Directory that files produced by directives are written to.
    pub fn output_dir(&self) -> &Path {
        self.output_dir
    }

    /// Watch for operator signals while waiting for keys.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Block until the operator presses a key.
    ///
    /// Ctrl-C and Ctrl-\ come back as [`Key::Signalled`], as does a signal
    /// delivered to the process while signal handling is on.
    pub fn wait_for_key(&mut self) -> Result<Key, SessionError> {
        let key = next_key(&mut *self.keys, self.handle_signals)?;
        if let Key::Pressed(bytes) = &key {
            if let Some(signal) = single_byte(bytes).and_then(OperatorSignal::from_key) {
                if self.handle_signals {
                    signals::deliver(signal);
                }
                return Ok(Key::Signalled(signal));
            }
        }
        Ok(key)
    }
}

/// A single inline script directive such as `# PAUSE:5`.
///
/// Implement this trait to add a new directive. Then:
///
/// 1. Define `pub const NAME: &'static str` (the canonical upper-case keyword)
///    and `pub const ALIASES: &'static [&'static str]` on your struct.
/// 2. Re-export the struct from `src/commands/mod.rs`.
/// 3. Add one entry to the `REGISTRY` in [`crate::parser`]:
///    `(MyDirective::NAME, MyDirective::ALIASES, MyDirective::parse_boxed)`.
pub trait Directive: 'static {
    /// The canonical directive name, accessible through a trait object.
    ///
    /// Implementations should return their `NAME` constant:
    /// `fn name(&self) -> &'static str { Self::NAME }`.
    fn name(&self) -> &'static str;

    /// Parse the directive from its argument (everything after the first `:`,
    /// trimmed; empty when there is none).
    fn parse(argument: &str) -> Result<Self, SessionError>
    where
        Self: Sized;

    /// Parse and box this directive. This is the function-pointer type stored
    /// in the directive registry.
    fn parse_boxed(argument: &str) -> Result<Box<dyn Directive>, SessionError>
    where
        Self: Sized,
    {
        Ok(Box::new(Self::parse(argument)?))
    }

    /// Run the directive against the live session.
    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError>;
}
