//! Session state shared between the playback loop and the background threads.
//!
//! The playback loop is the only writer of cursors, modes and flags. The relay
//! and the status responder only observe them, so every field is an atomic and
//! no lock is taken; a monitor snapshot is best-effort, not consistent.

use crate::error::SessionError;
use crate::script::SessionScript;
use std::marker::PhantomData;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Which action table interprets operator keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Command,
    Insert,
    Passthrough,
    Auto,
}

/// Sub-mode of [`InputMode::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoPilotMode {
    /// Wait for the operator after each fully loaded line.
    Semi,
    #[default]
    Full,
}

/// Progress loading the current line into the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Empty,
    InProcess,
    Loaded,
    Reload,
}

/// Whether relayed shell output reaches the real terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    All,
    None,
    Filtered,
}

/// Conversion of a small state enum to and from its atomic representation.
pub trait StateCode: Copy {
    fn to_code(self) -> u8;
    fn from_code(code: u8) -> Self;
}

macro_rules! state_code {
    ($ty:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        impl StateCode for $ty {
            fn to_code(self) -> u8 {
                match self {
                    $($ty::$variant => $code,)+
                }
            }

            fn from_code(code: u8) -> Self {
                match code {
                    $($code => $ty::$variant,)+
                    _ => unreachable!(concat!("invalid ", stringify!($ty), " code")),
                }
            }
        }
    };
}

state_code!(InputMode { Command = 0, Insert = 1, Passthrough = 2, Auto = 3 });
state_code!(AutoPilotMode { Semi = 0, Full = 1 });
state_code!(LineStatus { Empty = 0, InProcess = 1, Loaded = 2, Reload = 3 });
state_code!(OutputMode { All = 0, None = 1, Filtered = 2 });

/// An enum stored in an [`AtomicU8`].
#[derive(Debug)]
pub struct AtomicState<T> {
    code: AtomicU8,
    _marker: PhantomData<T>,
}

impl<T: StateCode> AtomicState<T> {
    pub fn new(value: T) -> Self {
        Self {
            code: AtomicU8::new(value.to_code()),
            _marker: PhantomData,
        }
    }

    pub fn load(&self) -> T {
        T::from_code(self.code.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: T) {
        self.code.store(value.to_code(), Ordering::Relaxed);
    }
}

/// Everything about a running session that more than one thread looks at.
#[derive(Debug)]
pub struct SessionState {
    input_mode: AtomicState<InputMode>,
    auto_pilot: AtomicState<AutoPilotMode>,
    line_status: AtomicState<LineStatus>,
    output_mode: AtomicState<OutputMode>,
    skipping: AtomicBool,
    shutdown: AtomicBool,
    line_cursor: AtomicUsize,
    char_cursor: AtomicUsize,
    script: OnceLock<SessionScript>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(AutoPilotMode::default())
    }
}

impl SessionState {
    pub fn new(auto_pilot: AutoPilotMode) -> Self {
        Self {
            input_mode: AtomicState::new(InputMode::Insert),
            auto_pilot: AtomicState::new(auto_pilot),
            line_status: AtomicState::new(LineStatus::Empty),
            output_mode: AtomicState::new(OutputMode::All),
            skipping: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            line_cursor: AtomicUsize::new(0),
            char_cursor: AtomicUsize::new(0),
            script: OnceLock::new(),
        }
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode.load()
    }

    pub fn set_input_mode(&self, mode: InputMode) {
        self.input_mode.store(mode);
    }

    pub fn auto_pilot(&self) -> AutoPilotMode {
        self.auto_pilot.load()
    }

    pub fn set_auto_pilot(&self, mode: AutoPilotMode) {
        self.auto_pilot.store(mode);
    }

    pub fn line_status(&self) -> LineStatus {
        self.line_status.load()
    }

    pub fn set_line_status(&self, status: LineStatus) {
        self.line_status.store(status);
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode.load()
    }

    pub fn set_output_mode(&self, mode: OutputMode) {
        self.output_mode.store(mode);
    }

    pub fn is_skipping(&self) -> bool {
        self.skipping.load(Ordering::Relaxed)
    }

    pub fn set_skipping(&self, skipping: bool) {
        self.skipping.store(skipping, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Ask the background threads to leave their poll loops.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn line_cursor(&self) -> usize {
        self.line_cursor.load(Ordering::Relaxed)
    }

    pub fn set_line_cursor(&self, index: usize) {
        self.line_cursor.store(index, Ordering::Relaxed);
    }

    pub fn char_cursor(&self) -> usize {
        self.char_cursor.load(Ordering::Relaxed)
    }

    pub fn set_char_cursor(&self, offset: usize) {
        self.char_cursor.store(offset, Ordering::Relaxed);
    }

    /// The script being played, once one is attached.
    pub fn script(&self) -> Option<&SessionScript> {
        self.script.get()
    }

    /// Attach the script to play. A session plays exactly one script.
    pub fn attach_script(&self, script: SessionScript) -> Result<(), SessionError> {
        self.script
            .set(script)
            .map_err(|_| SessionError::Script("a script is already attached".to_string()))
    }
}
