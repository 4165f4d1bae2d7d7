//! Script playback and the input-mode state machine.
//!
//! The [`Engine`] walks the attached script line by line. Before every unit
//! of a line reaches the shell it asks the operator's keyboard what to do;
//! the answer depends on the current [`InputMode`] and the keybinding table.

use crate::command::{self, Context, Flow, Key, single_byte};
use crate::error::{Outcome, SessionError};
use crate::input::KeySource;
use crate::keybindings::{AutoAction, CommandAction, InsertAction, Keybindings, PassthroughAction};
use crate::keytree::KeyTree;
use crate::parser::{build_directive, is_directive, parse_directive};
use crate::signals::{self, OperatorSignal};
use crate::state::{AutoPilotMode, InputMode, LineStatus, OutputMode, SessionState};
use crate::typing::TypingConfig;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FINISHED_MESSAGE: &str = "Session Finished. Press Enter.";

/// The shell end of a session: where delivered bytes go.
pub trait ShellPort {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError>;

    /// Copy the real terminal's window size to the shell's terminal.
    fn sync_window_size(&mut self) -> Result<(), SessionError>;
}

impl<S: ShellPort + ?Sized> ShellPort for &mut S {
    fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        (**self).send(bytes)
    }

    fn sync_window_size(&mut self) -> Result<(), SessionError> {
        (**self).sync_window_size()
    }
}

/// What one operator key means to the input loop.
enum Step {
    /// Read another key.
    Wait,
    /// Hand control back to playback.
    Return,
    Finish(Outcome),
}

/// Plays a script into a shell under operator control.
pub struct Engine<K, S> {
    state: Arc<SessionState>,
    keys: K,
    shell: S,
    bindings: Keybindings,
    tree: KeyTree,
    typing: TypingConfig,
    setup_commands: Vec<String>,
    cleanup_commands: Vec<String>,
    output_dir: PathBuf,
    console: Box<dyn Write + Send>,
    handle_signals: bool,
}

impl<K: KeySource, S: ShellPort> Engine<K, S> {
    /// An engine with the default bindings and key sequences, writing its
    /// own messages to stdout.
    pub fn new(state: Arc<SessionState>, keys: K, shell: S) -> Self {
        Self {
            state,
            keys,
            shell,
            bindings: Keybindings::default(),
            tree: KeyTree::with_default_sequences(),
            typing: TypingConfig::default(),
            setup_commands: Vec::new(),
            cleanup_commands: Vec::new(),
            output_dir: PathBuf::from("."),
            console: Box::new(io::stdout()),
            handle_signals: false,
        }
    }

    pub fn with_bindings(mut self, bindings: Keybindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_key_tree(mut self, tree: KeyTree) -> Self {
        self.tree = tree;
        self
    }

    pub fn with_typing(mut self, typing: TypingConfig) -> Self {
        self.typing = typing;
        self
    }

    /// Lines sent to the shell before the first script line.
    pub fn with_setup_commands(mut self, commands: Vec<String>) -> Self {
        self.setup_commands = commands;
        self
    }

    /// Lines sent to the shell after the last script line.
    pub fn with_cleanup_commands(mut self, commands: Vec<String>) -> Self {
        self.cleanup_commands = commands;
        self
    }

    /// Where `RUN` directives write their captured output.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Where the engine prints its own messages.
    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = console;
        self
    }

    /// Deliver Ctrl-C / Ctrl-\ to the process group and watch for signals
    /// recorded by [`signals::install`].
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Play the attached script to the end.
    pub fn run(&mut self) -> Outcome {
        let outcome: Outcome = self.play().into();
        match &outcome {
            Outcome::Failure(err) => tracing::error!("playback failed: {err}"),
            other => tracing::debug!("playback ended: {other:?}"),
        }
        outcome
    }

    fn play(&mut self) -> Result<Outcome, SessionError> {
        let state = Arc::clone(&self.state);
        let script = state
            .script()
            .ok_or_else(|| SessionError::Script("no script attached".to_string()))?;
        let lines = script.lines();

        for command in self.setup_commands.clone() {
            self.send_line(&command)?;
        }

        state.set_line_cursor(0);
        while state.line_cursor() < lines.len() {
            if let ControlFlow::Break(outcome) = self.run_directives(lines)? {
                return Ok(outcome);
            }
            let index = state.line_cursor();
            if index >= lines.len() {
                break;
            }
            if state.is_skipping() {
                tracing::debug!("skipping line {}", index + 1);
                state.set_line_cursor(index + 1);
                continue;
            }

            tracing::debug!("loading line {}", index + 1);
            if let ControlFlow::Break(outcome) = self.deliver_line(lines)? {
                return Ok(outcome);
            }
            if state.line_status() != LineStatus::Reload {
                state.set_line_cursor(state.line_cursor() + 1);
            }
        }

        for command in self.cleanup_commands.clone() {
            self.send_line(&command)?;
        }

        if state.input_mode() == InputMode::Auto {
            return Ok(Outcome::NormalExit);
        }
        self.wait_for_finish()
    }

    /// Execute the directive lines at the cursor, leaving it on the first
    /// non-directive line.
    fn run_directives(&mut self, lines: &[String]) -> Result<ControlFlow<Outcome>, SessionError> {
        loop {
            let index = self.state.line_cursor();
            let Some((name, argument)) = lines.get(index).and_then(|line| parse_directive(line))
            else {
                return Ok(ControlFlow::Continue(()));
            };

            match build_directive(name, &argument) {
                Ok(directive) => {
                    tracing::debug!("line {}: {name}", index + 1);
                    let mut ctx = Context::new(&self.state, &mut self.keys, index, &self.output_dir)
                        .with_signal_handling(self.handle_signals);
                    match directive.execute(&mut ctx) {
                        Ok(Flow::Exit) => return Ok(ControlFlow::Break(Outcome::NormalExit)),
                        Ok(Flow::Interrupted(signal)) => {
                            tracing::debug!("line {}: {name} interrupted by {signal:?}", index + 1);
                            return Ok(ControlFlow::Break(signal.outcome()));
                        }
                        Ok(Flow::Continue) => {}
                        Err(err) => tracing::warn!("line {}: {name} failed: {err}", index + 1),
                    }
                }
                Err(err) => tracing::warn!("line {}: ignoring {name}: {err}", index + 1),
            }
            self.state.set_line_cursor(index + 1);
        }
    }

    fn deliver_line(&mut self, lines: &[String]) -> Result<ControlFlow<Outcome>, SessionError> {
        let line = lines[self.state.line_cursor()].as_str();
        self.state.set_line_status(LineStatus::Empty);
        self.state.set_char_cursor(0);

        loop {
            while self.state.char_cursor() < line.len() {
                if let ControlFlow::Break(outcome) = self.process_user_input(lines)? {
                    return Ok(ControlFlow::Break(outcome));
                }
                if self.state.line_status() == LineStatus::Reload {
                    return Ok(ControlFlow::Continue(()));
                }
                let cursor = self.state.char_cursor();
                let end = cursor + self.unit_len(line, cursor);
                self.send(&line.as_bytes()[cursor..end])?;
                self.state.set_char_cursor(end);
                self.state.set_line_status(LineStatus::InProcess);
            }

            self.state.set_line_status(LineStatus::Loaded);
            if let ControlFlow::Break(outcome) = self.process_user_input(lines)? {
                return Ok(ControlFlow::Break(outcome));
            }
            match self.state.line_status() {
                LineStatus::Loaded => {
                    self.send(b"\r")?;
                    return Ok(ControlFlow::Continue(()));
                }
                LineStatus::Reload => return Ok(ControlFlow::Continue(())),
                // backed up; keep delivering
                LineStatus::Empty | LineStatus::InProcess => {}
            }
        }
    }

    /// Bytes at `cursor` that must reach the shell together.
    fn unit_len(&self, line: &str, cursor: usize) -> usize {
        let rest = &line.as_bytes()[cursor..];
        self.tree.key_len(rest).unwrap_or_else(|| {
            line.get(cursor..)
                .and_then(|s| s.chars().next())
                .map_or(1, char::len_utf8)
        })
    }

    /// Wait for the operator to say how playback continues.
    ///
    /// Returns `Continue` when the caller should deliver the next unit (or
    /// react to a changed line status) and `Break` when the session is over.
    fn process_user_input(
        &mut self,
        lines: &[String],
    ) -> Result<ControlFlow<Outcome>, SessionError> {
        loop {
            if let Some(signal) = self.pending_signal() {
                return Ok(ControlFlow::Break(signal.outcome()));
            }

            let mode = self.state.input_mode();
            let key = if mode == InputMode::Auto {
                if !self.auto_must_wait() && !self.keys.poll(Duration::ZERO)? {
                    thread::sleep(self.typing.next_pause());
                    return Ok(ControlFlow::Continue(()));
                }
                self.next_key()?
            } else {
                self.next_key()?
            };

            let key = match key {
                Key::Pressed(key) => key,
                Key::Closed => return Ok(ControlFlow::Break(Outcome::EarlyExit)),
                Key::Signalled(signal) => return Ok(ControlFlow::Break(signal.outcome())),
            };

            if mode != InputMode::Passthrough {
                if let Some(signal) = single_byte(&key).and_then(OperatorSignal::from_key) {
                    self.deliver_signal(signal);
                    return Ok(ControlFlow::Break(signal.outcome()));
                }
            }

            let step = match mode {
                InputMode::Command => self.command_key(&key, lines)?,
                InputMode::Insert => self.insert_key(&key, lines)?,
                InputMode::Passthrough => self.passthrough_key(&key)?,
                InputMode::Auto => self.auto_key(&key),
            };
            match step {
                Step::Wait => continue,
                Step::Return => return Ok(ControlFlow::Continue(())),
                Step::Finish(outcome) => return Ok(ControlFlow::Break(outcome)),
            }
        }
    }

    fn command_key(&mut self, key: &[u8], lines: &[String]) -> Result<Step, SessionError> {
        let Some(code) = single_byte(key) else {
            return Ok(Step::Wait);
        };
        let (action, _) = self.bindings.get::<CommandAction>(i32::from(code));
        let step = match action {
            CommandAction::SwitchToInsertMode => self.switch_mode(InputMode::Insert),
            CommandAction::SwitchToPassthroughMode => self.switch_mode(InputMode::Passthrough),
            CommandAction::SwitchToAutoMode => self.switch_mode(InputMode::Auto),
            CommandAction::Quit => Step::Finish(Outcome::NormalExit),
            CommandAction::ResizeWindow => {
                if let Err(err) = self.shell.sync_window_size() {
                    tracing::warn!("window resize failed: {err}");
                }
                Step::Wait
            }
            CommandAction::NextLine => {
                let cursor = self.state.line_cursor();
                if cursor + 1 < lines.len() {
                    self.state.set_line_cursor(cursor + 1);
                }
                self.state.set_line_status(LineStatus::Reload);
                Step::Return
            }
            CommandAction::PrevLine => {
                let mut cursor = self.state.line_cursor();
                while cursor > 0 {
                    cursor -= 1;
                    if !lines.get(cursor).is_some_and(|line| is_directive(line)) {
                        break;
                    }
                }
                self.state.set_line_cursor(cursor);
                self.state.set_line_status(LineStatus::Reload);
                Step::Return
            }
            CommandAction::TurnOffStdout => {
                self.state.set_output_mode(OutputMode::None);
                Step::Wait
            }
            CommandAction::TurnOnStdout => {
                self.state.set_output_mode(OutputMode::All);
                Step::Wait
            }
            CommandAction::ToggleStdout => {
                match self.state.output_mode() {
                    OutputMode::All => self.state.set_output_mode(OutputMode::None),
                    OutputMode::None => self.state.set_output_mode(OutputMode::All),
                    OutputMode::Filtered => {}
                }
                Step::Wait
            }
            CommandAction::Return => Step::Return,
            CommandAction::None => Step::Wait,
        };
        Ok(step)
    }

    fn insert_key(&mut self, key: &[u8], lines: &[String]) -> Result<Step, SessionError> {
        let Some(code) = single_byte(key) else {
            return Ok(Step::Wait);
        };
        let (action, _) = self.bindings.get::<InsertAction>(i32::from(code));
        let step = match action {
            InsertAction::Return => Step::Return,
            InsertAction::BackOneCharacter => {
                let was_loaded = self.state.line_status() == LineStatus::Loaded;
                self.back_one_character(lines)?;
                if was_loaded { Step::Return } else { Step::Wait }
            }
            InsertAction::SwitchToCommandMode => {
                self.state.set_input_mode(InputMode::Command);
                Step::Wait
            }
            InsertAction::Disabled => Step::Wait,
            InsertAction::None if self.state.line_status() == LineStatus::Loaded => Step::Wait,
            InsertAction::None => Step::Return,
        };
        Ok(step)
    }

    fn passthrough_key(&mut self, key: &[u8]) -> Result<Step, SessionError> {
        if let Some(code) = single_byte(key) {
            let (action, _) = self.bindings.get::<PassthroughAction>(i32::from(code));
            if action == PassthroughAction::SwitchToCommandMode {
                self.state.set_input_mode(InputMode::Command);
                return Ok(Step::Wait);
            }
        }
        self.send(key)?;
        Ok(Step::Wait)
    }

    fn auto_key(&mut self, key: &[u8]) -> Step {
        let action = single_byte(key)
            .map(|code| self.bindings.get::<AutoAction>(i32::from(code)).0)
            .unwrap_or(AutoAction::None);
        match action {
            AutoAction::SwitchToCommandMode => {
                self.state.set_input_mode(InputMode::Command);
                return Step::Wait;
            }
            AutoAction::Return => return Step::Return,
            AutoAction::SwitchToFullAuto => self.state.set_auto_pilot(AutoPilotMode::Full),
            AutoAction::SwitchToSemiAuto => self.state.set_auto_pilot(AutoPilotMode::Semi),
            AutoAction::None => {}
        }
        if self.auto_must_wait() {
            Step::Wait
        } else {
            thread::sleep(self.typing.next_pause());
            Step::Return
        }
    }

    /// Semi-auto holds a fully loaded line until the operator acts.
    fn auto_must_wait(&self) -> bool {
        self.state.auto_pilot() == AutoPilotMode::Semi
            && self.state.line_status() == LineStatus::Loaded
    }

    fn switch_mode(&self, mode: InputMode) -> Step {
        tracing::debug!("input mode -> {mode:?}");
        self.state.set_input_mode(mode);
        Step::Return
    }

    fn back_one_character(&mut self, lines: &[String]) -> Result<(), SessionError> {
        let cursor = self.state.char_cursor();
        if cursor == 0 {
            self.state.set_line_status(LineStatus::Empty);
            return Ok(());
        }
        self.send(b"\x7f")?;
        let width = lines
            .get(self.state.line_cursor())
            .and_then(|line| line.get(..cursor))
            .and_then(|delivered| delivered.chars().next_back())
            .map_or(1, char::len_utf8);
        let cursor = cursor - width;
        self.state.set_char_cursor(cursor);
        self.state.set_line_status(if cursor == 0 {
            LineStatus::Empty
        } else {
            LineStatus::InProcess
        });
        Ok(())
    }

    fn next_key(&mut self) -> Result<Key, SessionError> {
        command::next_key(&mut self.keys, self.handle_signals)
    }

    fn pending_signal(&self) -> Option<OperatorSignal> {
        if self.handle_signals {
            signals::take_pending()
        } else {
            None
        }
    }

    fn deliver_signal(&self, signal: OperatorSignal) {
        tracing::debug!("operator sent {signal:?}");
        if self.handle_signals {
            signals::deliver(signal);
        }
    }

    fn wait_for_finish(&mut self) -> Result<Outcome, SessionError> {
        write!(self.console, "\r\n{FINISHED_MESSAGE}\r\n")?;
        self.console.flush()?;
        loop {
            match self.next_key()? {
                Key::Pressed(key) if key == b"\r" => return Ok(Outcome::NormalExit),
                Key::Pressed(_) => {}
                Key::Closed => return Ok(Outcome::NormalExit),
                Key::Signalled(signal) => return Ok(signal.outcome()),
            }
        }
    }

    fn send_line(&mut self, command: &str) -> Result<(), SessionError> {
        self.send(command.as_bytes())?;
        self.send(b"\r")
    }

    /// Send bytes to the shell, turning `\n` into `\r`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        if bytes.contains(&b'\n') {
            let translated: Vec<u8> = bytes
                .iter()
                .map(|&b| if b == b'\n' { b'\r' } else { b })
                .collect();
            self.shell.send(&translated)
        } else {
            self.shell.send(bytes)
        }
    }
}
