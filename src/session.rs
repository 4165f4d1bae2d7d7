//! The session supervisor: owns the pty, the shell and the background
//! threads, and guarantees they are all released on every exit path.

use crate::engine::Engine;
use crate::error::{Outcome, SessionError};
use crate::input::StdinKeys;
use crate::keybindings::Keybindings;
use crate::keytree::KeyTree;
use crate::monitor;
use crate::pty::{self, ShellCommand, ShellPty};
use crate::relay;
use crate::script::SessionScript;
use crate::signals;
use crate::state::{AutoPilotMode, InputMode, SessionState};
use crate::template::TemplateContext;
use crate::terminal::{self, RawModeGuard};
use crate::typing::TypingConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub shell: ShellCommand,
    /// Loaded by [`Session::run`] when no script was attached beforehand.
    pub script_path: Option<PathBuf>,
    pub context: TemplateContext,
    pub bindings: Keybindings,
    /// Serve status snapshots on `127.0.0.1:<port>`.
    pub monitor_port: Option<u16>,
    pub setup_commands: Vec<String>,
    pub cleanup_commands: Vec<String>,
    pub auto_pilot: AutoPilotMode,
    /// Mode playback starts in.
    pub initial_mode: InputMode,
    pub typing: TypingConfig,
    pub output_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: ShellCommand::resolve(None),
            script_path: None,
            context: TemplateContext::new(),
            bindings: Keybindings::default(),
            monitor_port: None,
            setup_commands: Vec::new(),
            cleanup_commands: Vec::new(),
            auto_pilot: AutoPilotMode::default(),
            initial_mode: InputMode::Insert,
            typing: TypingConfig::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// A shell on a pseudoterminal, driven from the operator's terminal.
///
/// Construction starts the shell and the background threads and puts the
/// terminal in raw mode. [`shutdown`](Self::shutdown) (also run on drop)
/// undoes all of it, whatever state construction reached.
pub struct Session {
    config: SessionConfig,
    state: Arc<SessionState>,
    pty: Option<ShellPty>,
    relay: Option<JoinHandle<()>>,
    responder: Option<JoinHandle<()>>,
    raw_mode: Option<RawModeGuard>,
    signals_installed: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let size = terminal::capture()?;
        let pty = ShellPty::spawn(&config.shell, size)?;
        let state = Arc::new(SessionState::new(config.auto_pilot));
        state.set_input_mode(config.initial_mode);

        let mut session = Session {
            config,
            state,
            pty: Some(pty),
            relay: None,
            responder: None,
            raw_mode: None,
            signals_installed: false,
        };
        // on failure the partially started session is torn down by Drop
        session.start()?;
        tracing::debug!(
            "shell pid {:?} on {}",
            session.shell_pid(),
            session
                .slave_path()
                .map_or_else(|| "unknown device".to_string(), |p| p.display().to_string())
        );
        Ok(session)
    }

    fn start(&mut self) -> Result<(), SessionError> {
        let pty = self
            .pty
            .as_ref()
            .ok_or_else(|| SessionError::Pty("session has no pty".to_string()))?;

        match self.config.monitor_port {
            Some(port) => {
                let socket = monitor::bind(port)?;
                self.responder = Some(monitor::spawn_responder(Arc::clone(&self.state), socket)?);
                tracing::debug!("monitor listening on 127.0.0.1:{port}");
            }
            None => tracing::debug!("monitoring disabled"),
        }

        let fd = pty
            .raw_fd()
            .ok_or_else(|| SessionError::Pty("pty master has no descriptor".to_string()))?;
        let reader = pty.reader()?;
        self.relay = Some(relay::spawn(Arc::clone(&self.state), fd, reader, io::stdout())?);

        signals::install()?;
        self.signals_installed = true;

        self.raw_mode = Some(RawModeGuard::enter()?);
        pty.resize(terminal::window_size()?)?;
        Ok(())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Device path of the shell's terminal.
    pub fn slave_path(&self) -> Option<&Path> {
        self.pty.as_ref().and_then(ShellPty::slave_path)
    }

    pub fn shell_pid(&self) -> Option<u32> {
        self.pty.as_ref().and_then(ShellPty::process_id)
    }

    /// Attach a loaded script. A session plays exactly one script.
    pub fn attach_script(&self, script: SessionScript) -> Result<(), SessionError> {
        self.state.attach_script(script)
    }

    /// Play the script to the end, loading it from the configured path if
    /// none was attached.
    pub fn run(&mut self) -> Outcome {
        if self.state.script().is_none() {
            if let Err(err) = self.load_script() {
                return Outcome::Failure(err);
            }
        }
        let Some(pty) = self.pty.as_mut() else {
            return Outcome::Failure(SessionError::Pty("session already shut down".to_string()));
        };

        let keys = StdinKeys::new(KeyTree::with_default_sequences());
        Engine::new(Arc::clone(&self.state), keys, pty)
            .with_bindings(self.config.bindings.clone())
            .with_typing(self.config.typing)
            .with_setup_commands(self.config.setup_commands.clone())
            .with_cleanup_commands(self.config.cleanup_commands.clone())
            .with_output_dir(self.config.output_dir.clone())
            .with_signal_handling(true)
            .run()
    }

    fn load_script(&self) -> Result<(), SessionError> {
        let path = self
            .config
            .script_path
            .as_ref()
            .ok_or_else(|| SessionError::Script("no session file given".to_string()))?;
        let mut script = SessionScript::with_context(self.config.context.clone());
        script.load(path)?;
        self.state.attach_script(script)
    }

    /// Stop the threads, close the pty, restore the terminal and signal
    /// handlers, and kill the shell. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.state.request_shutdown();
        for handle in [self.relay.take(), self.responder.take()].into_iter().flatten() {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!("{name} thread panicked");
            }
        }

        let child = self.pty.take().map(ShellPty::close);

        if let Some(mut guard) = self.raw_mode.take() {
            if let Err(err) = guard.restore() {
                tracing::error!("{err}");
            }
        }
        if self.signals_installed {
            signals::restore();
            self.signals_installed = false;
        }
        if let Some(mut child) = child {
            pty::terminate(child.as_mut());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
