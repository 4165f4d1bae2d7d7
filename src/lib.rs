//! # ttypace
//!
//! Play a prepared shell script into a live interactive shell, one keystroke
//! at a time.
//!
//! ttypace starts your shell on a pseudoterminal and puts your own terminal
//! in raw mode. Whatever you type is replaced by the next character of the
//! script, so a live demo looks hand-typed while never containing a typo.
//! Shell output is relayed back to your screen as it arrives.
//!
//! ## Quick start
//!
//! ```no_run
//! use ttypace::{Session, SessionConfig};
//!
//! fn main() -> Result<(), ttypace::SessionError> {
//!     let config = SessionConfig {
//!         script_path: Some("demo.sh".into()),
//!         monitor_port: Some(3000),
//!         ..SessionConfig::default()
//!     };
//!
//!     let mut session = Session::new(config)?;
//!     let outcome = session.run();
//!     session.shutdown();
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
//!
//! ## Input modes
//!
//! | Mode | Keys do |
//! |------|---------|
//! | Insert | any key sends the next script character, `Enter` finishes the line, `Esc` enters Command mode |
//! | Command | `i`/`p`/`a` switch mode, `j`/`k` move between lines, `s`/`v`/`o` control shell output, `q` quits |
//! | Passthrough | keys go straight to the shell until `Ctrl-D` |
//! | Auto | the script types itself; `s` waits after each line, `f` never waits |
//!
//! Every binding can be changed with `CODE=<Mode>_<Action>` assignments, see
//! [`keybindings`].
//!
//! ## Script directives
//!
//! A line consisting only of `# NAME` or `# NAME:argument` is a directive.
//! It is executed instead of being typed.
//!
//! | Directive | Description |
//! |-----------|-------------|
//! | `# PAUSE:5` | Wait half a second (`500ms`, `1.5s` also accepted) |
//! | `# WAIT` | Wait for any key |
//! | `# INSERT`, `# COMMAND`, `# PASSTHROUGH`, `# AUTO` | Switch input mode |
//! | `# STDOUT`, `# NOSTDOUT` | Show or hide shell output |
//! | `# SKIP` ... `# RESUME` | Drop the lines in between |
//! | `# RUN:make test` | Run a command out of band, capturing its output to files |
//! | `# INCLUDE:other.sh` | Splice another script in at load time |
//! | `# COMMENT:text` | Nothing |
//! | `# EXIT` | End the session |
//!
//! Script lines may contain `%NAME%` placeholders, filled from the
//! context given with `-v NAME=VALUE` or the `[context]` config table.
//!
//! ## Monitoring
//!
//! With a monitor port set, any UDP datagram sent to `127.0.0.1:<port>` is
//! answered with a JSON [`monitor::StatusSnapshot`]. Use it to drive a
//! teleprompter on a second screen.
//!
//! ## Implementing a custom directive
//!
//! Implement [`Directive`] and register it in [`parser`]:
//!
//! ```no_run
//! use ttypace::command::{Context, Directive, Flow};
//! use ttypace::SessionError;
//!
//! pub struct Bell;
//!
//! impl Bell {
//!     pub const NAME: &'static str = "BELL";
//!     pub const ALIASES: &'static [&'static str] = &["B"];
//! }
//!
//! impl Directive for Bell {
//!     fn name(&self) -> &'static str { Self::NAME }
//!
//!     fn parse(_argument: &str) -> Result<Self, SessionError> {
//!         Ok(Self)
//!     }
//!
//!     fn execute(&self, _ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
//!         print!("\x07");
//!         Ok(Flow::Continue)
//!     }
//! }
//! ```

pub mod command;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod keybindings;
pub mod keytree;
pub mod monitor;
pub mod parser;
pub mod pty;
pub(crate) mod relay;
pub mod script;
pub mod session;
pub mod signals;
pub mod state;
pub mod template;
pub mod terminal;
pub mod typing;

pub use command::{Context, Directive, Flow};
pub use config::ConfigFile;
pub use engine::{Engine, ShellPort};
pub use error::{Outcome, SessionError};
pub use keybindings::{Action, Keybindings};
pub use script::SessionScript;
pub use session::{Session, SessionConfig};
pub use state::{AutoPilotMode, InputMode, SessionState};
pub use typing::TypingConfig;
