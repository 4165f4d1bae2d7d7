//! [`Stdout`] and [`NoStdout`] directives: show or hide the shell's output.
//!
//! Script syntax: `# NOSTDOUT` before noisy setup lines, `# STDOUT` after.

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;
use crate::state::OutputMode;

pub struct Stdout;

impl Stdout {
    pub const NAME: &'static str = "STDOUT";
    pub const ALIASES: &'static [&'static str] = &["SO"];
}

impl Directive for Stdout {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(_argument: &str) -> Result<Self, SessionError> {
        Ok(Self)
    }

    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        ctx.state().set_output_mode(OutputMode::All);
        Ok(Flow::Continue)
    }
}

/// Drop everything the shell prints until [`Stdout`].
pub struct NoStdout;

impl NoStdout {
    pub const NAME: &'static str = "NOSTDOUT";
    pub const ALIASES: &'static [&'static str] = &["NS"];
}

impl Directive for NoStdout {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(_argument: &str) -> Result<Self, SessionError> {
        Ok(Self)
    }

    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        ctx.state().set_output_mode(OutputMode::None);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedKeys;
    use crate::state::SessionState;
    use std::path::Path;

    #[test]
    fn test_toggle_output() {
        let state = SessionState::default();
        let mut keys = ScriptedKeys::default();
        let mut ctx = Context::new(&state, &mut keys, 0, Path::new("."));

        NoStdout.execute(&mut ctx).unwrap();
        assert_eq!(state.output_mode(), OutputMode::None);
        let mut ctx = Context::new(&state, &mut keys, 0, Path::new("."));
        Stdout.execute(&mut ctx).unwrap();
        assert_eq!(state.output_mode(), OutputMode::All);
    }
}
