//! [`Skip`] and [`Resume`] directives: bracket script lines that should not
//! be typed.
//!
//! Script syntax:
//! ```text
//! # SKIP
//! make clean
//! # RESUME
//! ```
//!
//! Directives between the two still run.

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;

/// Stop delivering lines until the next [`Resume`].
pub struct Skip;

impl Skip {
    pub const NAME: &'static str = "SKIP";
    pub const ALIASES: &'static [&'static str] = &["S"];
}

impl Directive for Skip {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(_argument: &str) -> Result<Self, SessionError> {
        Ok(Self)
    }

    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        ctx.state().set_skipping(true);
        Ok(Flow::Continue)
    }
}

/// Deliver lines again after a [`Skip`].
pub struct Resume;

impl Resume {
    pub const NAME: &'static str = "RESUME";
    pub const ALIASES: &'static [&'static str] = &["RS"];
}

impl Directive for Resume {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(_argument: &str) -> Result<Self, SessionError> {
        Ok(Self)
    }

    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        ctx.state().set_skipping(false);
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
    fn test_skip_then_resume() {
        let state = SessionState::default();
        let mut keys = ScriptedKeys::default();
        let mut ctx = Context::new(&state, &mut keys, 0, Path::new("."));

        assert_eq!(Skip.execute(&mut ctx).unwrap(), Flow::Continue);
        assert!(state.is_skipping());
        let mut ctx = Context::new(&state, &mut keys, 1, Path::new("."));
        Resume.execute(&mut ctx).unwrap();
        assert!(!state.is_skipping());
    }
}
