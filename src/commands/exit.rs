//! [`Exit`] directive: end the session at this point of the script.
//!
//! Script syntax: `# EXIT`

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;

pub struct Exit;

impl Exit {
    pub const NAME: &'static str = "EXIT";
    pub const ALIASES: &'static [&'static str] = &["X"];
}

impl Directive for Exit {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(_argument: &str) -> Result<Self, SessionError> {
        Ok(Self)
    }

    fn execute(&self, _ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        Ok(Flow::Exit)
    }
}
