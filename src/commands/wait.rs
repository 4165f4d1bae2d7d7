//! [`WaitForKey`] directive: hold playback until the operator presses a key.
//!
//! Script syntax: `# WAIT`

use crate::command::{Context, Directive, Flow, Key};
use crate::error::SessionError;

pub struct WaitForKey;

impl WaitForKey {
    pub const NAME: &'static str = "WAIT";
    pub const ALIASES: &'static [&'static str] = &["W"];
}

impl Directive for WaitForKey {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(_argument: &str) -> Result<Self, SessionError> {
        Ok(Self)
    }

    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        match ctx.wait_for_key()? {
            Key::Pressed(key) => tracing::debug!("wait released by {key:?}"),
            Key::Closed => tracing::debug!("wait released by end of input"),
            Key::Signalled(signal) => return Ok(Flow::Interrupted(signal)),
        }
        Ok(Flow::Continue)
    }
}
