//! [`Comment`] directive: a note in the script that is never typed.
//!
//! Script syntax: `# COMMENT: explain the next step`

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;

/// A line kept for the presenter's benefit. Does nothing at playback.
pub struct Comment {
    pub text: String,
}

impl Comment {
    pub const NAME: &'static str = "COMMENT";
    pub const ALIASES: &'static [&'static str] = &["C"];
}

impl Directive for Comment {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(argument: &str) -> Result<Self, SessionError> {
        Ok(Self {
            text: argument.to_string(),
        })
    }

    fn execute(&self, _ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        tracing::debug!("comment: {}", self.text);
        Ok(Flow::Continue)
    }
}
