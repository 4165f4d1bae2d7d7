//! [`Include`] directive: splice another script file in place.
//!
//! Script syntax: `# INCLUDE: parts/setup.sh`
//!
//! Includes are expanded by [`SessionScript::load`](crate::script::SessionScript::load),
//! relative to the including file. A surviving include line (for example in
//! a script built with `from_lines`) does nothing at playback.

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;
use std::path::PathBuf;

pub struct Include {
    pub path: PathBuf,
}

impl Include {
    pub const NAME: &'static str = "INCLUDE";
    pub const ALIASES: &'static [&'static str] = &["IN", "INC"];
}

impl Directive for Include {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(argument: &str) -> Result<Self, SessionError> {
        let path = argument.trim().trim_matches('"');
        if path.is_empty() {
            return Err(SessionError::Script("INCLUDE needs a file name".to_string()));
        }
        Ok(Self { path: path.into() })
    }

    fn execute(&self, _ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        tracing::debug!("include of {} was not expanded at load", self.path.display());
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_quotes() {
        assert_eq!(
            Include::parse("\"parts/a b.sh\"").unwrap().path,
            PathBuf::from("parts/a b.sh")
        );
        assert!(Include::parse("").is_err());
    }
}
