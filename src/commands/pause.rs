//! [`Pause`] directive: hold playback for a fixed time.
//!
//! Script syntax: `# PAUSE: 5` (tenths of a second), `# PAUSE: 500ms` or
//! `# PAUSE: 1.5s`.

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;
use crate::parser::parse_duration;
use std::time::Duration;

/// Sleeps before the next script line is processed.
pub struct Pause {
    pub duration: Duration,
}

impl Pause {
    pub const NAME: &'static str = "PAUSE";
    pub const ALIASES: &'static [&'static str] = &["PA"];
}

impl Directive for Pause {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(argument: &str) -> Result<Self, SessionError> {
        let argument = argument.trim();
        if argument.is_empty() {
            return Err(SessionError::Script("PAUSE needs a duration".to_string()));
        }
        let duration = match argument.parse::<u64>() {
            Ok(tenths) => tenths
                .checked_mul(100)
                .map(Duration::from_millis)
                .ok_or_else(|| SessionError::Script(format!("PAUSE too long: {argument}")))?,
            Err(_) => parse_duration(argument)?,
        };
        Ok(Self { duration })
    }

    fn execute(&self, _ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        std::thread::sleep(self.duration);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tenths() {
        assert_eq!(Pause::parse("5").unwrap().duration, Duration::from_millis(500));
        assert_eq!(Pause::parse("0").unwrap().duration, Duration::ZERO);
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(
            Pause::parse("500ms").unwrap().duration,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(
            Pause::parse("1.5s").unwrap().duration,
            Duration::from_secs_f64(1.5)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Pause::parse("abc").is_err());
        assert!(Pause::parse("5minutes").is_err());
        assert!(Pause::parse("").is_err());
        assert!(Pause::parse("184467440737095517").is_err());
        assert!(Pause::parse(&u64::MAX.to_string()).is_err());
    }
}
