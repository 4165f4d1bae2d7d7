//! Error taxonomy and the [`Outcome`] a session run ends with.

use std::io;
use thiserror::Error;

/// Everything that can go wrong while setting up or driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening or configuring the pseudoterminal failed.
    #[error("pseudoterminal error: {0}")]
    Pty(String),

    /// Spawning or signalling the shell failed.
    #[error("process error: {0}")]
    Process(String),

    /// Reading or changing the controlling terminal's attributes failed.
    #[error("terminal error: {0}")]
    Terminal(String),

    /// The script (or one of its includes) is missing or unreadable.
    #[error("script error: {0}")]
    Script(String),

    /// The monitor socket could not be bound or served.
    #[error("monitor socket error: {0}")]
    Socket(String),

    /// A configuration value could not be understood.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How a session run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The script finished, an `EXIT` directive ran, or the operator quit.
    NormalExit,
    /// The operator interrupted the session or closed its input.
    EarlyExit,
    /// Playback stopped on an error.
    Failure(SessionError),
}

impl Outcome {
    /// Process exit code the binary reports for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::NormalExit => 0,
            Outcome::EarlyExit => 1,
            Outcome::Failure(_) => 2,
        }
    }
}

impl From<Result<Outcome, SessionError>> for Outcome {
    fn from(result: Result<Outcome, SessionError>) -> Self {
        result.unwrap_or_else(Outcome::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::NormalExit.exit_code(), 0);
        assert_eq!(Outcome::EarlyExit.exit_code(), 1);
        assert_eq!(
            Outcome::Failure(SessionError::Script("missing".into())).exit_code(),
            2
        );
    }

    #[test]
    fn test_from_result() {
        let outcome: Outcome = Err(SessionError::Pty("no pty".into())).into();
        assert!(matches!(outcome, Outcome::Failure(SessionError::Pty(_))));
    }
}
