//! [`Run`] directive: run a helper command outside the presented shell.
//!
//! Script syntax: `# RUN: ./prepare-demo-data.sh`
//!
//! The command runs through `sh -c` and playback waits for it. Its stdout and
//! stderr are captured to `<line>-<label>.out` and `<line>-<label>.err` in the
//! session's output directory.

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct Run {
    pub command: String,
}

impl Run {
    pub const NAME: &'static str = "RUN";
    pub const ALIASES: &'static [&'static str] = &["R"];

    /// `command` with every character outside `[A-Za-z0-9._-]` replaced by `_`.
    pub fn label(&self) -> String {
        self.command
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Paths of the captured stdout and stderr for the directive at `line_index`.
    pub fn capture_paths(&self, output_dir: &Path, line_index: usize) -> (PathBuf, PathBuf) {
        let stem = format!("{line_index}-{}", self.label());
        (
            output_dir.join(format!("{stem}.out")),
            output_dir.join(format!("{stem}.err")),
        )
    }
}

impl Directive for Run {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(argument: &str) -> Result<Self, SessionError> {
        let command = argument.trim();
        if command.is_empty() {
            return Err(SessionError::Script("RUN needs a command".to_string()));
        }
        Ok(Self {
            command: command.to_string(),
        })
    }

    fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
        let (out_path, err_path) = self.capture_paths(ctx.output_dir(), ctx.line_index());
        let stdout = File::create(&out_path)?;
        let stderr = File::create(&err_path)?;

        tracing::debug!("running '{}' -> {}", self.command, out_path.display());
        let status = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|e| SessionError::Process(format!("cannot run '{}': {e}", self.command)))?;

        if !status.success() {
            tracing::warn!("'{}' exited with {status}", self.command);
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedKeys;
    use crate::state::SessionState;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_requires_command() {
        assert!(Run::parse("").is_err());
        assert!(Run::parse("   ").is_err());
        assert_eq!(Run::parse(" echo hi ").unwrap().command, "echo hi");
    }

    #[test]
    fn test_label_is_sanitized() {
        let run = Run::parse("ls -l /tmp | wc").unwrap();
        assert_eq!(run.label(), "ls_-l__tmp___wc");
        let (out, err) = run.capture_paths(Path::new("logs"), 7);
        assert_eq!(out, Path::new("logs/7-ls_-l__tmp___wc.out"));
        assert_eq!(err, Path::new("logs/7-ls_-l__tmp___wc.err"));
    }

    #[test]
    fn test_captures_output() {
        let dir = TempDir::new().unwrap();
        let state = SessionState::default();
        let mut keys = ScriptedKeys::default();
        let mut ctx = Context::new(&state, &mut keys, 3, dir.path());

        let run = Run::parse("echo out; echo err >&2").unwrap();
        assert_eq!(run.execute(&mut ctx).unwrap(), Flow::Continue);

        let (out, err) = run.capture_paths(dir.path(), 3);
        assert_eq!(fs::read_to_string(out).unwrap(), "out\n");
        assert_eq!(fs::read_to_string(err).unwrap(), "err\n");
    }

    #[test]
    fn test_failing_command_continues() {
        let dir = TempDir::new().unwrap();
        let state = SessionState::default();
        let mut keys = ScriptedKeys::default();
        let mut ctx = Context::new(&state, &mut keys, 0, dir.path());
        let run = Run::parse("exit 4").unwrap();
        assert_eq!(run.execute(&mut ctx).unwrap(), Flow::Continue);
    }
}
