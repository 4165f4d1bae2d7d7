//! Recognizer for inline script directives.
//!
//! A directive is a script line of the form `# NAME` or `# NAME: argument`.
//! Every other line, including ordinary shell comments, is typed into the
//! shell as-is. The top-level entry points are [`parse_directive`] and
//! [`build_directive`].

use crate::command::Directive;
use crate::commands::{
    AutoMode, CommandMode, Comment, Exit, Include, InsertMode, NoStdout, PassthroughMode, Pause,
    Resume, Run, Skip, Stdout, WaitForKey,
};
use crate::error::SessionError;
use std::time::Duration;

/// The character that introduces a directive.
pub const MARKER: char = '#';

type ParseFn = fn(&str) -> Result<Box<dyn Directive>, SessionError>;

static REGISTRY: &[(&str, &[&str], ParseFn)] = &[
    (Comment::NAME, Comment::ALIASES, Comment::parse_boxed),
    (Run::NAME, Run::ALIASES, Run::parse_boxed),
    (Exit::NAME, Exit::ALIASES, Exit::parse_boxed),
    (Skip::NAME, Skip::ALIASES, Skip::parse_boxed),
    (Resume::NAME, Resume::ALIASES, Resume::parse_boxed),
    (PassthroughMode::NAME, PassthroughMode::ALIASES, PassthroughMode::parse_boxed),
    (InsertMode::NAME, InsertMode::ALIASES, InsertMode::parse_boxed),
    (AutoMode::NAME, AutoMode::ALIASES, AutoMode::parse_boxed),
    (CommandMode::NAME, CommandMode::ALIASES, CommandMode::parse_boxed),
    (Pause::NAME, Pause::ALIASES, Pause::parse_boxed),
    (Stdout::NAME, Stdout::ALIASES, Stdout::parse_boxed),
    (NoStdout::NAME, NoStdout::ALIASES, NoStdout::parse_boxed),
    (Include::NAME, Include::ALIASES, Include::parse_boxed),
    (WaitForKey::NAME, WaitForKey::ALIASES, WaitForKey::parse_boxed),
];

/// Split a directive line into its canonical name and argument.
///
/// The name is matched exactly against the registered names and aliases and
/// resolved to the canonical name. The argument is everything after the first
/// `:`, trimmed, or empty when there is no `:`. Returns `None` for any line
/// that is not a directive.
///
/// # Example
///
/// ```
/// use ttypace::parser::parse_directive;
///
/// assert_eq!(parse_directive("# PA: 5"), Some(("PAUSE", "5".to_string())));
/// assert_eq!(parse_directive("# just a comment"), None);
/// ```
pub fn parse_directive(line: &str) -> Option<(&'static str, String)> {
    let rest = line.trim_start().strip_prefix(MARKER)?.trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == ':')
        .unwrap_or(rest.len());
    let (word, rest) = rest.split_at(end);
    let name = canonical_name(word)?;

    let rest = rest.trim_start();
    let argument = if rest.is_empty() {
        String::new()
    } else {
        rest.strip_prefix(':')?.trim().to_string()
    };
    Some((name, argument))
}

/// Whether `line` is a recognized directive.
pub fn is_directive(line: &str) -> bool {
    parse_directive(line).is_some()
}

/// Build the directive registered under `name` (canonical or alias).
///
/// To add a new directive, add one entry to `REGISTRY` using the directive's
/// `NAME` and `ALIASES` constants and its `parse_boxed` function pointer.
pub fn build_directive(name: &str, argument: &str) -> Result<Box<dyn Directive>, SessionError> {
    REGISTRY
        .iter()
        .find(|(canonical, aliases, _)| *canonical == name || aliases.contains(&name))
        .map(|(_, _, parse)| parse(argument))
        .unwrap_or_else(|| Err(SessionError::Script(format!("unknown directive: {name}"))))
}

/// Canonical names and aliases of every directive, in registry order.
pub fn directive_names() -> impl Iterator<Item = (&'static str, &'static [&'static str])> {
    REGISTRY.iter().map(|(name, aliases, _)| (*name, *aliases))
}

fn canonical_name(word: &str) -> Option<&'static str> {
    REGISTRY
        .iter()
        .find(|(canonical, aliases, _)| *canonical == word || aliases.contains(&word))
        .map(|(canonical, _, _)| *canonical)
}

/// Parse a duration string: `1s`, `500ms`, `1.5s`.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, SessionError> {
    let s = s.trim();
    let invalid = |what: &str| SessionError::Script(format!("invalid {what} value: {s}"));
    if let Some(ms_str) = s.strip_suffix("ms") {
        let ms: u64 = ms_str.trim().parse().map_err(|_| invalid("milliseconds"))?;
        Ok(Duration::from_millis(ms))
    } else if let Some(s_str) = s.strip_suffix('s') {
        let secs: f64 = s_str.trim().parse().map_err(|_| invalid("seconds"))?;
        Duration::try_from_secs_f64(secs).map_err(|_| invalid("seconds"))
    } else {
        Err(SessionError::Script(format!(
            "duration must end with 's' or 'ms', got: {s}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(
            parse_duration("1.5s").unwrap(),
            Duration::from_secs_f64(1.5)
        );
        assert!(parse_duration("5minutes").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn test_recognizes_names_and_aliases() {
        assert_eq!(parse_directive("# EXIT"), Some(("EXIT", String::new())));
        assert_eq!(parse_directive("#X"), Some(("EXIT", String::new())));
        assert_eq!(parse_directive("   #  INC : part.sh "), Some(("INCLUDE", "part.sh".into())));
        assert_eq!(parse_directive("# IN:part.sh"), Some(("INCLUDE", "part.sh".into())));
        assert_eq!(parse_directive("# RS"), Some(("RESUME", String::new())));
    }

    #[test]
    fn test_argument_is_everything_after_first_colon() {
        assert_eq!(
            parse_directive("# RUN: date +%H:%M"),
            Some(("RUN", "date +%H:%M".into()))
        );
        assert_eq!(parse_directive("# COMMENT:"), Some(("COMMENT", String::new())));
    }

    #[test]
    fn test_non_directives() {
        assert_eq!(parse_directive("ls -l"), None);
        assert_eq!(parse_directive("#"), None);
        assert_eq!(parse_directive("# this is a shell comment"), None);
        assert_eq!(parse_directive("# exit"), None);
        assert_eq!(parse_directive("# EXITING"), None);
        // trailing text without a colon leaves the line unconsumed
        assert_eq!(parse_directive("# EXIT now"), None);
        assert_eq!(parse_directive("echo # EXIT"), None);
        assert!(!is_directive(""));
    }

    #[test]
    fn test_every_registered_name_resolves() {
        for (name, aliases) in directive_names() {
            assert_eq!(parse_directive(&format!("# {name}")).map(|d| d.0), Some(name));
            for alias in aliases {
                assert_eq!(parse_directive(&format!("#{alias}")).map(|d| d.0), Some(name));
            }
        }
    }

    #[test]
    fn test_build_directive() {
        assert_eq!(build_directive("PA", "5").unwrap().name(), "PAUSE");
        assert_eq!(build_directive("WAIT", "").unwrap().name(), "WAIT");
        assert!(build_directive("PAUSE", "abc").is_err());
        assert!(build_directive("NOPE", "").is_err());
    }

    #[test]
    fn test_alias_line_builds_canonical() {
        let (name, argument) = parse_directive("# SO").unwrap();
        assert_eq!(build_directive(name, &argument).unwrap().name(), "STDOUT");
        let (name, argument) = parse_directive("# RUN").unwrap();
        assert!(build_directive(name, &argument).is_err());
    }
}
