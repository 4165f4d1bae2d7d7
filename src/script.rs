//! The session script: the ordered lines a session plays into the shell.

use crate::commands::Include;
use crate::error::SessionError;
use crate::parser::parse_directive;
use crate::template::{TemplateContext, render};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Script lines plus the template context used to render them.
///
/// Lines are rendered while loading. If the context is filled in afterwards,
/// call [`render`](Self::render) to apply it.
#[derive(Debug, Clone)]
pub struct SessionScript {
    lines: Vec<String>,
    context: TemplateContext,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self::with_context(TemplateContext::new())
    }
}

impl SessionScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: TemplateContext) -> Self {
        Self {
            lines: Vec::new(),
            context,
        }
    }

    /// A script made of the given lines, without rendering them.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = Self::default();
        script.lines = lines.into_iter().map(Into::into).collect();
        script
    }

    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut TemplateContext {
        &mut self.context
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append the lines of the script at `path`.
    ///
    /// Each line is rendered, then checked for an `INCLUDE` directive. An
    /// included file is resolved relative to the including file's directory
    /// and its lines are spliced in place of the directive.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Script`] if a file is missing, is a directory,
    /// cannot be read, or includes itself directly or transitively.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let mut lines = Vec::new();
        let mut stack = Vec::new();
        self.load_into(path.as_ref(), &mut lines, &mut stack)?;
        self.lines.extend(lines);
        Ok(())
    }

    /// Re-apply the context to every line.
    pub fn render(&mut self) {
        let rendered: Vec<String> = self.lines.iter().map(|line| self.render_line(line)).collect();
        self.lines = rendered;
    }

    fn render_line(&self, line: &str) -> String {
        render(line, &self.context)
    }

    fn load_into(
        &self,
        path: &Path,
        lines: &mut Vec<String>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<(), SessionError> {
        if !path.exists() || path.is_dir() {
            return Err(SessionError::Script(format!(
                "no such script file: {}",
                path.display()
            )));
        }
        let canonical = path.canonicalize().map_err(|e| {
            SessionError::Script(format!("cannot resolve {}: {e}", path.display()))
        })?;
        if stack.contains(&canonical) {
            return Err(SessionError::Script(format!(
                "include cycle through {}",
                path.display()
            )));
        }
        tracing::debug!("loading script file {}", path.display());

        let file = File::open(path)
            .map_err(|e| SessionError::Script(format!("cannot open {}: {e}", path.display())))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        stack.push(canonical);
        for raw in BufReader::new(file).lines() {
            let raw = raw
                .map_err(|e| SessionError::Script(format!("cannot read {}: {e}", path.display())))?;
            let line = self.render_line(&raw);
            match parse_directive(&line) {
                Some((Include::NAME, target)) => {
                    let target = target.trim_matches('"');
                    self.load_into(&base_dir.join(target), lines, stack)?;
                }
                _ => lines.push(line),
            }
        }
        stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file() {
        let err = SessionScript::new().load("definitely-missing.sh").unwrap_err();
        assert!(matches!(err, SessionError::Script(_)));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = SessionScript::new().load(dir.path()).unwrap_err();
        assert!(matches!(err, SessionError::Script(_)));
    }

    #[test]
    fn test_load_simple_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "simple.sh", "ls\npwd\nwho\n");

        let mut script = SessionScript::new();
        script.load(&path).unwrap();
        assert_eq!(script.lines(), ["ls", "pwd", "who"]);
    }

    #[test]
    fn test_load_renders_template() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "template.sh", "%cmd1%\nls\n%cmd2%\n%cmd1%\n%x%\n");

        let mut script = SessionScript::new();
        script.context_mut().insert("cmd1".into(), "pwd".into());
        script.context_mut().insert("cmd2".into(), "who".into());
        script.load(&path).unwrap();

        assert_eq!(script.lines(), ["pwd", "ls", "who", "pwd", "%x%"]);
    }

    #[test]
    fn test_render_after_load() {
        let mut script = SessionScript::from_lines(["first", "%second%", "%third%"]);
        script.context_mut().insert("second".into(), "2".into());
        script.context_mut().insert("third".into(), "3".into());
        assert_eq!(script.lines(), ["first", "%second%", "%third%"]);

        script.render();
        assert_eq!(script.lines(), ["first", "2", "3"]);
        script.render();
        assert_eq!(script.lines(), ["first", "2", "3"]);
    }

    #[test]
    fn test_include_is_spliced_transitively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("parts")).unwrap();
        write(&dir, "parts/inner.sh", "inner %who%\n");
        write(&dir, "parts/middle.sh", "middle\n# INCLUDE: inner.sh\n");
        let main = write(&dir, "main.sh", "first\n# INC:parts/middle.sh\nlast\n");

        let mut script = SessionScript::new();
        script.context_mut().insert("who".into(), "me".into());
        script.load(&main).unwrap();

        assert_eq!(script.lines(), ["first", "middle", "inner me", "last"]);
    }

    #[test]
    fn test_include_target_can_be_templated() {
        let dir = TempDir::new().unwrap();
        write(&dir, "setup-prod.sh", "deploy\n");
        let main = write(&dir, "main.sh", "# INCLUDE:setup-%env%.sh\n");

        let mut script = SessionScript::new();
        script.context_mut().insert("env".into(), "prod".into());
        script.load(&main).unwrap();
        assert_eq!(script.lines(), ["deploy"]);
    }

    #[test]
    fn test_include_cycle_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.sh", "a\n# INCLUDE:b.sh\n");
        write(&dir, "b.sh", "b\n# INCLUDE:a.sh\n");

        let err = SessionScript::new().load(dir.path().join("a.sh")).unwrap_err();
        assert!(err.to_string().contains("cycle"), "got: {err}");
    }

    #[test]
    fn test_same_file_included_twice_is_not_a_cycle() {
        let dir = TempDir::new().unwrap();
        write(&dir, "part.sh", "part\n");
        let main = write(&dir, "main.sh", "# INCLUDE:part.sh\n# INCLUDE:part.sh\n");

        let mut script = SessionScript::new();
        script.load(&main).unwrap();
        assert_eq!(script.lines(), ["part", "part"]);
    }

    #[test]
    fn test_missing_include_fails_load() {
        let dir = TempDir::new().unwrap();
        let main = write(&dir, "main.sh", "ls\n# INCLUDE:nope.sh\n");
        assert!(SessionScript::new().load(&main).is_err());
    }
}
