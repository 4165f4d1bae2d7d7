//! Configuration files.
//!
//! Settings are read from TOML files, searched in this order:
//!
//! 1. every `--config-file` given on the command line, in order
//! 2. `./.ttypace.toml`
//! 3. `%HOME%/.ttypace.toml`
//!
//! Earlier files win for single values; lists are concatenated and tables
//! merged (earlier keys win). Command-line options override all files.
//!
//! ```toml
//! shell = "/bin/bash"
//! monitor_port = 3000
//! auto_pilot = "semi"
//! setup_commands = ["cd /tmp/demo"]
//!
//! [typing]
//! enabled = true
//! min_ms = 20
//! max_ms = 120
//!
//! [context]
//! user = "alice"
//!
//! [keybindings]
//! "106" = "Command_NextLine"
//! ```

use crate::error::SessionError;
use crate::keybindings::Keybindings;
use crate::state::AutoPilotMode;
use crate::template::{TemplateContext, render};
use crate::typing::TypingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working and home directories.
pub const CONFIG_FILE_NAME: &str = ".ttypace.toml";

/// Where the home directory config lives, before template expansion.
pub const HOME_CONFIG_TEMPLATE: &str = "%HOME%/.ttypace.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoPilotSetting {
    Semi,
    Full,
}

impl From<AutoPilotSetting> for AutoPilotMode {
    fn from(setting: AutoPilotSetting) -> Self {
        match setting {
            AutoPilotSetting::Semi => AutoPilotMode::Semi,
            AutoPilotSetting::Full => AutoPilotMode::Full,
        }
    }
}

/// One configuration file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub shell: Option<String>,
    pub monitor_port: Option<u16>,
    pub setup_commands: Vec<String>,
    pub cleanup_commands: Vec<String>,
    /// Executables run before the session starts.
    pub setup_scripts: Vec<String>,
    /// Executables run after the session ends.
    pub cleanup_scripts: Vec<String>,
    pub auto_pilot: Option<AutoPilotSetting>,
    /// Directory for `RUN` directive output.
    pub output_dir: Option<PathBuf>,
    pub typing: TypingSection,
    pub context: BTreeMap<String, String>,
    /// Key code (as a string) to `<Mode>_<Action>` name.
    pub keybindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingSection {
    pub enabled: Option<bool>,
    pub min_ms: Option<u64>,
    pub max_ms: Option<u64>,
    pub pause_ms: Option<u64>,
}

impl ConfigFile {
    pub fn parse(content: &str) -> Result<Self, SessionError> {
        toml::from_str(content).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))
    }

    /// Fold in a lower-priority file.
    pub fn merge(&mut self, other: ConfigFile) {
        self.shell = self.shell.take().or(other.shell);
        self.monitor_port = self.monitor_port.or(other.monitor_port);
        self.auto_pilot = self.auto_pilot.or(other.auto_pilot);
        self.output_dir = self.output_dir.take().or(other.output_dir);

        self.setup_commands.extend(other.setup_commands);
        self.cleanup_commands.extend(other.cleanup_commands);
        self.setup_scripts.extend(other.setup_scripts);
        self.cleanup_scripts.extend(other.cleanup_scripts);

        self.typing.enabled = self.typing.enabled.or(other.typing.enabled);
        self.typing.min_ms = self.typing.min_ms.or(other.typing.min_ms);
        self.typing.max_ms = self.typing.max_ms.or(other.typing.max_ms);
        self.typing.pause_ms = self.typing.pause_ms.or(other.typing.pause_ms);

        for (key, value) in other.context {
            self.context.entry(key).or_insert(value);
        }
        for (key, value) in other.keybindings {
            self.keybindings.entry(key).or_insert(value);
        }
    }

    pub fn typing_config(&self) -> TypingConfig {
        let defaults = TypingConfig::default();
        TypingConfig {
            enabled: self.typing.enabled.unwrap_or(defaults.enabled),
            min: self.typing.min_ms.map_or(defaults.min, Duration::from_millis),
            max: self.typing.max_ms.map_or(defaults.max, Duration::from_millis),
            pause: self.typing.pause_ms.map_or(defaults.pause, Duration::from_millis),
        }
    }

    pub fn auto_pilot_mode(&self) -> AutoPilotMode {
        self.auto_pilot.map(Into::into).unwrap_or_default()
    }

    /// Apply the `[keybindings]` table. Bad entries are skipped and returned
    /// so the caller can report them.
    pub fn apply_keybindings(&self, bindings: &mut Keybindings) -> Vec<SessionError> {
        let mut errors = Vec::new();
        for (code, name) in &self.keybindings {
            let result = code
                .trim()
                .parse::<i32>()
                .map_err(|_| SessionError::Config(format!("key code must be an integer: {code}")))
                .and_then(|code| bindings.add_named(code, name));
            if let Err(err) = result {
                errors.push(err);
            }
        }
        errors
    }
}

/// The files searched after any explicit ones: working directory first,
/// then home.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        let mut context = TemplateContext::new();
        context.insert("HOME".to_string(), home.to_string_lossy().into_owned());
        paths.push(PathBuf::from(render(HOME_CONFIG_TEMPLATE, &context)));
    }
    paths
}

/// Load and merge configuration.
///
/// Explicit files must exist; the default locations are used only when
/// present.
pub fn discover(explicit: &[PathBuf]) -> Result<ConfigFile, SessionError> {
    discover_in(explicit, &default_search_paths())
}

fn discover_in(explicit: &[PathBuf], defaults: &[PathBuf]) -> Result<ConfigFile, SessionError> {
    let mut merged = ConfigFile::default();
    for path in explicit {
        tracing::debug!("reading config {}", path.display());
        merged.merge(ConfigFile::load(path)?);
    }
    for path in defaults.iter().filter(|p| p.is_file()) {
        if explicit.contains(path) {
            continue;
        }
        tracing::debug!("reading config {}", path.display());
        merged.merge(ConfigFile::load(path)?);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keybindings::CommandAction;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_file() {
        let config = ConfigFile::parse(
            r#"
shell = "/bin/zsh"
monitor_port = 3000
auto_pilot = "semi"
setup_commands = ["cd /tmp"]

[typing]
enabled = true
min_ms = 20
max_ms = 60

[context]
user = "alice"

[keybindings]
"110" = "Command_NextLine"
"#,
        )
        .unwrap();

        assert_eq!(config.shell.as_deref(), Some("/bin/zsh"));
        assert_eq!(config.monitor_port, Some(3000));
        assert_eq!(config.auto_pilot_mode(), AutoPilotMode::Semi);
        assert_eq!(config.setup_commands, ["cd /tmp"]);
        assert_eq!(config.context["user"], "alice");

        let typing = config.typing_config();
        assert!(typing.enabled);
        assert_eq!(typing.min, Duration::from_millis(20));
        assert_eq!(typing.max, Duration::from_millis(60));
        assert_eq!(typing.pause, TypingConfig::default().pause);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let err = ConfigFile::parse("monitor_port = \"many\"").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn test_merge_precedence() {
        let mut first = ConfigFile::parse(
            "shell = \"first\"\nsetup_commands = [\"a\"]\n[context]\nx = \"1\"\n",
        )
        .unwrap();
        let second = ConfigFile::parse(
            "shell = \"second\"\nmonitor_port = 9\nsetup_commands = [\"b\"]\n[context]\nx = \"2\"\ny = \"3\"\n",
        )
        .unwrap();
        first.merge(second);

        assert_eq!(first.shell.as_deref(), Some("first"));
        assert_eq!(first.monitor_port, Some(9));
        assert_eq!(first.setup_commands, ["a", "b"]);
        assert_eq!(first.context["x"], "1");
        assert_eq!(first.context["y"], "3");
    }

    #[test]
    fn test_keybinding_overrides() {
        let config = ConfigFile::parse(
            "[keybindings]\n\"110\" = \"Command_NextLine\"\n\"111\" = \"Command_Jump\"\nnope = \"Command_Quit\"\n",
        )
        .unwrap();
        let mut bindings = Keybindings::default();
        let errors = config.apply_keybindings(&mut bindings);

        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, SessionError::Config(_))));
        assert_eq!(bindings.get::<CommandAction>(110).0, CommandAction::NextLine);
        assert_eq!(bindings.get::<CommandAction>(111).0, CommandAction::ToggleStdout);
    }

    #[test]
    fn test_discover_order() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let local = dir.path().join("local.toml");
        let missing = dir.path().join("missing.toml");
        fs::write(&explicit, "shell = \"explicit\"\n").unwrap();
        fs::write(&local, "shell = \"local\"\nmonitor_port = 4000\n").unwrap();

        let config = discover_in(&[explicit.clone()], &[local, missing.clone()]).unwrap();
        assert_eq!(config.shell.as_deref(), Some("explicit"));
        assert_eq!(config.monitor_port, Some(4000));

        assert!(discover_in(&[missing], &[]).is_err());
    }

    #[test]
    fn test_home_path_is_expanded() {
        let paths = default_search_paths();
        assert_eq!(paths[0], Path::new(".").join(CONFIG_FILE_NAME));
        assert!(paths.iter().all(|p| !p.to_string_lossy().contains("%HOME%")));
    }
}
