//! Per-mode key bindings and the name table used to configure them.
//!
//! Every input mode has its own action enum with a `None` sentinel that
//! unmapped keys resolve to. Bindings are configured by name, using
//! `<Mode>_<Action>` strings such as `Command_NextLine`.

use crate::error::SessionError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertAction {
    None,
    Return,
    BackOneCharacter,
    SwitchToCommandMode,
    /// Swallow the key without returning to the caller.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandAction {
    None,
    SwitchToInsertMode,
    SwitchToPassthroughMode,
    SwitchToAutoMode,
    Quit,
    Return,
    ResizeWindow,
    NextLine,
    PrevLine,
    TurnOffStdout,
    TurnOnStdout,
    ToggleStdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassthroughAction {
    None,
    SwitchToCommandMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoAction {
    None,
    SwitchToCommandMode,
    SwitchToFullAuto,
    SwitchToSemiAuto,
    Return,
}

/// An action from any mode's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert(InsertAction),
    Command(CommandAction),
    Passthrough(PassthroughAction),
    Auto(AutoAction),
}

static ACTION_NAMES: &[(&str, Action)] = &[
    ("Insert_None", Action::Insert(InsertAction::None)),
    ("Insert_Return", Action::Insert(InsertAction::Return)),
    ("Insert_BackOneCharacter", Action::Insert(InsertAction::BackOneCharacter)),
    ("Insert_SwitchToCommandMode", Action::Insert(InsertAction::SwitchToCommandMode)),
    ("Insert_Disabled", Action::Insert(InsertAction::Disabled)),
    ("Command_None", Action::Command(CommandAction::None)),
    ("Command_SwitchToInsertMode", Action::Command(CommandAction::SwitchToInsertMode)),
    ("Command_SwitchToPassthroughMode", Action::Command(CommandAction::SwitchToPassthroughMode)),
    ("Command_SwitchToAutoMode", Action::Command(CommandAction::SwitchToAutoMode)),
    ("Command_Quit", Action::Command(CommandAction::Quit)),
    ("Command_Return", Action::Command(CommandAction::Return)),
    ("Command_ResizeWindow", Action::Command(CommandAction::ResizeWindow)),
    ("Command_NextLine", Action::Command(CommandAction::NextLine)),
    ("Command_PrevLine", Action::Command(CommandAction::PrevLine)),
    ("Command_TurnOffStdout", Action::Command(CommandAction::TurnOffStdout)),
    ("Command_TurnOnStdout", Action::Command(CommandAction::TurnOnStdout)),
    ("Command_ToggleStdout", Action::Command(CommandAction::ToggleStdout)),
    ("Passthrough_None", Action::Passthrough(PassthroughAction::None)),
    ("Passthrough_SwitchToCommandMode", Action::Passthrough(PassthroughAction::SwitchToCommandMode)),
    ("Auto_None", Action::Auto(AutoAction::None)),
    ("Auto_SwitchToCommandMode", Action::Auto(AutoAction::SwitchToCommandMode)),
    ("Auto_SwitchToFullAuto", Action::Auto(AutoAction::SwitchToFullAuto)),
    ("Auto_SwitchToSemiAuto", Action::Auto(AutoAction::SwitchToSemiAuto)),
    ("Auto_Return", Action::Auto(AutoAction::Return)),
];

static BY_NAME: LazyLock<HashMap<&'static str, Action>> =
    LazyLock::new(|| ACTION_NAMES.iter().copied().collect());

static BY_ACTION: LazyLock<HashMap<Action, &'static str>> =
    LazyLock::new(|| ACTION_NAMES.iter().map(|&(name, action)| (action, name)).collect());

impl Action {
    /// Every action of every mode, in table order.
    pub fn all() -> impl Iterator<Item = Action> {
        ACTION_NAMES.iter().map(|&(_, action)| action)
    }

    /// The `<Mode>_<Action>` name of this action.
    pub fn name(self) -> &'static str {
        BY_ACTION.get(&self).copied().unwrap_or("Unknown")
    }

    /// Resolve a `<Mode>_<Action>` name.
    pub fn from_name(name: &str) -> Option<Action> {
        BY_NAME.get(name).copied()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mode-specific action type with its own table in [`Keybindings`].
pub trait ModeAction: Copy + Eq + Into<Action> + 'static {
    /// What an unbound key resolves to.
    const NONE: Self;

    fn table(bindings: &Keybindings) -> &BTreeMap<i32, Self>;

    fn table_mut(bindings: &mut Keybindings) -> &mut BTreeMap<i32, Self>;
}

macro_rules! mode_action {
    ($ty:ident, $variant:ident, $field:ident) => {
        impl From<$ty> for Action {
            fn from(action: $ty) -> Self {
                Action::$variant(action)
            }
        }

        impl ModeAction for $ty {
            const NONE: Self = $ty::None;

            fn table(bindings: &Keybindings) -> &BTreeMap<i32, Self> {
                &bindings.$field
            }

            fn table_mut(bindings: &mut Keybindings) -> &mut BTreeMap<i32, Self> {
                &mut bindings.$field
            }
        }
    };
}

mode_action!(InsertAction, Insert, insert);
mode_action!(CommandAction, Command, command);
mode_action!(PassthroughAction, Passthrough, passthrough);
mode_action!(AutoAction, Auto, auto);

const ESC: i32 = 0x1b;
const DEL: i32 = 0x7f;
const CTRL_D: i32 = 0x04;
const CR: i32 = b'\r' as i32;

/// Key code → action tables, one per input mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybindings {
    insert: BTreeMap<i32, InsertAction>,
    command: BTreeMap<i32, CommandAction>,
    passthrough: BTreeMap<i32, PassthroughAction>,
    auto: BTreeMap<i32, AutoAction>,
}

impl Default for Keybindings {
    fn default() -> Self {
        let mut bindings = Self::empty();

        bindings.add(CR, InsertAction::Return);
        bindings.add(ESC, InsertAction::SwitchToCommandMode);
        bindings.add(DEL, InsertAction::BackOneCharacter);

        bindings.add('i' as i32, CommandAction::SwitchToInsertMode);
        bindings.add('p' as i32, CommandAction::SwitchToPassthroughMode);
        bindings.add('a' as i32, CommandAction::SwitchToAutoMode);
        bindings.add('q' as i32, CommandAction::Quit);
        bindings.add(CR, CommandAction::Return);
        bindings.add('r' as i32, CommandAction::ResizeWindow);
        bindings.add('j' as i32, CommandAction::NextLine);
        bindings.add('k' as i32, CommandAction::PrevLine);
        bindings.add('s' as i32, CommandAction::TurnOffStdout);
        bindings.add('v' as i32, CommandAction::TurnOnStdout);
        bindings.add('o' as i32, CommandAction::ToggleStdout);

        bindings.add(CTRL_D, PassthroughAction::SwitchToCommandMode);

        bindings.add(ESC, AutoAction::SwitchToCommandMode);
        bindings.add('f' as i32, AutoAction::SwitchToFullAuto);
        bindings.add('s' as i32, AutoAction::SwitchToSemiAuto);
        bindings.add(CR, AutoAction::Return);

        bindings
    }
}

impl Keybindings {
    /// Tables with no bindings at all.
    pub fn empty() -> Self {
        Self {
            insert: BTreeMap::new(),
            command: BTreeMap::new(),
            passthrough: BTreeMap::new(),
            auto: BTreeMap::new(),
        }
    }

    /// Bind `code` in `A`'s mode. Returns `true` if a binding was replaced.
    pub fn add<A: ModeAction>(&mut self, code: i32, action: A) -> bool {
        A::table_mut(self).insert(code, action).is_some()
    }

    /// Bind `code` to an action of whichever mode it belongs to.
    pub fn add_action(&mut self, code: i32, action: Action) -> bool {
        match action {
            Action::Insert(a) => self.add(code, a),
            Action::Command(a) => self.add(code, a),
            Action::Passthrough(a) => self.add(code, a),
            Action::Auto(a) => self.add(code, a),
        }
    }

    /// Bind `code` to the action called `name` (e.g. `Insert_Return`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an unknown name; existing bindings
    /// are left untouched.
    pub fn add_named(&mut self, code: i32, name: &str) -> Result<bool, SessionError> {
        let action = Action::from_name(name)
            .ok_or_else(|| SessionError::Config(format!("unknown key binding action: {name}")))?;
        Ok(self.add_action(code, action))
    }

    /// The action bound to `code` in `A`'s mode and whether a binding exists.
    pub fn get<A: ModeAction>(&self, code: i32) -> (A, bool) {
        match A::table(self).get(&code) {
            Some(&action) => (action, true),
            None => (A::NONE, false),
        }
    }

    /// Every binding as `(code, action)`, grouped by mode.
    pub fn entries(&self) -> Vec<(i32, Action)> {
        let mut entries = Vec::new();
        entries.extend(self.insert.iter().map(|(&k, &a)| (k, a.into())));
        entries.extend(self.command.iter().map(|(&k, &a)| (k, a.into())));
        entries.extend(self.passthrough.iter().map(|(&k, &a)| (k, a.into())));
        entries.extend(self.auto.iter().map(|(&k, &a)| (k, a.into())));
        entries
    }
}

/// Split a `CODE=ACTION` assignment such as `106=Command_NextLine`.
pub fn parse_assignment(assignment: &str) -> Result<(i32, String), SessionError> {
    let (code, name) = assignment
        .split_once('=')
        .ok_or_else(|| SessionError::Config(format!("expected CODE=ACTION, got: {assignment}")))?;
    let code = code
        .trim()
        .parse::<i32>()
        .map_err(|_| SessionError::Config(format!("key code must be an integer: {code}")))?;
    Ok((code, name.trim().to_string()))
}

/// Human-readable form of a key code for binding listings.
pub fn describe_key(code: i32) -> String {
    match u8::try_from(code) {
        Ok(b'\r') => "Enter".to_string(),
        Ok(0x1b) => "Esc".to_string(),
        Ok(0x7f) => "Backspace".to_string(),
        Ok(byte @ 0..=0x1f) => format!("Ctrl-{}", (byte + b'@') as char),
        Ok(byte) if byte.is_ascii_graphic() => (byte as char).to_string(),
        _ => format!("#{code}"),
    }
}

/// Byte values of a key as typed, e.g. `27 91 65` for an arrow key, followed
/// by a readable name for single-byte keys.
pub fn describe_sequence(bytes: &[u8]) -> String {
    let codes: Vec<String> = bytes.iter().map(u8::to_string).collect();
    match bytes {
        [byte] => format!("{}  {}", codes.join(" "), describe_key(i32::from(*byte))),
        _ => codes.join(" "),
    }
}
