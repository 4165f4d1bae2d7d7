//! Directives that switch the input mode from inside the script.
//!
//! Script syntax: `# PASSTHROUGH`, `# INSERT`, `# AUTO`, `# COMMAND`
//! (or their aliases `P`, `I`, `A`, `CM`).

use crate::command::{Context, Directive, Flow};
use crate::error::SessionError;
use crate::state::InputMode;

macro_rules! mode_directive {
    ($(#[$doc:meta])* $ty:ident, $name:literal, [$($alias:literal),*], $mode:expr) => {
        $(#[$doc])*
        pub struct $ty;

        impl $ty {
            pub const NAME: &'static str = $name;
            pub const ALIASES: &'static [&'static str] = &[$($alias),*];
        }

        impl Directive for $ty {
            fn name(&self) -> &'static str {
                Self::NAME
            }

            fn parse(_argument: &str) -> Result<Self, SessionError> {
                Ok(Self)
            }

            fn execute(&self, ctx: &mut Context<'_>) -> Result<Flow, SessionError> {
                ctx.state().set_input_mode($mode);
                Ok(Flow::Continue)
            }
        }
    };
}

mode_directive!(
    /// Hand the keyboard to the shell until the operator switches back.
    PassthroughMode, "PASSTHROUGH", ["P"], InputMode::Passthrough
);
mode_directive!(InsertMode, "INSERT", ["I"], InputMode::Insert);
mode_directive!(
    /// Type the following lines without waiting for the operator.
    AutoMode, "AUTO", ["A"], InputMode::Auto
);
mode_directive!(CommandMode, "COMMAND", ["CM"], InputMode::Command);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ScriptedKeys;
    use crate::state::SessionState;
    use std::path::Path;

    #[test]
    fn test_each_directive_sets_its_mode() {
        let state = SessionState::default();
        let mut keys = ScriptedKeys::default();
        let mut ctx = Context::new(&state, &mut keys, 0, Path::new("."));

        let cases: [(Box<dyn Directive>, InputMode); 4] = [
            (Box::new(PassthroughMode), InputMode::Passthrough),
            (Box::new(AutoMode), InputMode::Auto),
            (Box::new(CommandMode), InputMode::Command),
            (Box::new(InsertMode), InputMode::Insert),
        ];
        for (directive, mode) in cases {
            directive.execute(&mut ctx).unwrap();
            assert_eq!(ctx.state().input_mode(), mode, "{}", directive.name());
        }
    }
}
