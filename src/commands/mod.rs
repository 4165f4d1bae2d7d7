mod comment;
mod exit;
mod include;
mod mode;
mod output;
mod pause;
mod run;
mod skip;
mod wait;

pub use comment::Comment;
pub use exit::Exit;
pub use include::Include;
pub use mode::{AutoMode, CommandMode, InsertMode, PassthroughMode};
pub use output::{NoStdout, Stdout};
pub use pause::Pause;
pub use run::Run;
pub use skip::{Resume, Skip};
pub use wait::WaitForKey;
