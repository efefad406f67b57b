//! Cross-runtime process execution for songforge
//!
//! The external SVS engine runs under its own pinned interpreter and
//! dependency set, so everything here goes through argv-style child
//! processes; no shell string evaluation anywhere. [`CommandSpec`] describes
//! an invocation, [`ProcessRunner`] executes one with a timeout, and
//! [`SvsEngine`] knows how the SVS project is launched and how its failures
//! are classified.

pub mod command_spec;
pub mod error;
pub mod native;
pub mod process;
pub mod svs;

pub use command_spec::CommandSpec;
pub use error::{RunnerError, SvsError};
pub use native::NativeRunner;
pub use process::{ProcessOutput, ProcessRunner};
pub use svs::{SvsEngine, SvsInvocation};
