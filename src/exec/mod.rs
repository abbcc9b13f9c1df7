//! Child process execution with injected secrets.
//!
//! Spawns the target command with the resolved environment merged in,
//! forwards lifecycle signals, and surfaces the child's exit code for the
//! CLI to propagate.

mod error;
mod runner;
mod signals;

pub use error::RunnerError;
pub use runner::{exit_code, run};
pub use signals::forward_signals;
