//! Console presentation for the agent binary.

pub mod command;
pub mod formatter;

use std::io::Write;

pub use command::{Command, CommandError, HELP};
pub use formatter::MessageFormatter;

/// Redisplay the prompt after printing asynchronous output
pub fn redisplay_prompt(user_id: &str) {
    print!("\n{}> ", user_id);
    std::io::stdout().flush().ok();
}
