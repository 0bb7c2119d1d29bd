//! Terminal output for status lines, warnings and errors.

use seek_index::StatusSink;

/// Writes user-facing messages to the terminal.
///
/// Results (prompts, matches) are printed by the commands themselves; this
/// only carries status. With `status_to_stderr` set, status lines stay off
/// stdout so machine-readable output remains clean.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleIo {
    status_to_stderr: bool,
}

impl ConsoleIo {
    pub fn new(status_to_stderr: bool) -> Self {
        Self { status_to_stderr }
    }

    pub fn tool_output(&self, message: &str) {
        if self.status_to_stderr {
            eprintln!("{}", message);
        } else {
            println!("{}", message);
        }
    }

    pub fn tool_warning(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    pub fn tool_error(&self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

impl StatusSink for ConsoleIo {
    fn output(&self, message: &str) {
        self.tool_output(message);
    }

    fn warning(&self, message: &str) {
        self.tool_warning(message);
    }
}
