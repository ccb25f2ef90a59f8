//! Summary reporting.
//!
//! The reporter is constructed once from the CLI flags and passed down
//! explicitly; there is no process-wide output state.

use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    json: bool,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print a summary: pretty JSON in `--json` mode, the rendered text
    /// otherwise.
    pub fn print<T: Serialize>(&self, value: &T, text: &str) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{text}");
        }
        Ok(())
    }
}
