use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

pub trait Picker {
    /// Present `items` and return the chosen line, or `None` when the
    /// user cancelled. Cancellation is not an error.
    fn choose(&self, items: &[String]) -> Result<Option<String>>;
}

/// Runs the configured picker command line through `sh -c`, feeding
/// the items newline-joined on stdin and reading one line back.
#[derive(Debug, Clone)]
pub struct ShellPicker {
    command: String,
}

impl ShellPicker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Picker for ShellPicker {
    fn choose(&self, items: &[String]) -> Result<Option<String>> {
        let mut child = Command::new("sh")
            .args(["-c", &self.command])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start picker: {}", self.command))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .context("failed to open picker stdin")?;
            stdin
                .write_all(items.join("\n").as_bytes())
                .context("failed to write picker input")?;
        }

        let output = child
            .wait_with_output()
            .context("failed to read picker output")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let chosen = stdout.lines().next().unwrap_or("").trim().to_string();
        // Empty output (Escape, closed window, nonzero exit) is a cancel.
        Ok((!chosen.is_empty()).then_some(chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::{Picker, ShellPicker};

    fn items(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn returns_the_first_line_of_picker_output() {
        let picker = ShellPicker::new("head -n 1");
        let chosen = picker.choose(&items(&["alice", "bob"])).expect("choose");
        assert_eq!(chosen.as_deref(), Some("alice"));
    }

    #[test]
    fn output_is_trimmed() {
        let picker = ShellPicker::new("printf '  bob  \\n'");
        let chosen = picker.choose(&items(&["alice", "bob"])).expect("choose");
        assert_eq!(chosen.as_deref(), Some("bob"));
    }

    #[test]
    fn empty_output_means_cancelled() {
        let picker = ShellPicker::new("cat > /dev/null");
        let chosen = picker.choose(&items(&["alice", "bob"])).expect("choose");
        assert_eq!(chosen, None);
    }

    #[test]
    fn nonzero_exit_with_empty_output_is_still_a_cancel() {
        let picker = ShellPicker::new("cat > /dev/null; exit 1");
        let chosen = picker.choose(&items(&["alice"])).expect("choose");
        assert_eq!(chosen, None);
    }
}
