use std::env;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{FillTarget, Settings};
use crate::resolve::Outcome;
use crate::store::Credential;

pub const FIFO_ENV: &str = "QUTE_FIFO";

/// The browser's write-only command pipe. Opened once per invocation;
/// dropping it releases the handle on every exit path.
pub struct CommandChannel {
    sink: File,
}

impl CommandChannel {
    pub fn from_env() -> Result<Self> {
        let path = env::var(FIFO_ENV).with_context(|| {
            format!("{FIFO_ENV} is not set (not running as a qutebrowser userscript?)")
        })?;
        Self::open(Path::new(&path))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let sink = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open command channel {}", path.display()))?;
        Ok(Self { sink })
    }

    pub fn fake_key(&mut self, keys: &str) -> Result<()> {
        self.command(&format!("fake-key {keys}"))
    }

    pub fn enter_insert_mode(&mut self) -> Result<()> {
        self.command("mode-enter insert")
    }

    pub fn message_info(&mut self, text: &str) -> Result<()> {
        self.message("message-info", text)
    }

    pub fn message_warning(&mut self, text: &str) -> Result<()> {
        self.message("message-warning", text)
    }

    pub fn message_error(&mut self, text: &str) -> Result<()> {
        self.message("message-error", text)
    }

    fn message(&mut self, command: &str, text: &str) -> Result<()> {
        // Single quotes would end the quoted argument early; drop them.
        self.command(&format!("{command} '{}'", text.replace('\'', "")))
    }

    fn command(&mut self, line: &str) -> Result<()> {
        writeln!(self.sink, "{line}").context("failed to write to command channel")
    }
}

/// Escape text for `fake-key`: space becomes the reserved `<space>`
/// token, every other character gets a backslash so the command
/// channel's tokenizer passes it through untouched.
pub fn escape_keys(text: &str) -> String {
    let mut sequence = String::with_capacity(text.len() * 2);
    for character in text.chars() {
        if character == ' ' {
            sequence.push_str("<space>");
        } else {
            sequence.push('\\');
            sequence.push(character);
        }
    }
    sequence
}

/// Write the outcome to the channel and return the process exit code.
/// Cancellation is informational, not a failure.
pub fn emit_outcome(
    channel: &mut CommandChannel,
    outcome: &Outcome,
    settings: &Settings,
) -> Result<i32> {
    match outcome {
        Outcome::Success(credential) => {
            emit_credential(channel, credential, settings)?;
            Ok(0)
        }
        Outcome::Cancelled(message) => {
            channel.message_info(message)?;
            Ok(0)
        }
        Outcome::Failed(message) => {
            channel.message_error(message)?;
            Ok(1)
        }
    }
}

fn emit_credential(
    channel: &mut CommandChannel,
    credential: &Credential,
    settings: &Settings,
) -> Result<()> {
    match settings.fill {
        FillTarget::UsernameOnly => {
            if credential.username.is_empty() {
                return channel.message_warning("entry has no username");
            }
            channel.fake_key(&escape_keys(&credential.username))?;
        }
        FillTarget::PasswordOnly => {
            channel.fake_key(&escape_keys(&credential.password))?;
        }
        FillTarget::Both => {
            channel.fake_key(&escape_keys(&credential.username))?;
            channel.fake_key("<Tab>")?;
            channel.fake_key(&escape_keys(&credential.password))?;
        }
    }
    if settings.insert_mode {
        channel.enter_insert_mode()?;
    }
    Ok(())
}
