use std::process::Command;

use anyhow::{Context, Result};

pub trait UnlockGate {
    /// True when the store is unlocked after at most one unlock attempt.
    fn ensure_unlocked(&self) -> Result<bool>;
}

/// Checks `<store> unlocked`; when locked, runs the store's interactive
/// unlock flow inside the configured terminal and re-checks once.
#[derive(Debug, Clone)]
pub struct TerminalUnlock {
    store: String,
    terminal: String,
}

impl TerminalUnlock {
    pub fn new(store: impl Into<String>, terminal: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            terminal: terminal.into(),
        }
    }

    fn unlocked(&self) -> Result<bool> {
        let status = Command::new(&self.store)
            .arg("unlocked")
            .status()
            .with_context(|| format!("failed to execute {} unlocked", self.store))?;
        Ok(status.success())
    }
}

impl UnlockGate for TerminalUnlock {
    fn ensure_unlocked(&self) -> Result<bool> {
        if self.unlocked()? {
            return Ok(true);
        }
        // The terminal's own exit status carries no signal; only the
        // re-check below does.
        let _ = Command::new(&self.terminal)
            .args(["-e", &self.store, "unlock"])
            .status()
            .with_context(|| format!("failed to launch {}", self.terminal))?;
        self.unlocked()
    }
}
