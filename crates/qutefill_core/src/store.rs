use std::fmt;
use std::process::Command;

use serde_json::Value;
use thiserror::Error;

pub const MULTIPLE_ENTRIES_MARKER: &str = ": multiple entries found: ";
pub const NO_ENTRY_SUFFIX: &str = "no entry found";

/// A resolved login pair. Ephemeral; the password is kept out of all
/// Debug and diagnostic output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Found(Credential),
    Ambiguous(Vec<String>),
    NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to execute {program}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("output from {program} was not valid utf-8")]
    Decode { program: String },
    #[error("unexpected payload from {program}: {reason}")]
    Payload {
        program: String,
        reason: &'static str,
    },
    #[error("{0}")]
    Backend(String),
}

pub trait CredentialStore {
    fn lookup(&self, terms: &[&str]) -> Result<LookupResult, StoreError>;
    fn list_all(&self) -> Result<Vec<String>, StoreError>;
}

/// Store client backed by the rbw CLI (or a compatible program).
#[derive(Debug, Clone)]
pub struct Rbw {
    program: String,
}

impl Rbw {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl CredentialStore for Rbw {
    fn lookup(&self, terms: &[&str]) -> Result<LookupResult, StoreError> {
        let output = Command::new(&self.program)
            .args(["get", "--raw"])
            .args(terms)
            .output()
            .map_err(|source| StoreError::Launch {
                program: self.program.clone(),
                source,
            })?;
        let stderr = decode(&self.program, &output.stderr)?;
        parse_lookup_output(&self.program, &stderr, &output.stdout)
    }

    fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let output = Command::new(&self.program)
            .arg("list")
            .output()
            .map_err(|source| StoreError::Launch {
                program: self.program.clone(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(str::to_string).collect())
    }
}

/// Classify one `get --raw` invocation from its stderr text and raw
/// stdout bytes. Empty stderr means a JSON credential payload on
/// stdout; the two recognized stderr shapes map to `NotFound` and
/// `Ambiguous`; anything else is a hard store error carrying the text.
pub fn parse_lookup_output(
    program: &str,
    stderr: &str,
    stdout: &[u8],
) -> Result<LookupResult, StoreError> {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        let stdout = decode(program, stdout)?;
        return parse_credential_payload(program, &stdout).map(LookupResult::Found);
    }
    if stderr.ends_with(NO_ENTRY_SUFFIX) {
        return Ok(LookupResult::NotFound);
    }
    if let Some(index) = stderr.find(MULTIPLE_ENTRIES_MARKER) {
        let usernames = parse_ambiguous_usernames(&stderr[index + MULTIPLE_ENTRIES_MARKER.len()..]);
        // An ambiguous report with no parseable names degrades to NotFound.
        if usernames.is_empty() {
            return Ok(LookupResult::NotFound);
        }
        return Ok(LookupResult::Ambiguous(usernames));
    }
    Err(StoreError::Backend(stderr.to_string()))
}

fn parse_credential_payload(program: &str, stdout: &str) -> Result<Credential, StoreError> {
    let payload: Value =
        serde_json::from_str(stdout).map_err(|_| StoreError::Payload {
            program: program.to_string(),
            reason: "stdout is not valid JSON",
        })?;
    let data = payload.get("data").ok_or_else(|| StoreError::Payload {
        program: program.to_string(),
        reason: "missing `data` object",
    })?;
    let username = data
        .get("username")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Payload {
            program: program.to_string(),
            reason: "missing `data.username`",
        })?;
    let password = data
        .get("password")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Payload {
            program: program.to_string(),
            reason: "missing `data.password`",
        })?;
    Ok(Credential {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// `user@entry-id` tokens, comma-space separated; the split is at the
/// LAST `@` so usernames that are email addresses survive intact.
fn parse_ambiguous_usernames(list: &str) -> Vec<String> {
    list.split(", ")
        .filter_map(|token| {
            let token = token.trim();
            if token.is_empty() {
                return None;
            }
            let username = token
                .rsplit_once('@')
                .map(|(username, _)| username)
                .unwrap_or(token);
            (!username.is_empty()).then(|| username.to_string())
        })
        .collect()
}

fn decode(program: &str, bytes: &[u8]) -> Result<String, StoreError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| StoreError::Decode {
        program: program.to_string(),
    })
}
