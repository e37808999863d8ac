use anyhow::Result;

use crate::candidates::lookup_candidates;
use crate::config::Settings;
use crate::picker::Picker;
use crate::store::{Credential, CredentialStore, LookupResult};
use crate::unlock::UnlockGate;

pub const CANCELED_BY_USER: &str = "Canceled by user";
pub const UNLOCK_FAILED: &str = "rbw unlock failed!";
pub const UNEXPECTED_MULTIPLE: &str = "Unexpected: multiple results encountered";

/// Terminal result of a resolution. Exactly one is produced per
/// invocation; it is the only thing the output sink consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Credential),
    Cancelled(String),
    Failed(String),
}

/// Full pipeline for one invocation: unlock gate first, then the
/// candidate walk. Every error ends up inside the returned `Outcome`;
/// nothing propagates past this boundary.
pub fn run(
    store: &impl CredentialStore,
    picker: &impl Picker,
    gate: &impl UnlockGate,
    settings: &Settings,
) -> Outcome {
    match gate.ensure_unlocked() {
        Ok(true) => {}
        // A store that stays locked and a gate that could not run look
        // the same to the user; both end as the soft unlock outcome.
        Ok(false) | Err(_) => return Outcome::Cancelled(UNLOCK_FAILED.to_string()),
    }
    resolve(store, picker, settings)
}

/// Candidate walk without the unlock gate, for callers that already
/// know the store is open.
pub fn resolve(
    store: &impl CredentialStore,
    picker: &impl Picker,
    settings: &Settings,
) -> Outcome {
    match search_candidates(store, picker, settings) {
        Ok(outcome) => outcome,
        Err(error) => Outcome::Failed(format!("{error:#}")),
    }
}

fn search_candidates(
    store: &impl CredentialStore,
    picker: &impl Picker,
    settings: &Settings,
) -> Result<Outcome> {
    for candidate in lookup_candidates(&settings.url) {
        let terms = match &settings.folder {
            Some(folder) => vec![candidate.as_str(), folder.as_str()],
            None => vec![candidate.as_str()],
        };
        match store.lookup(&terms)? {
            LookupResult::Found(credential) => return Ok(Outcome::Success(credential)),
            LookupResult::Ambiguous(usernames) => {
                return disambiguate(store, picker, settings, &usernames);
            }
            LookupResult::NotFound => {}
        }
    }
    fallback_listing(store, picker)
}

fn disambiguate(
    store: &impl CredentialStore,
    picker: &impl Picker,
    settings: &Settings,
    usernames: &[String],
) -> Result<Outcome> {
    let Some(username) = picker.choose(usernames)? else {
        return Ok(Outcome::Cancelled(CANCELED_BY_USER.to_string()));
    };
    // The targeted lookup pairs the original URL with the chosen
    // username and omits the folder filter; the username already
    // identifies the entry uniquely.
    targeted_lookup(store, &[settings.url.as_str(), username.as_str()])
}

fn fallback_listing(store: &impl CredentialStore, picker: &impl Picker) -> Result<Outcome> {
    let names = store.list_all()?;
    let Some(name) = picker.choose(&names)? else {
        return Ok(Outcome::Cancelled(CANCELED_BY_USER.to_string()));
    };
    targeted_lookup(store, &[name.as_str()])
}

/// Second-stage lookup after a picker choice; anything but a single
/// match is a hard failure.
fn targeted_lookup(store: &impl CredentialStore, terms: &[&str]) -> Result<Outcome> {
    match store.lookup(terms)? {
        LookupResult::Found(credential) => Ok(Outcome::Success(credential)),
        LookupResult::Ambiguous(_) | LookupResult::NotFound => {
            Ok(Outcome::Failed(UNEXPECTED_MULTIPLE.to_string()))
        }
    }
}
