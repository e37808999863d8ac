use std::collections::HashSet;

use url::{Host, Url};

/// Host components a lookup target can be built from. Any of them may
/// be absent; empty strings never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostParts {
    pub fqdn: Option<String>,
    pub registrable: Option<String>,
    pub bare: Option<String>,
    pub ipv4: Option<String>,
}

/// Scheme prefix for lookup targets, chosen from the raw URL text:
/// anything starting with `https` keeps it, everything else gets `http`.
pub fn scheme_prefix(raw_url: &str) -> &'static str {
    if raw_url.trim_start().starts_with("https") {
        "https://"
    } else {
        "http://"
    }
}

pub fn host_parts(raw_url: &str) -> HostParts {
    let trimmed = raw_url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => Some(parsed),
        // Scheme-less input ("example.com/login") gets one retry.
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{trimmed}")).ok()
        }
        Err(_) => None,
    };
    let Some(parsed) = parsed else {
        return HostParts::default();
    };

    match parsed.host() {
        Some(Host::Domain(domain)) => {
            let fqdn = domain.trim_end_matches('.').to_ascii_lowercase();
            if fqdn.is_empty() {
                return HostParts::default();
            }
            let registrable = psl::domain_str(&fqdn).map(str::to_string);
            let bare = registrable.as_deref().and_then(bare_domain);
            HostParts {
                fqdn: Some(fqdn),
                registrable,
                bare,
                ipv4: None,
            }
        }
        Some(Host::Ipv4(address)) => {
            let literal = address.to_string();
            HostParts {
                fqdn: Some(literal.clone()),
                ipv4: Some(literal),
                ..HostParts::default()
            }
        }
        // The no-scheme trailing fallback is IPv4 only; IPv6 literals
        // keep just the bracketed host form.
        Some(Host::Ipv6(address)) => HostParts {
            fqdn: Some(format!("[{address}]")),
            ..HostParts::default()
        },
        None => HostParts::default(),
    }
}

/// Ordered lookup targets for a URL: most specific host first,
/// broadening to the registrable domain and its bare label, with the
/// plain IPv4 literal as the trailing fallback.
pub fn lookup_candidates(raw_url: &str) -> Vec<String> {
    let scheme = scheme_prefix(raw_url);
    let parts = host_parts(raw_url);

    let mut candidates = Vec::new();
    for host in [&parts.fqdn, &parts.registrable, &parts.bare] {
        if let Some(host) = host
            && !host.is_empty()
        {
            candidates.push(format!("{scheme}{host}"));
        }
    }
    if let Some(literal) = &parts.ipv4 {
        candidates.push(literal.clone());
    }
    dedupe(candidates)
}

/// Registrable domain minus its public suffix, e.g. `example.co.uk` -> `example`.
fn bare_domain(registrable: &str) -> Option<String> {
    let suffix = psl::suffix_str(registrable)?;
    let bare = registrable[..registrable.len() - suffix.len()].trim_end_matches('.');
    (!bare.is_empty()).then(|| bare.to_string())
}

fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut output = Vec::new();
    let mut seen = HashSet::new();
    for value in values {
        if seen.insert(value.clone()) {
            output.push(value);
        }
    }
    output
}
