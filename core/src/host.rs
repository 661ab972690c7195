//! Hostname cleaning and FQDN validation.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Reason a raw domain was rejected by [`validate_domain`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDomain {
    #[error("Empty domain")]
    Empty,
    #[error("Domain does not match FQDN format")]
    NotFqdn,
}

/// Reduce user input to a bare lowercase host: no scheme, path, query,
/// fragment, port or trailing dot. Never rejects; garbage in, garbage out.
pub fn clean_host(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    if let Some(rest) = s.strip_prefix("http://") {
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix("https://") {
        s = rest.to_string();
    }
    if let Some(idx) = s.find(|c| c == '/' || c == '?' || c == '#') {
        s.truncate(idx);
    }
    if let Some(idx) = s.find(':') {
        s.truncate(idx);
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("static regex"))
}

fn tld_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{2,63}$").expect("static regex"))
}

/// Normalize with [`clean_host`] and require a syntactically valid FQDN
/// (e.g. `example.com`, `sub.example.co.il`).
pub fn validate_domain(raw: &str) -> Result<String, InvalidDomain> {
    let host = clean_host(raw);
    if host.is_empty() {
        return Err(InvalidDomain::Empty);
    }
    if host.len() > 253 {
        return Err(InvalidDomain::NotFqdn);
    }
    let labels: Vec<&str> = host.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return Err(InvalidDomain::NotFqdn);
    };
    if rest.is_empty() || !tld_re().is_match(tld) || !rest.iter().all(|l| label_re().is_match(l)) {
        return Err(InvalidDomain::NotFqdn);
    }
    Ok(host)
}
