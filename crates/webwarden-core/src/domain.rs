//! Domain normalization.
//!
//! Every ledger key and allow-list comparison uses the registrable domain
//! (public suffix plus one label), so `https://WWW.Example.co.uk:443/path`
//! and `example.co.uk` are the same site.

use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,

    #[error("invalid host in {0:?}")]
    InvalidHost(String),
}

/// Reduce a raw domain or URL to its lowercase registrable domain.
///
/// Scheme, credentials, port, path, query, and fragment are discarded.
/// Hosts with no registrable form (IP literals, single labels such as
/// `localhost`, bare public suffixes) are returned as the cleaned host.
pub fn registrable_domain(raw: &str) -> Result<String, DomainError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DomainError::Empty);
    }

    let host = match parse_host(raw)? {
        Host::Domain(domain) => domain.to_ascii_lowercase(),
        Host::Ipv4(ip) => return Ok(ip.to_string()),
        Host::Ipv6(ip) => return Ok(format!("[{ip}]")),
    };
    let host = host.trim_end_matches('.');
    if host.is_empty() {
        return Err(DomainError::Empty);
    }

    if !host
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_'))
        || host.split('.').any(str::is_empty)
    {
        return Err(DomainError::InvalidHost(raw.to_string()));
    }

    Ok(psl::domain_str(host).unwrap_or(host).to_string())
}

/// Parse the host out of a URL, or out of a bare `host[:port][/path]`.
fn parse_host(raw: &str) -> Result<Host<String>, DomainError> {
    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{raw}"))
    };
    match parsed {
        Ok(url) => url
            .host()
            .map(|host| host.to_owned())
            .ok_or(DomainError::Empty),
        Err(url::ParseError::EmptyHost) => Err(DomainError::Empty),
        Err(_) => Err(DomainError::InvalidHost(raw.to_string())),
    }
}
