use std::net::IpAddr;

use crate::ioc::IndicatorKind;

/// Canonical form used for both storing and looking up a value.
pub fn normalize(kind: IndicatorKind, raw: &str) -> Option<String> {
    match kind {
        IndicatorKind::Hash => normalize_hash(raw),
        IndicatorKind::IpAddress => normalize_ip(raw),
        IndicatorKind::Url => normalize_url_host(raw),
    }
}

/// Lowercase hex digest. Anything non-hex is rejected.
pub fn normalize_hash(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

pub fn normalize_ip(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

/// Reduce a URL (or bare domain) to its lowercase host.
///
/// `https://User@Evil.Example.:8443/path?q` becomes `evil.example`.
pub fn normalize_url_host(raw: &str) -> Option<String> {
    let mut rest = raw.trim();
    // A scheme only counts when it precedes the path, query and fragment.
    let path_start = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    if let Some(idx) = rest.find("://").filter(|idx| *idx < path_start) {
        rest = &rest[idx + 3..];
    }
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let mut authority = &rest[..end];
    if let Some(idx) = authority.rfind('@') {
        authority = &authority[idx + 1..];
    }

    let host = if authority.parse::<IpAddr>().is_ok() {
        authority
    } else if let Some(stripped) = authority.strip_prefix('[') {
        // Bracketed IPv6 literal, optional port after the bracket.
        stripped.split(']').next().unwrap_or_default()
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
            _ => authority,
        }
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host)
}

/// Split an event hash blob such as `SHA256=AB..,IMPHASH=CD..` into
/// normalised digests. Bare digests without an algorithm prefix are kept.
pub fn parse_hash_blob(blob: &str) -> Vec<String> {
    blob.split([',', ';'])
        .filter_map(|part| {
            let value = match part.split_once('=') {
                Some((_, value)) => value,
                None => part,
            };
            normalize_hash(value)
        })
        .collect()
}
