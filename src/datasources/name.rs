//! Datasource name validation.
//!
//! Names arrive as request path segments and double as registry keys, so
//! they are checked against DNS-style rules before any lookup: dot-separated
//! labels of 1-63 characters from `[A-Za-z0-9_-]`, no label starting with a
//! hyphen, at most 255 characters excluding dots, an optional trailing dot,
//! and never an IP address literal.

use std::net::IpAddr;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// Returns true if `name` is a syntactically valid DNS-style name.
pub fn is_dns_name(name: &str) -> bool {
    if name.is_empty() || name.parse::<IpAddr>().is_ok() {
        return false;
    }

    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() {
        return false;
    }

    if trimmed.chars().filter(|c| *c != '.').count() > MAX_NAME_LEN {
        return false;
    }

    trimmed.split('.').all(is_label)
}

fn is_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' => {}
        _ => return false,
    }

    label.len() <= MAX_LABEL_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in [
            "foo",
            "thanos-querier",
            "test-datasource_name123",
            "prometheus.openshift-monitoring.svc",
            "trailing.dot.",
            "_underscore",
        ] {
            assert!(is_dns_name(name), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            ".",
            "invalid\\",
            "-leading-hyphen",
            "double..dot",
            "spaces are bad",
            "127.0.0.1",
            "::1",
            "ünicode",
        ] {
            assert!(!is_dns_name(name), "{:?} should be invalid", name);
        }
    }

    #[test]
    fn test_length_limits() {
        assert!(is_dns_name(&"a".repeat(63)));
        assert!(!is_dns_name(&"a".repeat(64)));
        assert!(!is_dns_name(&"a".repeat(260)));

        let long_but_dotted = vec!["a".repeat(60); 4].join(".");
        assert!(is_dns_name(&long_but_dotted));

        let too_long = vec!["a".repeat(60); 5].join(".");
        assert!(!is_dns_name(&too_long));
    }
}
