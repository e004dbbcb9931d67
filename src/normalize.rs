//! Canonical textual form of host addresses in known_hosts.
//!
//! OpenSSH records hosts on the default port as a bare name and hosts on any
//! other port as `[host]:port`. The same form is used when matching hashed
//! hostnames and when writing new lines, so both paths go through here.

pub(crate) const DEFAULT_PORT: &str = "22";

/// The error returned by [`split_host_port`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    #[error("missing port in address")]
    MissingPort,
    #[error("too many colons in address")]
    TooManyColons,
    #[error("missing ']' in address")]
    MissingBracket,
    #[error("unexpected '[' in address")]
    UnexpectedOpenBracket,
    #[error("unexpected ']' in address")]
    UnexpectedCloseBracket,
}

/// Splits `host:port`, `[host]:port` or `[ipv6-host%zone]:port` into host and port.
///
/// Brackets are removed from the host. The port is returned as written and may
/// be empty (`host:`).
pub fn split_host_port(hostport: &str) -> Result<(&str, &str), AddrError> {
    let i = hostport.rfind(':').ok_or(AddrError::MissingPort)?;

    let (host, j, k) = if hostport.starts_with('[') {
        let end = hostport.find(']').ok_or(AddrError::MissingBracket)?;
        if end + 1 == hostport.len() {
            return Err(AddrError::MissingPort);
        }
        if end + 1 != i {
            if hostport.as_bytes()[end + 1] == b':' {
                return Err(AddrError::TooManyColons);
            }
            return Err(AddrError::MissingPort);
        }
        (&hostport[1..end], 1, end + 1)
    } else {
        let host = &hostport[..i];
        if host.contains(':') {
            return Err(AddrError::TooManyColons);
        }
        (host, 0, 0)
    };

    if hostport[j..].contains('[') {
        return Err(AddrError::UnexpectedOpenBracket);
    }
    if hostport[k..].contains(']') {
        return Err(AddrError::UnexpectedCloseBracket);
    }

    Ok((host, &hostport[i + 1..]))
}

/// Normalizes an address into the form used in known_hosts.
///
/// A missing port means port 22. Hosts on port 22 are written bare, IPv6
/// literals included (`[::1]:22` becomes `::1`); every other port is written as
/// `[host]:port`. Input that cannot be split is taken as a host on port 22.
pub fn normalize(address: &str) -> String {
    let (host, port) = host_and_port(address);
    format_entry(host, port)
}

/// Splits an address like [`normalize`] does, without allocating.
pub(crate) fn host_and_port(address: &str) -> (&str, &str) {
    match split_host_port(address) {
        Ok(parts) => parts,
        Err(..) if address.len() >= 2 && address.starts_with('[') && address.ends_with(']') => {
            (&address[1..address.len() - 1], DEFAULT_PORT)
        }
        Err(..) => (address, DEFAULT_PORT),
    }
}

/// Formats an already split address the way [`normalize`] does.
pub(crate) fn format_entry(host: &str, port: &str) -> String {
    if port == DEFAULT_PORT {
        host.to_owned()
    } else {
        format!("[{}]:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain() {
        assert_eq!(split_host_port("example.com:22"), Ok(("example.com", "22")));
        assert_eq!(split_host_port("10.0.0.1:2222"), Ok(("10.0.0.1", "2222")));
        assert_eq!(split_host_port("example.com:"), Ok(("example.com", "")));
    }

    #[test]
    fn split_bracketed() {
        assert_eq!(split_host_port("[::1]:22"), Ok(("::1", "22")));
        assert_eq!(split_host_port("[fe80::1%eth0]:2200"), Ok(("fe80::1%eth0", "2200")));
        assert_eq!(split_host_port("[example.com]:2222"), Ok(("example.com", "2222")));
    }

    #[test]
    fn split_errors() {
        assert_eq!(split_host_port("example.com"), Err(AddrError::MissingPort));
        assert_eq!(split_host_port(""), Err(AddrError::MissingPort));
        assert_eq!(split_host_port("::1"), Err(AddrError::TooManyColons));
        assert_eq!(split_host_port("[::1]"), Err(AddrError::MissingPort));
        assert_eq!(split_host_port("[::1]::22"), Err(AddrError::TooManyColons));
        assert_eq!(split_host_port("[::1:22"), Err(AddrError::MissingBracket));
        assert_eq!(split_host_port("a]b:22"), Err(AddrError::UnexpectedCloseBracket));
        assert_eq!(split_host_port("a[b:22"), Err(AddrError::UnexpectedOpenBracket));
    }

    #[test]
    fn default_port_is_bare() {
        assert_eq!(normalize("example.com"), "example.com");
        assert_eq!(normalize("example.com:22"), "example.com");
        assert_eq!(normalize("10.0.0.1:22"), "10.0.0.1");
    }

    #[test]
    fn other_ports_are_bracketed() {
        assert_eq!(normalize("example.com:2222"), "[example.com]:2222");
        assert_eq!(normalize("[example.com]:2222"), "[example.com]:2222");
        assert_eq!(normalize("[::1]:2222"), "[::1]:2222");
        assert_eq!(normalize("0.0.0.0:0"), "[0.0.0.0]:0");
    }

    #[test]
    fn ipv6_on_default_port_drops_brackets() {
        assert_eq!(normalize("[::1]:22"), "::1");
        assert_eq!(normalize("[::1]"), "::1");
        assert_eq!(normalize("::1"), "::1");
    }

    #[test]
    fn unsplittable_input_is_kept() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("[::1"), "[::1");
        assert_eq!(normalize("[]"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in &[
            "example.com",
            "example.com:22",
            "example.com:2222",
            "[example.com]:2222",
            "10.0.0.1:22",
            "[::1]:22",
            "[::1]:2222",
            "[fe80::1%eth0]:22",
            "::1",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input = {:?}", input);
        }
    }

    #[test]
    fn format_entry_matches_normalize() {
        assert_eq!(format_entry("::1", "22"), normalize("[::1]:22"));
        assert_eq!(format_entry("example.com", "2222"), normalize("example.com:2222"));
    }
}
