//! Parsing of known_hosts files and matching of hosts against their entries.

// Refs:
// * sshd(8), SSH_KNOWN_HOSTS FILE FORMAT

use crate::{
    cert::{CertError, Certificate},
    consts::{HASHED_HOST_MAGIC, MARKER_CERT_AUTHORITY, MARKER_REVOKED},
    error::Error,
    key::{self, key_eq, HostKey, PublicKey},
    normalize::{self, format_entry, split_host_port, DEFAULT_PORT},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::hmac;
use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    net::SocketAddr,
    path::Path,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// Checks the key presented by the server at `remote`, dialed as `hostname`.
///
/// Returns `Ok(())` if the key is trusted. A key that is not trusted yields an
/// error for which [`Error::is_host_unknown`] or [`Error::is_host_key_changed`]
/// holds; revoked keys and rejected certificates produce other errors.
pub type HostKeyCallback =
    Arc<dyn Fn(&str, SocketAddr, &dyn PublicKey) -> Result<(), Error> + Send + Sync>;

/// A key recorded in a known_hosts file.
#[derive(Clone, Debug)]
pub struct KnownKey {
    pub filename: String,
    pub line: usize,
    pub key: Arc<dyn PublicKey>,
}

impl fmt::Display for KnownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.filename, self.line, key::serialize(&*self.key))
    }
}

/// Creates a host key callback from the given known_hosts files.
pub(crate) fn new<P: AsRef<Path>>(files: &[P]) -> Result<HostKeyCallback, Error> {
    let mut db = Database::default();
    for path in files {
        let filename = display_name(path.as_ref());
        let file = File::open(path.as_ref()).map_err(|e| Error::io_at(&filename, None, e))?;
        db.read(BufReader::new(file), &filename)?;
    }
    tracing::debug!(
        "loaded {} known_hosts entries, {} revoked keys",
        db.lines.len(),
        db.revoked.len()
    );

    let db = Arc::new(db);
    Ok(Arc::new(
        move |hostname: &str, remote: SocketAddr, key: &dyn PublicKey| {
            db.check(hostname, remote, key)
        },
    ))
}

/// Returns `true` if `hosts` reads back as the host field of a known_hosts line.
pub(crate) fn is_host_pattern(hosts: &str) -> bool {
    HostMatcher::parse(hosts).is_ok()
}

/// The name under which keys from `path` are reported.
pub(crate) fn display_name(path: &Path) -> String {
    path.display().to_string()
}

/// Splits known_hosts contents into raw lines.
///
/// Every reader of known_hosts files goes through this, so that line numbers agree.
pub(crate) fn raw_lines<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<Vec<u8>>> {
    reader.split(b'\n')
}

/// Returns the SHA-1 HMAC of a normalized address, as stored in hashed hostnames.
pub(crate) fn hash_host(entry: &str, salt: &[u8]) -> hmac::Tag {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, salt);
    hmac::sign(&key, entry.as_bytes())
}

#[derive(Clone, Copy, PartialEq)]
enum Marker {
    CertAuthority,
    Revoked,
}

struct Line {
    cert_authority: bool,
    matcher: HostMatcher,
    known_key: KnownKey,
}

enum HostMatcher {
    Patterns(Vec<HostPattern>),
    Hashed { salt: Vec<u8>, hash: Vec<u8> },
}

struct HostPattern {
    negate: bool,
    host: String,
    port: String,
}

impl HostMatcher {
    fn parse(hosts: &str) -> Result<Self, String> {
        if let Some(encoded) = hosts.strip_prefix(HASHED_HOST_MAGIC) {
            let parts: Vec<&str> = encoded.split('|').collect();
            if parts.len() != 2 {
                return Err(format!("invalid hashed host {:?}", hosts));
            }
            let decode = |s: &str| {
                STANDARD
                    .decode(s)
                    .map_err(|e| format!("invalid hashed host {:?}: {}", hosts, e))
            };
            return Ok(HostMatcher::Hashed {
                salt: decode(parts[0])?,
                hash: decode(parts[1])?,
            });
        }
        if hosts.starts_with('|') {
            return Err(format!("unsupported hashed host type {:?}", hosts));
        }

        let mut patterns = vec![];
        for pattern in hosts.split(',').filter(|p| !p.is_empty()) {
            let (negate, pattern) = match pattern.strip_prefix('!') {
                Some(pattern) => (true, pattern),
                None => (false, pattern),
            };
            let (host, port) = if pattern.starts_with('[') {
                split_host_port(pattern)
                    .map_err(|e| format!("invalid host pattern {:?}: {}", pattern, e))?
            } else {
                (pattern, DEFAULT_PORT)
            };
            patterns.push(HostPattern {
                negate,
                host: host.to_owned(),
                port: port.to_owned(),
            });
        }
        Ok(HostMatcher::Patterns(patterns))
    }

    fn matches(&self, host: &str, port: &str) -> bool {
        match self {
            HostMatcher::Patterns(patterns) => {
                let mut matched = false;
                for pattern in patterns {
                    if pattern.port == port
                        && wildcard_match(pattern.host.as_bytes(), host.as_bytes())
                    {
                        if pattern.negate {
                            return false;
                        }
                        matched = true;
                    }
                }
                matched
            }
            HostMatcher::Hashed { salt, hash } => {
                let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, salt);
                hmac::verify(&key, format_entry(host, port).as_bytes(), hash).is_ok()
            }
        }
    }
}

/// Matches `s` against a pattern where `*` matches any run of bytes and `?` any single byte.
fn wildcard_match(pat: &[u8], s: &[u8]) -> bool {
    let (mut p, mut i) = (0, 0);
    // Pattern position after the last `*`, and where its run in `s` currently ends.
    let mut star = None;
    while i < s.len() {
        match pat.get(p) {
            Some(b'*') => {
                p += 1;
                star = Some((p, i));
            }
            Some(&c) if c == b'?' || c == s[i] => {
                p += 1;
                i += 1;
            }
            _ => match star {
                Some((after_star, end)) => {
                    p = after_star;
                    i = end + 1;
                    star = Some((after_star, end + 1));
                }
                None => return false,
            },
        }
    }
    pat[p..].iter().all(|&c| c == b'*')
}

fn next_word(line: &str) -> (&str, &str) {
    match line.find(|c: char| c == ' ' || c == '\t') {
        Some(i) => (&line[..i], line[i..].trim()),
        None => (line, ""),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Default)]
struct Database {
    lines: Vec<Line>,
    revoked: HashMap<Vec<u8>, KnownKey>,
}

impl Database {
    fn read<R: BufRead>(&mut self, reader: R, filename: &str) -> Result<(), Error> {
        let mut line_num = 0;
        for line in raw_lines(reader) {
            let line = line.map_err(|e| Error::io_at(filename, Some(line_num), e))?;
            line_num += 1;

            let line = std::str::from_utf8(&line)
                .map_err(|_| Error::parse(filename, line_num, "invalid UTF-8"))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            self.parse_line(line, filename, line_num)
                .map_err(|msg| Error::parse(filename, line_num, msg))?;
        }
        Ok(())
    }

    fn parse_line(&mut self, line: &str, filename: &str, line_num: usize) -> Result<(), String> {
        let (word, next) = next_word(line);
        let (marker, line) = match word {
            MARKER_CERT_AUTHORITY => (Some(Marker::CertAuthority), next),
            MARKER_REVOKED => (Some(Marker::Revoked), next),
            word if word.starts_with('@') => return Err(format!("unknown marker {:?}", word)),
            _ => (None, line),
        };

        let (hosts, rest) = next_word(line);
        if rest.is_empty() {
            return Err("missing host pattern".into());
        }

        // The key type is in the key blob anyway.
        let (_key_type, rest) = next_word(rest);
        if rest.is_empty() {
            return Err("missing key type pattern".into());
        }

        let (encoded, _comment) = next_word(rest);
        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| format!("invalid base64 key data: {}", e))?;
        let key = key::parse_public_key(&blob).map_err(|e| e.to_string())?;

        let known_key = KnownKey {
            filename: filename.to_owned(),
            line: line_num,
            key,
        };

        if marker == Some(Marker::Revoked) {
            tracing::trace!("{}:{}: revoked key", filename, line_num);
            self.revoked.insert(known_key.key.marshal().to_vec(), known_key);
            return Ok(());
        }

        let matcher = HostMatcher::parse(hosts)?;
        self.lines.push(Line {
            cert_authority: marker == Some(Marker::CertAuthority),
            matcher,
            known_key,
        });
        Ok(())
    }

    fn check(&self, hostname: &str, remote: SocketAddr, key: &dyn PublicKey) -> Result<(), Error> {
        let remote_addr;
        let (host, port) = if hostname.is_empty() {
            remote_addr = remote.to_string();
            normalize::host_and_port(&remote_addr)
        } else {
            normalize::host_and_port(hostname)
        };
        tracing::trace!("check {} key for host={}, port={}", key.key_type(), host, port);

        if let Some(cert) = key.as_certificate() {
            return self.check_certificate(host, port, cert);
        }
        if let Some(revoked) = self.revoked.get(key.marshal()) {
            return Err(Error::revoked(revoked.clone()));
        }
        self.check_addr(host, port, key)
    }

    fn check_addr(&self, host: &str, port: &str, key: &dyn PublicKey) -> Result<(), Error> {
        let matched: Vec<&Line> = self
            .lines
            .iter()
            .filter(|line| line.matcher.matches(host, port))
            .collect();

        // @cert-authority lines never pin a key directly, but they are reported as
        // known keys of the host.
        if matched
            .iter()
            .any(|line| !line.cert_authority && key_eq(&*line.known_key.key, key))
        {
            return Ok(());
        }

        Err(Error::key_mismatch(
            matched.into_iter().map(|line| line.known_key.clone()).collect(),
        ))
    }

    fn check_certificate(&self, host: &str, port: &str, cert: &Certificate) -> Result<(), Error> {
        let revoked = self
            .revoked
            .get(cert.marshal())
            .or_else(|| self.revoked.get(cert.signature_key().marshal()));
        if let Some(revoked) = revoked {
            return Err(Error::revoked(revoked.clone()));
        }

        if !cert.is_host_certificate() {
            return Err(Error::certificate(CertError::NotHostCertificate(cert.cert_type())));
        }
        if !self.is_host_authority(cert.signature_key(), host, port) {
            return Err(Error::certificate(CertError::NoAuthority(format_entry(host, port))));
        }

        // Host certificates name the bare hostname as principal.
        cert.check(host, unix_now()).map_err(Error::certificate)
    }

    fn is_host_authority(&self, ca: &HostKey, host: &str, port: &str) -> bool {
        self.lines.iter().any(|line| {
            line.cert_authority
                && line.matcher.matches(host, port)
                && key_eq(&*line.known_key.key, ca)
        })
    }
}
