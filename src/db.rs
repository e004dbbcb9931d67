//! Host key lookups backed by known_hosts files.

use crate::{
    consts::{self, KEY_ALGO_RSA, KEY_ALGO_RSA_SHA256, KEY_ALGO_RSA_SHA512, MARKER_CERT_AUTHORITY},
    error::Error,
    key::{PlaceholderKey, PublicKey},
    matcher::{self, display_name, raw_lines, HostKeyCallback, KnownKey},
};
use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::BufReader,
    net::SocketAddr,
    path::Path,
    sync::Arc,
};

/// A key known for a host, flagged if it comes from an `@cert-authority` line.
#[derive(Clone, Debug)]
pub struct KnownHostKey {
    pub key: Arc<dyn PublicKey>,
    pub cert_authority: bool,
    pub filename: String,
    pub line: usize,
}

/// A host key database with `@cert-authority` awareness.
///
/// Besides the host key callback, it can list the known keys of a host and the
/// host key algorithms to offer during key exchange. Algorithms of keys on
/// `@cert-authority` lines are reported as their certificate variants.
///
/// The database is immutable once built and may be shared between sessions.
#[derive(Clone)]
pub struct HostKeyDb {
    callback: HostKeyCallback,
    cert_lines: HashSet<(String, usize)>,
}

impl fmt::Debug for HostKeyDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKeyDb")
            .field("cert_lines", &self.cert_lines)
            .finish()
    }
}

impl HostKeyDb {
    /// Reads the given known_hosts files.
    ///
    /// The files are read a second time to find the `@cert-authority` lines. Their
    /// order does not matter.
    pub fn new<P: AsRef<Path>>(files: &[P]) -> Result<Self, Error> {
        let callback = matcher::new(files)?;
        let mut cert_lines = HashSet::new();

        for path in files {
            let filename = display_name(path.as_ref());
            let file = File::open(path.as_ref()).map_err(|e| Error::io_at(&filename, None, e))?;

            let mut line_num = 0;
            for line in raw_lines(BufReader::new(file)) {
                let line = line.map_err(|e| Error::io_at(&filename, Some(line_num), e))?;
                line_num += 1;
                if is_cert_authority_line(&String::from_utf8_lossy(&line)) {
                    tracing::trace!("{}:{}: @cert-authority line", filename, line_num);
                    cert_lines.insert((filename.clone(), line_num));
                }
            }
        }
        tracing::debug!("found {} @cert-authority lines", cert_lines.len());

        Ok(Self {
            callback,
            cert_lines,
        })
    }

    /// Returns the host key callback for use during key exchange.
    pub fn host_key_callback(&self) -> HostKeyCallback {
        self.callback.clone()
    }

    /// Returns the known keys of `host_with_port`, or an empty list if the host is unknown.
    ///
    /// Keys are sorted by known_hosts filename and line number.
    pub fn host_keys(&self, host_with_port: &str) -> Result<Vec<KnownHostKey>, Error> {
        let placeholder_addr = SocketAddr::from(([0, 0, 0, 0], 0));
        match (self.callback)(host_with_port, placeholder_addr, &PlaceholderKey) {
            Ok(()) => Ok(vec![]),
            Err(err) => match err.into_wanted_keys() {
                Ok(want) => {
                    tracing::debug!("{} known keys for {}", want.len(), host_with_port);
                    Ok(self.annotate(want))
                }
                Err(err) => Err(Error::contract(err)),
            },
        }
    }

    /// Returns the host key algorithms for `host_with_port`, or an empty list if the
    /// host is unknown.
    ///
    /// The result may be offered during key exchange as-is or after filtering. It
    /// follows the order of [`host_keys`](Self::host_keys), with the SHA-2 variants of
    /// RSA ahead of `ssh-rsa`, and holds no duplicates.
    pub fn host_key_algorithms(&self, host_with_port: &str) -> Result<Vec<String>, Error> {
        let keys = self.host_keys(host_with_port)?;
        Ok(algorithms(&keys))
    }

    pub(crate) fn annotate(&self, mut want: Vec<KnownKey>) -> Vec<KnownHostKey> {
        want.sort_by(|a, b| (&a.filename, a.line).cmp(&(&b.filename, b.line)));
        want.into_iter()
            .map(|known| {
                // Without an index, CA awareness is off.
                let cert_authority = !self.cert_lines.is_empty()
                    && self
                        .cert_lines
                        .contains(&(known.filename.clone(), known.line));
                KnownHostKey {
                    key: known.key,
                    cert_authority,
                    filename: known.filename,
                    line: known.line,
                }
            })
            .collect()
    }
}

fn is_cert_authority_line(line: &str) -> bool {
    line.trim()
        .strip_prefix(MARKER_CERT_AUTHORITY)
        .map_or(false, |rest| rest.starts_with(|c: char| c == ' ' || c == '\t'))
}

fn algorithms(keys: &[KnownHostKey]) -> Vec<String> {
    let mut algos = Vec::with_capacity(keys.len());
    let mut seen = HashSet::with_capacity(keys.len());
    let mut add = |typ: &str, cert: bool| {
        let algo = if cert {
            match consts::cert_algorithm(typ) {
                Some(algo) => algo,
                None => {
                    tracing::warn!("no certificate algorithm for key type {:?}, omitted", typ);
                    return;
                }
            }
        } else {
            typ
        };
        if seen.insert(algo.to_owned()) {
            algos.push(algo.to_owned());
        }
    };

    for key in keys {
        let typ = key.key.key_type();
        if typ == KEY_ALGO_RSA {
            // rsa-sha2-* are signature algorithms, never key formats (RFC 8332, Section 2).
            add(KEY_ALGO_RSA_SHA512, key.cert_authority);
            add(KEY_ALGO_RSA_SHA256, key.cert_authority);
        }
        add(typ, key.cert_authority);
    }
    algos
}

/// A host key callback with host key lookups, without `@cert-authority` awareness.
///
/// Keys on `@cert-authority` lines look like ordinary host keys here. Use
/// [`HostKeyDb`] where CA lines may appear.
#[derive(Clone)]
pub struct KnownHosts(HostKeyCallback);

impl fmt::Debug for KnownHosts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KnownHosts").finish()
    }
}

impl KnownHosts {
    /// Reads the given known_hosts files. Their order does not matter.
    pub fn new<P: AsRef<Path>>(files: &[P]) -> Result<Self, Error> {
        matcher::new(files).map(Self)
    }

    /// Wraps an existing host key callback.
    pub fn from_callback(callback: HostKeyCallback) -> Self {
        Self(callback)
    }

    pub fn host_key_callback(&self) -> HostKeyCallback {
        self.0.clone()
    }

    /// Like [`HostKeyDb::host_keys`], but without telling CA keys apart.
    pub fn host_keys(&self, host_with_port: &str) -> Result<Vec<Arc<dyn PublicKey>>, Error> {
        let keys = self.as_db().host_keys(host_with_port)?;
        Ok(keys.into_iter().map(|known| known.key).collect())
    }

    /// Like [`HostKeyDb::host_key_algorithms`], but never returns certificate algorithms.
    pub fn host_key_algorithms(&self, host_with_port: &str) -> Result<Vec<String>, Error> {
        self.as_db().host_key_algorithms(host_with_port)
    }

    /// A database without a CA index.
    pub(crate) fn as_db(&self) -> HostKeyDb {
        HostKeyDb {
            callback: self.0.clone(),
            cert_lines: HashSet::new(),
        }
    }
}

/// Looks up host key algorithms on a bare host key callback.
///
/// Certificate algorithms are never returned; see [`KnownHosts::host_key_algorithms`].
pub fn host_key_algorithms(
    callback: &HostKeyCallback,
    host_with_port: &str,
) -> Result<Vec<String>, Error> {
    KnownHosts::from_callback(callback.clone()).host_key_algorithms(host_with_port)
}
