//! Classification of host key callback results.

use crate::{
    db::{HostKeyDb, KnownHostKey, KnownHosts},
    error::Error,
    key::PublicKey,
    line::write_known_host,
    matcher::{display_name, HostKeyCallback},
};
use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

/// The result of checking a host key against known_hosts.
#[derive(Clone, Debug)]
pub enum HostKeyOutcome {
    /// The key is pinned for the host or certified by a trusted authority.
    Trusted,
    /// The host is known under other keys. This must never be ignored.
    KeyChanged { want: Vec<KnownHostKey> },
    /// The host has no known keys.
    HostUnknown,
}

impl HostKeyOutcome {
    pub fn is_trusted(&self) -> bool {
        matches!(self, HostKeyOutcome::Trusted)
    }
}

impl HostKeyDb {
    /// Checks `key` as presented by `remote`, dialed as `hostname`.
    ///
    /// Revoked keys and rejected certificates are returned as errors, as are
    /// results the callback is not expected to produce.
    pub fn verify(
        &self,
        hostname: &str,
        remote: SocketAddr,
        key: &dyn PublicKey,
    ) -> Result<HostKeyOutcome, Error> {
        let result = (self.host_key_callback())(hostname, remote, key);
        classify(self, result)
    }

    /// Returns a callback that records unknown hosts in `path`. See [`accept_new`].
    pub fn accept_new_callback(&self, path: impl Into<PathBuf>) -> HostKeyCallback {
        accept_new(self.host_key_callback(), path)
    }
}

impl KnownHosts {
    /// Like [`HostKeyDb::verify`]. Keys from `@cert-authority` lines are not flagged.
    pub fn verify(
        &self,
        hostname: &str,
        remote: SocketAddr,
        key: &dyn PublicKey,
    ) -> Result<HostKeyOutcome, Error> {
        let result = (self.host_key_callback())(hostname, remote, key);
        classify(&self.as_db(), result)
    }

    pub fn accept_new_callback(&self, path: impl Into<PathBuf>) -> HostKeyCallback {
        accept_new(self.host_key_callback(), path)
    }
}

fn classify(db: &HostKeyDb, result: Result<(), Error>) -> Result<HostKeyOutcome, Error> {
    let err = match result {
        Ok(()) => return Ok(HostKeyOutcome::Trusted),
        Err(err) => err,
    };
    match err.into_wanted_keys() {
        Ok(want) if want.is_empty() => Ok(HostKeyOutcome::HostUnknown),
        Ok(want) => Ok(HostKeyOutcome::KeyChanged {
            want: db.annotate(want),
        }),
        Err(err) => Err(err),
    }
}

/// Wraps `inner` to trust new hosts on first use.
///
/// Keys of unknown hosts are appended to the known_hosts file at `path`, which is
/// created if missing, and the connection is permitted. If the append fails, the
/// error is returned instead. Changed keys fail with an error for which
/// [`Error::is_host_key_changed`] holds and which warns about a possible
/// man-in-the-middle attack. Other results of `inner` pass through.
///
/// Hosts added this way are not trusted by `inner` until the store is rebuilt.
pub fn accept_new(inner: HostKeyCallback, path: impl Into<PathBuf>) -> HostKeyCallback {
    let path = path.into();
    Arc::new(
        move |hostname: &str, remote: SocketAddr, key: &dyn PublicKey| -> Result<(), Error> {
            let err = match inner(hostname, remote, key) {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            match err.into_wanted_keys() {
                Ok(want) if want.is_empty() => {
                    append(&path, hostname, remote, key)?;
                    tracing::info!(
                        "permanently added {} key for {} to {}",
                        key.key_type(),
                        hostname,
                        path.display()
                    );
                    Ok(())
                }
                Ok(want) => {
                    tracing::warn!("host key for {} has changed", hostname);
                    Err(Error::host_key_changed(hostname, want))
                }
                Err(err) => Err(err),
            }
        },
    )
}

fn append(path: &Path, hostname: &str, remote: SocketAddr, key: &dyn PublicKey) -> Result<(), Error> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io_at(&display_name(path), None, e))?;
    write_known_host(file, hostname, remote, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{key::key_eq, key::serialize, testing};
    use std::{fs, io::Write as _};
    use tempfile::NamedTempFile;

    fn remote() -> SocketAddr {
        SocketAddr::from(([192, 0, 2, 1], 22))
    }

    fn known_hosts(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn trusted() {
        let key = testing::ed25519_key(1);
        let file = known_hosts(&format!("example.com {}\n", serialize(&key)));
        let db = HostKeyDb::new(&[file.path()]).unwrap();
        assert!(db.verify("example.com:22", remote(), &key).unwrap().is_trusted());
    }

    #[test]
    fn changed_key_lists_known_keys() {
        let a = testing::ed25519_key(1);
        let b = testing::ecdsa256_key(1);
        let file = known_hosts(&format!("example.com {}\n", serialize(&a)));
        let db = HostKeyDb::new(&[file.path()]).unwrap();

        match db.verify("example.com:22", remote(), &b).unwrap() {
            HostKeyOutcome::KeyChanged { want } => {
                assert_eq!(want.len(), 1);
                assert!(key_eq(&*want[0].key, &a));
                assert!(!want[0].cert_authority);
            }
            outcome => panic!("unexpected outcome: {:?}", outcome),
        }
    }

    #[test]
    fn unknown_host() {
        let file = known_hosts(&format!(
            "example.com {}\n",
            serialize(&testing::ed25519_key(1))
        ));
        let kh = KnownHosts::new(&[file.path()]).unwrap();
        let outcome = kh
            .verify("other.example.com:22", remote(), &testing::ed25519_key(2))
            .unwrap();
        assert!(matches!(outcome, HostKeyOutcome::HostUnknown));
    }

    #[test]
    fn revoked_key_is_an_error() {
        let key = testing::ed25519_key(1);
        let file = known_hosts(&format!("@revoked * {}\n", serialize(&key)));
        let db = HostKeyDb::new(&[file.path()]).unwrap();
        assert!(db.verify("example.com:22", remote(), &key).unwrap_err().is_revoked());
    }

    #[test]
    fn written_host_becomes_trusted() {
        let key = testing::rsa_key(1);
        let file = known_hosts("# known hosts\n");
        let db = HostKeyDb::new(&[file.path()]).unwrap();
        assert!(matches!(
            db.verify("example.com:2222", remote(), &key).unwrap(),
            HostKeyOutcome::HostUnknown
        ));

        let out = OpenOptions::new().append(true).open(file.path()).unwrap();
        write_known_host(out, "example.com:2222", remote(), &key).unwrap();

        let db = HostKeyDb::new(&[file.path()]).unwrap();
        assert!(db.verify("example.com:2222", remote(), &key).unwrap().is_trusted());
        // The remote address is recorded as well.
        assert!(db.verify("", remote(), &key).unwrap().is_trusted());
    }

    #[test]
    fn hashed_hostname_is_trusted() {
        let key = testing::ed25519_key(1);
        let hashed = crate::line::hash_hostname("example.com:2222").unwrap();
        let file = known_hosts(&format!("{} {}\n", hashed, serialize(&key)));
        let kh = KnownHosts::new(&[file.path()]).unwrap();
        assert!(kh.verify("example.com:2222", remote(), &key).unwrap().is_trusted());
        assert!(matches!(
            kh.verify("example.com:22", remote(), &key).unwrap(),
            HostKeyOutcome::HostUnknown
        ));
    }

    #[test]
    fn accept_new_appends_unknown_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        fs::write(&path, "").unwrap();

        let key = testing::ed25519_key(1);
        let db = HostKeyDb::new(&[&path]).unwrap();
        let callback = db.accept_new_callback(&path);
        callback("example.com:22", remote(), &key).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("example.com,192.0.2.1 {}\n", serialize(&key))
        );
        let db = HostKeyDb::new(&[&path]).unwrap();
        assert!(db.verify("example.com:22", remote(), &key).unwrap().is_trusted());
    }

    #[test]
    fn accept_new_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        let key = testing::ed25519_key(1);

        let inner = testing::callback(|_, _, _| Err(Error::key_mismatch(vec![])));
        accept_new(inner, &path)("example.com", remote(), &key).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn accept_new_rejects_changed_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        fs::write(&path, format!("example.com {}\n", serialize(&testing::ed25519_key(1)))).unwrap();

        let kh = KnownHosts::new(&[&path]).unwrap();
        let callback = kh.accept_new_callback(&path);
        let err = callback("example.com:22", remote(), &testing::ed25519_key(2)).unwrap_err();
        assert!(err.is_host_key_changed());
        assert!(err.to_string().contains("REMOTE HOST IDENTIFICATION HAS CHANGED"));
        assert_eq!(err.wanted_keys().map(|want| want.len()), Some(1));

        // Nothing was appended.
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn accept_new_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let inner = testing::callback(|_, _, _| Err(Error::key_mismatch(vec![])));
        // A directory cannot be opened for appending.
        let err = accept_new(inner, dir.path())("example.com", remote(), &testing::ed25519_key(1))
            .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn accept_new_keeps_store_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        fs::write(&path, "").unwrap();
        let key = testing::ed25519_key(1);
        let callback = HostKeyDb::new(&[&path]).unwrap().accept_new_callback(&path);

        // No address to record.
        let err = callback("", SocketAddr::from(([0, 0, 0, 0], 0)), &key).unwrap_err();
        assert!(err.is_format());
        // A line break would split the record.
        let err = callback("evil\nexample.com", remote(), &key).unwrap_err();
        assert!(err.is_format());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        // Dialed by address only.
        callback("", remote(), &key).unwrap();
        let db = HostKeyDb::new(&[&path]).unwrap();
        assert!(db.verify("", remote(), &key).unwrap().is_trusted());
        assert!(db.verify("192.0.2.1:22", remote(), &key).unwrap().is_trusted());
    }
}
