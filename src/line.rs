//! Serialization of known_hosts lines.

use crate::{
    consts::{HASHED_HOST_MAGIC, HASHED_HOST_SALT_LEN},
    error::Error,
    key::{self, PublicKey},
    matcher::{hash_host, is_host_pattern},
    normalize::normalize,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::rand::{SecureRandom as _, SystemRandom};
use std::{io, net::SocketAddr};
use tokio::io::{AsyncWrite, AsyncWriteExt as _};

/// The remote address of lookups that have no real connection behind them.
const PLACEHOLDER_REMOTE: &str = "[0.0.0.0]:0";

/// Returns a known_hosts line for `key`, without the trailing newline.
///
/// Every address is normalized. Addresses containing whitespace produce a line
/// that cannot be read back; [`write_known_host`] rejects them.
pub fn line<S: AsRef<str>>(addresses: &[S], key: &dyn PublicKey) -> String {
    let hosts: Vec<String> = addresses.iter().map(|addr| normalize(addr.as_ref())).collect();
    format!("{} {}", hosts.join(","), key::serialize(key))
}

/// Appends a line for the host dialed as `hostname` at `remote` to `w`.
///
/// The remote address is recorded next to the hostname unless it is the
/// `0.0.0.0:0` placeholder or the same address. An empty hostname records the
/// remote address alone. Nothing is written if the hostname cannot be read back
/// from a known_hosts line (whitespace, control characters, commas, markers) or
/// if no address is left to record.
pub fn write_known_host<W: io::Write>(
    mut w: W,
    hostname: &str,
    remote: SocketAddr,
    key: &dyn PublicKey,
) -> Result<(), Error> {
    let entry = entry(hostname, remote, key)?;
    w.write_all(entry.as_bytes())?;
    Ok(())
}

/// Like [`write_known_host`], for asynchronous writers.
pub async fn write_known_host_async<W: AsyncWrite + Unpin>(
    mut w: W,
    hostname: &str,
    remote: SocketAddr,
    key: &dyn PublicKey,
) -> Result<(), Error> {
    let entry = entry(hostname, remote, key)?;
    w.write_all(entry.as_bytes()).await?;
    w.flush().await?;
    Ok(())
}

fn entry(hostname: &str, remote: SocketAddr, key: &dyn PublicKey) -> Result<String, Error> {
    let hostname = normalize(hostname);
    let mut addresses = vec![];
    // An empty hostname means the host was dialed by its remote address.
    if !hostname.is_empty() {
        if !is_recordable(&hostname) {
            return Err(Error::format(hostname));
        }
        addresses.push(hostname);
    }

    let remote = normalize(&remote.to_string());
    if remote != PLACEHOLDER_REMOTE && !addresses.contains(&remote) && is_recordable(&remote) {
        addresses.push(remote);
    }
    if addresses.is_empty() {
        return Err(Error::format(""));
    }

    let mut entry = line(&addresses, key);
    entry.push('\n');
    Ok(entry)
}

/// Returns `true` if `addr` can be stored as one host of a known_hosts line.
fn is_recordable(addr: &str) -> bool {
    !addr.is_empty()
        && !addr.contains(|c: char| c.is_whitespace() || c.is_control() || c == ',')
        && !addr.starts_with(|c: char| c == '@' || c == '#' || c == '!')
        && is_host_pattern(addr)
}

/// Hashes a hostname the way `ssh-keygen -H` does, returning `|1|salt|hash`.
///
/// The result can stand in for the host patterns of a known_hosts line.
pub fn hash_hostname(hostname: &str) -> Result<String, Error> {
    let mut salt = [0u8; HASHED_HOST_SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| Error::random())?;
    Ok(hashed_entry(&normalize(hostname), &salt))
}

fn hashed_entry(entry: &str, salt: &[u8]) -> String {
    let hash = hash_host(entry, salt);
    format!(
        "{}{}|{}",
        HASHED_HOST_MAGIC,
        STANDARD.encode(salt),
        STANDARD.encode(hash.as_ref())
    )
}
