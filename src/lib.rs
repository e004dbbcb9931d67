//! Host key verification against OpenSSH known_hosts files.
//!
//! [`HostKeyDb`] reads known_hosts files and provides a host key callback for
//! use during key exchange, the known keys of a host, and the host key
//! algorithms to offer for it. Keys on `@cert-authority` lines are told apart,
//! so that certificate algorithms are offered for hosts covered by a trusted
//! authority.
//!
//! The outcome of a check is either trusted, a changed key, or an unknown host.
//! A changed key must always abort the connection; an unknown host may be
//! recorded with [`write_known_host`] or [`accept_new`].

pub mod cert;
pub mod consts;
mod db;
mod error;
pub mod key;
mod line;
mod matcher;
pub mod normalize;
mod util;
mod verify;

#[cfg(test)]
mod testing;

pub use crate::{
    cert::Certificate,
    db::{host_key_algorithms, HostKeyDb, KnownHostKey, KnownHosts},
    error::Error,
    key::{key_eq, parse_key_line, parse_public_key, HostKey, PublicKey, Signature},
    line::{hash_hostname, line, write_known_host, write_known_host_async},
    matcher::{HostKeyCallback, KnownKey},
    normalize::{normalize, split_host_port},
    verify::{accept_new, HostKeyOutcome},
};
