//! Keys and certificates for unit tests.

use crate::{
    cert::Certificate,
    consts::*,
    error::Error,
    key::{HostKey, PublicKey},
    matcher::{HostKeyCallback, KnownKey},
    util::put_ssh_string,
};
use bytes::BufMut;
use ring::{
    rand::SystemRandom,
    signature::{Ed25519KeyPair, KeyPair as _},
};
use std::{net::SocketAddr, sync::Arc};

pub(crate) fn ed25519_key(seed: u8) -> HostKey {
    HostKey::from_fields(KEY_ALGO_ED25519, vec![&[seed; 32][..]])
}

pub(crate) fn rsa_key(seed: u8) -> HostKey {
    let mut n = vec![0x00, 0xc0];
    n.extend_from_slice(&[seed; 255]);
    HostKey::from_fields(KEY_ALGO_RSA, vec![&[0x01, 0x00, 0x01][..], &n[..]])
}

pub(crate) fn ecdsa256_key(seed: u8) -> HostKey {
    let mut q = vec![0x04];
    q.extend_from_slice(&[seed; 64]);
    HostKey::from_fields(KEY_ALGO_ECDSA256, vec![&b"nistp256"[..], &q[..]])
}

pub(crate) fn dsa_key(seed: u8) -> HostKey {
    HostKey::from_fields(
        KEY_ALGO_DSA,
        vec![&[seed; 128][..], &[seed; 20][..], &[seed; 128][..], &[seed; 128][..]],
    )
}

pub(crate) fn known_key(filename: &str, line: usize, key: impl PublicKey + 'static) -> KnownKey {
    KnownKey {
        filename: filename.to_owned(),
        line,
        key: Arc::new(key),
    }
}

pub(crate) fn callback<F>(f: F) -> HostKeyCallback
where
    F: Fn(&str, SocketAddr, &dyn PublicKey) -> Result<(), Error> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An Ed25519 certificate authority.
pub(crate) struct CertAuthority {
    pair: Ed25519KeyPair,
    key: HostKey,
}

impl CertAuthority {
    pub(crate) fn generate() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("failed to generate key");
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("invalid PKCS#8 document");
        let key = HostKey::from_fields(KEY_ALGO_ED25519, vec![pair.public_key().as_ref()]);
        Self { pair, key }
    }

    pub(crate) fn key(&self) -> &HostKey {
        &self.key
    }
}

pub(crate) struct CertTemplate {
    pub(crate) cert_type: u32,
    pub(crate) principals: Vec<String>,
    pub(crate) valid_after: u64,
    pub(crate) valid_before: u64,
    pub(crate) critical_options: Vec<(&'static str, Vec<u8>)>,
}

impl CertTemplate {
    pub(crate) fn host(principals: &[&str]) -> Self {
        Self {
            cert_type: SSH_CERT_TYPE_HOST,
            principals: principals.iter().map(|&p| p.to_owned()).collect(),
            valid_after: 0,
            valid_before: CERT_TIME_INFINITY,
            critical_options: vec![],
        }
    }

    pub(crate) fn sign(&self, ca: &CertAuthority, key: &HostKey) -> Certificate {
        let format = cert_algorithm(key.key_type()).expect("no certificate format");

        let mut blob = vec![];
        put_ssh_string(&mut blob, format.as_bytes());
        put_ssh_string(&mut blob, &[0x5a; 32]); // nonce
        for field in key.fields() {
            put_ssh_string(&mut blob, field);
        }
        blob.put_u64(1); // serial
        blob.put_u32(self.cert_type);
        put_ssh_string(&mut blob, b"test-key-id");

        let mut principals = vec![];
        for principal in &self.principals {
            put_ssh_string(&mut principals, principal.as_bytes());
        }
        put_ssh_string(&mut blob, &principals);

        blob.put_u64(self.valid_after);
        blob.put_u64(self.valid_before);

        let mut options = vec![];
        for (name, value) in &self.critical_options {
            put_ssh_string(&mut options, name.as_bytes());
            put_ssh_string(&mut options, value);
        }
        put_ssh_string(&mut blob, &options);
        put_ssh_string(&mut blob, b""); // extensions
        put_ssh_string(&mut blob, b""); // reserved
        put_ssh_string(&mut blob, ca.key.marshal());

        let sig = ca.pair.sign(&blob);
        let mut signature = vec![];
        put_ssh_string(&mut signature, KEY_ALGO_ED25519.as_bytes());
        put_ssh_string(&mut signature, sig.as_ref());
        put_ssh_string(&mut blob, &signature);

        Certificate::parse(&blob).expect("invalid certificate")
    }
}
