//! Host public keys.
//!
//! Keys are handled through the [`PublicKey`] trait so that callers can pass the key
//! type of their SSH implementation into a host key callback. [`HostKey`] is the
//! concrete key parsed from known_hosts lines and wire blobs.

use crate::{
    cert::Certificate,
    consts::*,
    util::{get_ssh_string, put_ssh_string, trim_mpint},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::signature;
use std::{fmt, sync::Arc};

#[derive(Debug, thiserror::Error)]
#[error("signature verification failed")]
pub struct VerifyError;

#[derive(Debug, thiserror::Error)]
pub enum KeyParseError {
    #[error("truncated key data")]
    Truncated,
    #[error("trailing data after key")]
    TrailingData,
    #[error("unsupported key type {0:?}")]
    UnsupportedKeyType(String),
    #[error("invalid {0} key")]
    InvalidKey(&'static str),
    #[error("invalid base64 key data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("missing key data")]
    Missing,
}

/// A public key presented by a server or recorded in known_hosts.
pub trait PublicKey: fmt::Debug + Send + Sync {
    /// Returns the name of the key format, e.g. `ssh-ed25519`.
    fn key_type(&self) -> &str;

    /// Returns the canonical wire encoding of the key.
    fn marshal(&self) -> &[u8];

    /// Verify the signature of `data` made by the corresponding private key.
    fn verify(&self, data: &[u8], signature: &Signature<'_>) -> Result<(), VerifyError>;

    /// Returns the certificate if this key is an OpenSSH certificate.
    fn as_certificate(&self) -> Option<&Certificate> {
        None
    }
}

/// Compares two keys by their type and wire encoding.
pub fn key_eq(a: &dyn PublicKey, b: &dyn PublicKey) -> bool {
    a.key_type() == b.key_type() && a.marshal() == b.marshal()
}

/// Returns `type base64`, the key part of a known_hosts line.
pub fn serialize(key: &dyn PublicKey) -> String {
    format!("{} {}", key.key_type(), STANDARD.encode(key.marshal()))
}

/// Parses a key or a certificate from its wire encoding.
pub fn parse_public_key(blob: &[u8]) -> Result<Arc<dyn PublicKey>, KeyParseError> {
    let mut data = blob;
    let typ = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
    match std::str::from_utf8(typ).ok().and_then(certified_key_type) {
        Some(..) => Ok(Arc::new(Certificate::parse(blob)?)),
        None => Ok(Arc::new(HostKey::parse(blob)?)),
    }
}

/// Parses `type base64 [comment]`.
///
/// The type field is informational only; the type inside the decoded blob wins.
pub fn parse_key_line(s: &str) -> Result<Arc<dyn PublicKey>, KeyParseError> {
    let mut fields = s.split_whitespace();
    let _typ = fields.next().ok_or(KeyParseError::Missing)?;
    let encoded = fields.next().ok_or(KeyParseError::Missing)?;
    let blob = STANDARD.decode(encoded)?;
    parse_public_key(&blob)
}

/// A plain (non-certificate) public key.
#[derive(Clone, PartialEq, Eq)]
pub struct HostKey {
    key_type: String,
    fields: Vec<Vec<u8>>,
    blob: Vec<u8>,
}

impl fmt::Debug for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostKey").field(&serialize(self)).finish()
    }
}

impl HostKey {
    /// Parses the wire encoding of a plain key, rejecting trailing bytes.
    pub fn parse(blob: &[u8]) -> Result<Self, KeyParseError> {
        let mut data = blob;
        let typ = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        let typ = std::str::from_utf8(typ).map_err(|_| {
            KeyParseError::UnsupportedKeyType(String::from_utf8_lossy(typ).into_owned())
        })?;
        let fields = read_key_fields(typ, &mut data)?;
        if !data.is_empty() {
            return Err(KeyParseError::TrailingData);
        }
        Ok(Self::from_fields(typ, fields))
    }

    #[cfg(test)]
    pub(crate) fn fields(&self) -> impl Iterator<Item = &[u8]> {
        self.fields.iter().map(Vec::as_slice)
    }

    pub(crate) fn from_fields(typ: &str, fields: Vec<&[u8]>) -> Self {
        let mut blob = vec![];
        put_ssh_string(&mut blob, typ.as_bytes());
        for field in &fields {
            put_ssh_string(&mut blob, field);
        }
        Self {
            key_type: typ.to_owned(),
            fields: fields.into_iter().map(|field| field.to_vec()).collect(),
            blob,
        }
    }

    fn verify_ed25519(&self, data: &[u8], sig: &Signature<'_>) -> Result<(), VerifyError> {
        if sig.sig_type != KEY_ALGO_ED25519.as_bytes() {
            return Err(VerifyError); // key type mismatched
        }
        signature::UnparsedPublicKey::new(&signature::ED25519, &self.fields[0])
            .verify(data, sig.sig_data)
            .map_err(|_| VerifyError)
    }

    fn verify_ecdsa(
        &self,
        algorithm: &'static signature::EcdsaVerificationAlgorithm,
        scalar_len: usize,
        data: &[u8],
        sig: &Signature<'_>,
    ) -> Result<(), VerifyError> {
        if sig.sig_type != self.key_type.as_bytes() {
            return Err(VerifyError);
        }

        // The signature is (mpint r, mpint s); ring wants r || s, each left-padded.
        let mut sig_data = sig.sig_data;
        let mut fixed = vec![0u8; scalar_len * 2];
        for half in fixed.chunks_mut(scalar_len) {
            let n = get_ssh_string(&mut sig_data).ok_or(VerifyError)?;
            let n = trim_mpint(n);
            if n.len() > scalar_len {
                return Err(VerifyError);
            }
            half[scalar_len - n.len()..].copy_from_slice(n);
        }

        signature::UnparsedPublicKey::new(algorithm, &self.fields[1])
            .verify(data, &fixed)
            .map_err(|_| VerifyError)
    }

    fn verify_rsa(&self, data: &[u8], sig: &Signature<'_>) -> Result<(), VerifyError> {
        let params = match sig.sig_type {
            b"ssh-rsa" => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
            b"rsa-sha2-256" => &signature::RSA_PKCS1_2048_8192_SHA256,
            b"rsa-sha2-512" => &signature::RSA_PKCS1_2048_8192_SHA512,
            _ => return Err(VerifyError),
        };
        let components = signature::RsaPublicKeyComponents {
            n: trim_mpint(&self.fields[1]),
            e: trim_mpint(&self.fields[0]),
        };
        components
            .verify(params, data, sig.sig_data)
            .map_err(|_| VerifyError)
    }
}

impl PublicKey for HostKey {
    fn key_type(&self) -> &str {
        &self.key_type
    }

    fn marshal(&self) -> &[u8] {
        &self.blob
    }

    fn verify(&self, data: &[u8], sig: &Signature<'_>) -> Result<(), VerifyError> {
        match self.key_type.as_str() {
            KEY_ALGO_ED25519 => self.verify_ed25519(data, sig),
            KEY_ALGO_ECDSA256 => {
                self.verify_ecdsa(&signature::ECDSA_P256_SHA256_FIXED, 32, data, sig)
            }
            KEY_ALGO_ECDSA384 => {
                self.verify_ecdsa(&signature::ECDSA_P384_SHA384_FIXED, 48, data, sig)
            }
            KEY_ALGO_RSA => self.verify_rsa(data, sig),
            _ => Err(VerifyError), // unsupported key type
        }
    }
}

/// Reads the type-specific fields of a key, after its type name.
pub(crate) fn read_key_fields<'a>(
    typ: &str,
    data: &mut &'a [u8],
) -> Result<Vec<&'a [u8]>, KeyParseError> {
    let count = match typ {
        KEY_ALGO_RSA => 2,                                            // e, n
        KEY_ALGO_DSA => 4,                                            // p, q, g, y
        KEY_ALGO_ED25519 => 1,                                        // pk
        KEY_ALGO_SK_ED25519 => 2,                                     // pk, application
        KEY_ALGO_ECDSA256 | KEY_ALGO_ECDSA384 | KEY_ALGO_ECDSA521 => 2, // curve, Q
        KEY_ALGO_SK_ECDSA256 => 3,                                    // curve, Q, application
        _ => return Err(KeyParseError::UnsupportedKeyType(typ.to_owned())),
    };

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(get_ssh_string(data).ok_or(KeyParseError::Truncated)?);
    }

    let curve: Option<&[u8]> = match typ {
        KEY_ALGO_ECDSA256 | KEY_ALGO_SK_ECDSA256 => Some(b"nistp256"),
        KEY_ALGO_ECDSA384 => Some(b"nistp384"),
        KEY_ALGO_ECDSA521 => Some(b"nistp521"),
        _ => None,
    };
    if let Some(curve) = curve {
        if fields[0] != curve {
            return Err(KeyParseError::InvalidKey("ecdsa"));
        }
    }
    if (typ == KEY_ALGO_ED25519 || typ == KEY_ALGO_SK_ED25519) && fields[0].len() != 32 {
        return Err(KeyParseError::InvalidKey("ed25519"));
    }

    Ok(fields)
}

/// A signature in its wire encoding: `string format, string blob`.
#[non_exhaustive]
pub struct Signature<'sig> {
    pub sig_type: &'sig [u8],
    pub sig_data: &'sig [u8],
}

impl<'sig> Signature<'sig> {
    pub fn parse(mut blob: &'sig [u8]) -> Option<Self> {
        let sig_type = get_ssh_string(&mut blob)?;
        let sig_data = get_ssh_string(&mut blob)?;
        Some(Self { sig_type, sig_data })
    }
}

/// A key that is never equal to a key stored in known_hosts.
///
/// Its type name is not a key format this crate can parse, so no known_hosts line
/// can hold it. Presenting it to a host key callback makes the callback report
/// every key it knows for the host.
#[derive(Debug)]
pub(crate) struct PlaceholderKey;

impl PublicKey for PlaceholderKey {
    fn key_type(&self) -> &str {
        "knownhosts-placeholder-key"
    }

    fn marshal(&self) -> &[u8] {
        b"knownhosts placeholder key"
    }

    fn verify(&self, _: &[u8], _: &Signature<'_>) -> Result<(), VerifyError> {
        Err(VerifyError)
    }
}
