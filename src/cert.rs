//! OpenSSH host certificates.

// Refs:
// * https://cvsweb.openbsd.org/src/usr.bin/ssh/PROTOCOL.certkeys

use crate::{
    consts::{self, CERT_TIME_INFINITY, SSH_CERT_TYPE_HOST, SSH_CERT_TYPE_USER},
    key::{read_key_fields, HostKey, KeyParseError, PublicKey, Signature, VerifyError},
    util::{get_ssh_string, get_u32, get_u64},
};

/// Reasons for rejecting a certificate presented as a host key.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("certificate presented as a host key has type {0}")]
    NotHostCertificate(u32),
    #[error("no authorities for hostname: {0}")]
    NoAuthority(String),
    #[error("principal {0:?} not in the set of valid principals for given certificate")]
    PrincipalNotListed(String),
    #[error("unsupported critical option {0:?} in certificate")]
    UnsupportedCriticalOption(String),
    #[error("certificate is not yet valid")]
    NotYetValid,
    #[error("certificate has expired")]
    Expired,
    #[error("certificate signature does not verify")]
    BadSignature,
}

#[derive(Clone, Debug)]
pub struct Certificate {
    blob: Vec<u8>,
    format: String,
    nonce: Vec<u8>,
    key: HostKey,
    serial: u64,
    cert_type: u32,
    key_id: String,
    valid_principals: Vec<String>,
    valid_after: u64,
    valid_before: u64,
    critical_options: Vec<(String, Vec<u8>)>,
    extensions: Vec<(String, Vec<u8>)>,
    signature_key: HostKey,
    signature: Vec<u8>,
    signed_len: usize,
}

impl Certificate {
    pub fn parse(blob: &[u8]) -> Result<Self, KeyParseError> {
        let mut data = blob;
        let format = utf8(get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?)?;
        let key_type = consts::certified_key_type(&format)
            .ok_or_else(|| KeyParseError::UnsupportedKeyType(format.clone()))?;

        let nonce = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        let key = HostKey::from_fields(key_type, read_key_fields(key_type, &mut data)?);
        let serial = get_u64(&mut data).ok_or(KeyParseError::Truncated)?;
        let cert_type = get_u32(&mut data).ok_or(KeyParseError::Truncated)?;
        let key_id = utf8(get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?)?;

        let mut principals = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        let mut valid_principals = vec![];
        while !principals.is_empty() {
            let principal = get_ssh_string(&mut principals).ok_or(KeyParseError::Truncated)?;
            valid_principals.push(utf8(principal)?);
        }

        let valid_after = get_u64(&mut data).ok_or(KeyParseError::Truncated)?;
        let valid_before = get_u64(&mut data).ok_or(KeyParseError::Truncated)?;
        let critical_options =
            parse_options(get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?)?;
        let extensions =
            parse_options(get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?)?;
        let _reserved = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        let signature_key =
            HostKey::parse(get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?)?;

        let signed_len = blob.len() - data.len();
        let signature = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        if !data.is_empty() {
            return Err(KeyParseError::TrailingData);
        }

        Ok(Self {
            blob: blob.to_vec(),
            format,
            nonce: nonce.to_vec(),
            key,
            serial,
            cert_type,
            key_id,
            valid_principals,
            valid_after,
            valid_before,
            critical_options,
            extensions,
            signature_key,
            signature: signature.to_vec(),
            signed_len,
        })
    }

    /// The certified key.
    pub fn key(&self) -> &HostKey {
        &self.key
    }

    /// The key of the certificate authority that signed this certificate.
    pub fn signature_key(&self) -> &HostKey {
        &self.signature_key
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn valid_principals(&self) -> &[String] {
        &self.valid_principals
    }

    pub fn valid_after(&self) -> u64 {
        self.valid_after
    }

    pub fn valid_before(&self) -> u64 {
        self.valid_before
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_host_certificate(&self) -> bool {
        self.cert_type == SSH_CERT_TYPE_HOST
    }

    pub fn is_user_certificate(&self) -> bool {
        self.cert_type == SSH_CERT_TYPE_USER
    }

    pub(crate) fn cert_type(&self) -> u32 {
        self.cert_type
    }

    /// Checks that the certificate is usable for `principal` at `now` (seconds since
    /// the Unix epoch) and that its signature verifies with its signature key.
    ///
    /// Whether the signature key is trusted is up to the caller.
    pub fn check(&self, principal: &str, now: u64) -> Result<(), CertError> {
        if !self.valid_principals.is_empty()
            && !self.valid_principals.iter().any(|p| p == principal)
        {
            return Err(CertError::PrincipalNotListed(principal.to_owned()));
        }

        // No critical options are defined for host certificates.
        if let Some((name, _)) = self.critical_options.first() {
            return Err(CertError::UnsupportedCriticalOption(name.clone()));
        }

        if now < self.valid_after {
            return Err(CertError::NotYetValid);
        }
        if self.valid_before != CERT_TIME_INFINITY && now >= self.valid_before {
            return Err(CertError::Expired);
        }

        let signature = Signature::parse(&self.signature).ok_or(CertError::BadSignature)?;
        self.signature_key
            .verify(&self.blob[..self.signed_len], &signature)
            .map_err(|_| CertError::BadSignature)
    }
}

impl PublicKey for Certificate {
    fn key_type(&self) -> &str {
        &self.format
    }

    fn marshal(&self) -> &[u8] {
        &self.blob
    }

    fn verify(&self, data: &[u8], signature: &Signature<'_>) -> Result<(), VerifyError> {
        self.key.verify(data, signature)
    }

    fn as_certificate(&self) -> Option<&Certificate> {
        Some(self)
    }
}

fn utf8(s: &[u8]) -> Result<String, KeyParseError> {
    String::from_utf8(s.to_vec()).map_err(|_| KeyParseError::InvalidKey("certificate"))
}

fn parse_options(mut data: &[u8]) -> Result<Vec<(String, Vec<u8>)>, KeyParseError> {
    let mut options = vec![];
    while !data.is_empty() {
        let name = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        let value = get_ssh_string(&mut data).ok_or(KeyParseError::Truncated)?;
        options.push((utf8(name)?, value.to_vec()));
    }
    Ok(options)
}
