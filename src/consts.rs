//! Names of public key formats and host key algorithms.

// defined in https://tools.ietf.org/html/rfc4253#section-6.6
pub const KEY_ALGO_RSA: &str = "ssh-rsa";
pub const KEY_ALGO_DSA: &str = "ssh-dss";

// defined in https://tools.ietf.org/html/rfc5656#section-6.2
pub const KEY_ALGO_ECDSA256: &str = "ecdsa-sha2-nistp256";
pub const KEY_ALGO_ECDSA384: &str = "ecdsa-sha2-nistp384";
pub const KEY_ALGO_ECDSA521: &str = "ecdsa-sha2-nistp521";

// defined in https://tools.ietf.org/html/rfc8709#section-4
pub const KEY_ALGO_ED25519: &str = "ssh-ed25519";

// defined in https://cvsweb.openbsd.org/src/usr.bin/ssh/PROTOCOL.u2f
pub const KEY_ALGO_SK_ECDSA256: &str = "sk-ecdsa-sha2-nistp256@openssh.com";
pub const KEY_ALGO_SK_ED25519: &str = "sk-ssh-ed25519@openssh.com";

// defined in https://tools.ietf.org/html/rfc8332#section-3
//
// These are signature algorithms only; the corresponding key format is always `ssh-rsa`.
pub const KEY_ALGO_RSA_SHA256: &str = "rsa-sha2-256";
pub const KEY_ALGO_RSA_SHA512: &str = "rsa-sha2-512";

// defined in https://cvsweb.openbsd.org/src/usr.bin/ssh/PROTOCOL.certkeys
pub const CERT_ALGO_RSA: &str = "ssh-rsa-cert-v01@openssh.com";
pub const CERT_ALGO_RSA_SHA256: &str = "rsa-sha2-256-cert-v01@openssh.com";
pub const CERT_ALGO_RSA_SHA512: &str = "rsa-sha2-512-cert-v01@openssh.com";
pub const CERT_ALGO_DSA: &str = "ssh-dss-cert-v01@openssh.com";
pub const CERT_ALGO_ECDSA256: &str = "ecdsa-sha2-nistp256-cert-v01@openssh.com";
pub const CERT_ALGO_ECDSA384: &str = "ecdsa-sha2-nistp384-cert-v01@openssh.com";
pub const CERT_ALGO_ECDSA521: &str = "ecdsa-sha2-nistp521-cert-v01@openssh.com";
pub const CERT_ALGO_SK_ECDSA256: &str = "sk-ecdsa-sha2-nistp256-cert-v01@openssh.com";
pub const CERT_ALGO_ED25519: &str = "ssh-ed25519-cert-v01@openssh.com";
pub const CERT_ALGO_SK_ED25519: &str = "sk-ssh-ed25519-cert-v01@openssh.com";

// certificate types
pub(crate) const SSH_CERT_TYPE_USER: u32 = 1;
pub(crate) const SSH_CERT_TYPE_HOST: u32 = 2;

/// `valid_before` value of a certificate that never expires.
pub(crate) const CERT_TIME_INFINITY: u64 = u64::MAX;

// known_hosts line markers
pub(crate) const MARKER_CERT_AUTHORITY: &str = "@cert-authority";
pub(crate) const MARKER_REVOKED: &str = "@revoked";

// hashed hostnames: "|1|" + base64(salt) + "|" + base64(HMAC-SHA1(salt, host))
pub(crate) const HASHED_HOST_MAGIC: &str = "|1|";
pub(crate) const HASHED_HOST_SALT_LEN: usize = 20;

/// Returns the certificate algorithm corresponding to a key algorithm.
pub fn cert_algorithm(key_algorithm: &str) -> Option<&'static str> {
    match key_algorithm {
        KEY_ALGO_RSA => Some(CERT_ALGO_RSA),
        KEY_ALGO_RSA_SHA256 => Some(CERT_ALGO_RSA_SHA256),
        KEY_ALGO_RSA_SHA512 => Some(CERT_ALGO_RSA_SHA512),
        KEY_ALGO_DSA => Some(CERT_ALGO_DSA),
        KEY_ALGO_ECDSA256 => Some(CERT_ALGO_ECDSA256),
        KEY_ALGO_SK_ECDSA256 => Some(CERT_ALGO_SK_ECDSA256),
        KEY_ALGO_ECDSA384 => Some(CERT_ALGO_ECDSA384),
        KEY_ALGO_ECDSA521 => Some(CERT_ALGO_ECDSA521),
        KEY_ALGO_ED25519 => Some(CERT_ALGO_ED25519),
        KEY_ALGO_SK_ED25519 => Some(CERT_ALGO_SK_ED25519),
        _ => None,
    }
}

/// Returns the key format certified by a certificate format.
///
/// Only wire formats are accepted here: `rsa-sha2-*-cert-v01@openssh.com` are
/// algorithm names that never appear as the type of a certificate blob.
pub(crate) fn certified_key_type(cert_type: &str) -> Option<&'static str> {
    match cert_type {
        CERT_ALGO_RSA => Some(KEY_ALGO_RSA),
        CERT_ALGO_DSA => Some(KEY_ALGO_DSA),
        CERT_ALGO_ECDSA256 => Some(KEY_ALGO_ECDSA256),
        CERT_ALGO_SK_ECDSA256 => Some(KEY_ALGO_SK_ECDSA256),
        CERT_ALGO_ECDSA384 => Some(KEY_ALGO_ECDSA384),
        CERT_ALGO_ECDSA521 => Some(KEY_ALGO_ECDSA521),
        CERT_ALGO_ED25519 => Some(KEY_ALGO_ED25519),
        CERT_ALGO_SK_ED25519 => Some(KEY_ALGO_SK_ED25519),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_format_has_a_cert_algorithm() {
        for typ in &[
            KEY_ALGO_RSA,
            KEY_ALGO_DSA,
            KEY_ALGO_ECDSA256,
            KEY_ALGO_ECDSA384,
            KEY_ALGO_ECDSA521,
            KEY_ALGO_ED25519,
            KEY_ALGO_SK_ECDSA256,
            KEY_ALGO_SK_ED25519,
        ] {
            let cert = cert_algorithm(typ).expect("missing cert algorithm");
            assert_eq!(certified_key_type(cert), Some(*typ));
        }
    }

    #[test]
    fn rsa_sha2_cert_algorithms_are_not_wire_formats() {
        assert_eq!(cert_algorithm(KEY_ALGO_RSA_SHA512), Some(CERT_ALGO_RSA_SHA512));
        assert_eq!(certified_key_type(CERT_ALGO_RSA_SHA512), None);
    }

    #[test]
    fn unknown_algorithm_has_no_cert_algorithm() {
        assert_eq!(cert_algorithm("ssh-unknown"), None);
        assert_eq!(cert_algorithm(""), None);
    }
}
