use crate::{cert::CertError, matcher::KnownKey};
use std::{error, fmt, io};

#[derive(Debug)]
pub struct Error(ErrorImpl);

#[derive(Debug)]
enum ErrorImpl {
    Io {
        location: Option<(String, Option<usize>)>,
        source: io::Error,
    },
    Parse {
        filename: String,
        line: usize,
        msg: String,
    },
    Format(String),
    KeyMismatch(Vec<KnownKey>),
    Revoked(KnownKey),
    Certificate(CertError),
    HostKeyChanged {
        hostname: String,
        want: Vec<KnownKey>,
    },
    Random,
    Contract(Box<Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorImpl::Io {
                location: None,
                source,
            } => write!(f, "knownhosts: {}", source),
            ErrorImpl::Io {
                location: Some((filename, None)),
                source,
            } => write!(f, "knownhosts: {}: {}", filename, source),
            ErrorImpl::Io {
                location: Some((filename, Some(line))),
                source,
            } => write!(f, "knownhosts: {}:{}: {}", filename, line, source),
            ErrorImpl::Parse {
                filename,
                line,
                msg,
            } => write!(f, "knownhosts: {}:{}: {}", filename, line, msg),
            ErrorImpl::Format(hostname) => {
                write!(f, "knownhosts: cannot record hostname {:?}", hostname)
            }
            ErrorImpl::KeyMismatch(want) if want.is_empty() => {
                f.write_str("knownhosts: key is unknown")
            }
            ErrorImpl::KeyMismatch(..) => f.write_str("knownhosts: key mismatch"),
            ErrorImpl::Revoked(revoked) => write!(
                f,
                "knownhosts: key is revoked ({}:{})",
                revoked.filename, revoked.line
            ),
            ErrorImpl::Certificate(err) => write!(f, "knownhosts: {}", err),
            ErrorImpl::HostKeyChanged { hostname, .. } => write!(
                f,
                "REMOTE HOST IDENTIFICATION HAS CHANGED for host {}! This may indicate a MitM attack.",
                hostname
            ),
            ErrorImpl::Random => f.write_str("knownhosts: failed to generate random salt"),
            ErrorImpl::Contract(inner) => {
                write!(f, "knownhosts: unexpected host key callback result: {}", inner)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.0 {
            ErrorImpl::Io { source, .. } => Some(source),
            ErrorImpl::Certificate(err) => Some(err),
            ErrorImpl::Contract(inner) => Some(&**inner),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::io(err)
    }
}

impl Error {
    /// Creates the error a host key callback returns when the presented key does not
    /// match. An empty `want` means the host has no known keys at all.
    pub fn key_mismatch(want: Vec<KnownKey>) -> Self {
        Self(ErrorImpl::KeyMismatch(want))
    }

    /// Creates the hard failure for a host whose recorded key differs from the
    /// presented one.
    pub fn host_key_changed(hostname: impl Into<String>, want: Vec<KnownKey>) -> Self {
        Self(ErrorImpl::HostKeyChanged {
            hostname: hostname.into(),
            want,
        })
    }

    pub(crate) fn io(source: io::Error) -> Self {
        Self(ErrorImpl::Io {
            location: None,
            source,
        })
    }

    pub(crate) fn io_at(filename: &str, line: Option<usize>, source: io::Error) -> Self {
        Self(ErrorImpl::Io {
            location: Some((filename.to_owned(), line)),
            source,
        })
    }

    pub(crate) fn parse(filename: &str, line: usize, msg: impl Into<String>) -> Self {
        Self(ErrorImpl::Parse {
            filename: filename.to_owned(),
            line,
            msg: msg.into(),
        })
    }

    pub(crate) fn format(hostname: impl Into<String>) -> Self {
        Self(ErrorImpl::Format(hostname.into()))
    }

    pub(crate) fn revoked(revoked: KnownKey) -> Self {
        Self(ErrorImpl::Revoked(revoked))
    }

    pub(crate) fn certificate(err: CertError) -> Self {
        Self(ErrorImpl::Certificate(err))
    }

    pub(crate) fn random() -> Self {
        Self(ErrorImpl::Random)
    }

    pub(crate) fn contract(inner: Error) -> Self {
        Self(ErrorImpl::Contract(Box::new(inner)))
    }

    /// Returns `true` if the error says that the host is known under a different key.
    pub fn is_host_key_changed(&self) -> bool {
        match &self.0 {
            ErrorImpl::KeyMismatch(want) => !want.is_empty(),
            ErrorImpl::HostKeyChanged { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the error says that the host has no known keys.
    pub fn is_host_unknown(&self) -> bool {
        matches!(&self.0, ErrorImpl::KeyMismatch(want) if want.is_empty())
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self.0, ErrorImpl::Revoked(..))
    }

    pub fn is_certificate(&self) -> bool {
        matches!(self.0, ErrorImpl::Certificate(..))
    }

    pub fn is_io(&self) -> bool {
        matches!(self.0, ErrorImpl::Io { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self.0, ErrorImpl::Parse { .. })
    }

    pub fn is_format(&self) -> bool {
        matches!(self.0, ErrorImpl::Format(..))
    }

    /// Returns `true` for results a host key callback is not expected to produce.
    pub fn is_contract(&self) -> bool {
        matches!(self.0, ErrorImpl::Contract(..))
    }

    /// The keys known for the host, if the error is a key mismatch.
    pub fn wanted_keys(&self) -> Option<&[KnownKey]> {
        match &self.0 {
            ErrorImpl::KeyMismatch(want) | ErrorImpl::HostKeyChanged { want, .. } => {
                Some(want.as_slice())
            }
            _ => None,
        }
    }

    pub(crate) fn into_wanted_keys(self) -> Result<Vec<KnownKey>, Self> {
        match self.0 {
            ErrorImpl::KeyMismatch(want) => Ok(want),
            other => Err(Self(other)),
        }
    }
}
