//! Errors

use std::io;

/// Result wrapper
pub type Result<T> = std::result::Result<T, Error>;

/// Crate errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("error parsing {what} at offset {at}: {message}")]
    Parse {
        what: &'static str,
        at: usize,
        message: String,
    },

    #[error("malformed control header near {0:?}")]
    MalformedHeader(String),

    #[error("field {field}: {message}")]
    TypeMismatch {
        field: &'static str,
        message: String,
    },

    #[error("document is not signed")]
    SignatureMissing,

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("failed to fetch keyring {location}: {message}")]
    KeyringFetch { location: String, message: String },

    #[error("failed to parse keyring {location}: {message}")]
    KeyringParse { location: String, message: String },

    #[error("no usable Packages index{}", fmt_attempts(.0))]
    PackagesUnavailable(Vec<(String, String)>),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("unable to locate package: {0}")]
    NotFound(String),

    #[error("unsatisfiable dependency: {0}")]
    UnsatisfiableDependency(String),

    #[error("virtual package with multiple installation candidates: {0}")]
    AmbiguousVirtual(String),

    #[error("requested package {0} is not selected")]
    RequestedPackageDropped(String),

    #[error("unsupported apiVersion: {0}")]
    UnsupportedApiVersion(String),

    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid recipe: {0}")]
    Recipe(#[from] serde_yaml::Error),
}

fn fmt_attempts(attempts: &[(String, String)]) -> String {
    let mut out = String::new();
    for (url, cause) in attempts {
        out.push_str("\n  ");
        out.push_str(url);
        out.push_str(": ");
        out.push_str(cause);
    }
    out
}

impl Error {
    pub(crate) fn parse<M: Into<String>>(what: &'static str, at: usize, message: M) -> Self {
        Error::Parse {
            what,
            at,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch<M: Into<String>>(field: &'static str, message: M) -> Self {
        Error::TypeMismatch {
            field,
            message: message.into(),
        }
    }
}
