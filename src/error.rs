//! Crate-wide error taxonomy (spec §7).
//!
//! Every remote operation resolves with either success or a single
//! `{kind, message, underlying_code?}` triple; internally, chained errors are
//! preserved via `#[source]` for the log trail but the user-visible surface
//! is `Error::kind()` / `Error::underlying_code()` / `Display`.

use std::fmt;

/// The taxonomy from spec §7. Kept separate from [`Error`] itself so the
/// user-visible `{kind, message, underlying_code?}` triple can be built
/// without matching on the full error (which also carries `#[source]`
/// chains not meant to leave the process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Timeout,
    ParseError,
    CmeError,
    CmsError,
    NotSupported,
    Connected,
    WrongState,
    Unauthorized,
    Cancelled,
    Retry,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Io => "io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ParseError => "parse-error",
            ErrorKind::CmeError => "cme-error",
            ErrorKind::CmsError => "cms-error",
            ErrorKind::NotSupported => "not-supported",
            ErrorKind::Connected => "connected",
            ErrorKind::WrongState => "wrong-state",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Retry => "retry",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("command timed out")]
    Timeout,

    #[error("could not parse response: {0}")]
    ParseError(String),

    #[error("+CME ERROR: {0}")]
    CmeError(u16),

    #[error("+CMS ERROR: {0}")]
    CmsError(u16),

    #[error("command not supported by this modem")]
    NotSupported,

    #[error("port is in a data call")]
    Connected,

    #[error("operation not valid in current state")]
    WrongState,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("transient failure, retry")]
    Retry,

    #[error("port closed")]
    PortClosed,

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The taxonomy bucket this error belongs to, per spec §7.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Serial(_) | Error::PortClosed => ErrorKind::Io,
            Error::Timeout => ErrorKind::Timeout,
            Error::ParseError(_) => ErrorKind::ParseError,
            Error::CmeError(_) => ErrorKind::CmeError,
            Error::CmsError(_) => ErrorKind::CmsError,
            Error::NotSupported => ErrorKind::NotSupported,
            Error::Connected => ErrorKind::Connected,
            Error::WrongState => ErrorKind::WrongState,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Retry => ErrorKind::Retry,
            Error::DBus(_) => ErrorKind::Io,
            Error::Other(_) => ErrorKind::ParseError,
        }
    }

    /// The modem-reported numeric code, for `CmeError`/`CmsError` only.
    pub fn underlying_code(&self) -> Option<u16> {
        match self {
            Error::CmeError(c) | Error::CmsError(c) => Some(*c),
            _ => None,
        }
    }

    /// Whether this is a `+CME ERROR` code meaning "the modem doesn't
    /// implement this command" rather than a genuine failure (3GPP TS
    /// 27.007 Annex G: 4 = "operation not supported"; 100 = "unknown",
    /// which firmware commonly returns for the same reason). A sequence
    /// treats these the same as a bare [`Error::NotSupported`] (spec §4.2's
    /// CME-unsupported carve-out).
    pub fn is_cme_unsupported(&self) -> bool {
        matches!(self, Error::CmeError(4) | Error::CmeError(100))
    }

    /// The `{kind, message, underlying_code?}` triple exposed across the
    /// remote-object interface (§6).
    pub fn to_user_visible(&self) -> UserVisibleError {
        UserVisibleError {
            kind: self.kind(),
            message: self.to_string(),
            underlying_code: self.underlying_code(),
        }
    }
}

/// The flattened, serializable shape of an [`Error`] suitable for crossing
/// the remote-object boundary (§7: "every remote operation resolves with
/// either success or a single `{kind, message, underlying_code?}` triple").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UserVisibleError {
    pub kind: ErrorKindSerde,
    pub message: String,
    pub underlying_code: Option<u16>,
}

/// `ErrorKind` is not itself `Serialize`/`Deserialize` (it exists to be
/// matched on internally); this mirrors it one-for-one for the boundary
/// type above.
pub type ErrorKindSerde = ErrorKind;

impl serde::Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ErrorKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "timeout" => ErrorKind::Timeout,
            "parse-error" => ErrorKind::ParseError,
            "cme-error" => ErrorKind::CmeError,
            "cms-error" => ErrorKind::CmsError,
            "not-supported" => ErrorKind::NotSupported,
            "connected" => ErrorKind::Connected,
            "wrong-state" => ErrorKind::WrongState,
            "unauthorized" => ErrorKind::Unauthorized,
            "cancelled" => ErrorKind::Cancelled,
            "retry" => ErrorKind::Retry,
            _ => ErrorKind::Io,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cme_error_carries_its_code() {
        let e = Error::CmeError(10);
        assert_eq!(e.kind(), ErrorKind::CmeError);
        assert_eq!(e.underlying_code(), Some(10));
    }

    #[test]
    fn non_modem_errors_have_no_underlying_code() {
        assert_eq!(Error::Timeout.underlying_code(), None);
    }

    #[test]
    fn cme_unsupported_codes_are_recognized() {
        assert!(Error::CmeError(4).is_cme_unsupported());
        assert!(Error::CmeError(100).is_cme_unsupported());
        assert!(!Error::CmeError(10).is_cme_unsupported());
        assert!(!Error::NotSupported.is_cme_unsupported());
    }
}
