//! Error module
pub use crate::protocol::payloads::ServerError;
pub use std::io::ErrorKind as IoErrorKind;
use std::{borrow::Cow, io};
use thiserror::Error;

/// A unified error enum that contains several errors that might occurr during
/// the lifecycle of this driver
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("An error occured during the attempt of performing I/O: {}", message)]
    /// An error occured when performing I/O to the server.
    Io {
        /// A list specifying general categories of I/O error.
        kind: IoErrorKind,
        /// The error description.
        message: String,
    },
    #[error("Protocol error: {}", _0)]
    /// Malformed framing, a bad sequence number, or an unexpected payload.
    Protocol(Cow<'static, str>),
    #[error("Authentication failed: {}", _0)]
    /// The server refused the credentials or requires an unsupported plugin.
    Authentication(Cow<'static, str>),
    #[error("Unsupported: {}", _0)]
    /// A protocol feature this client does not implement.
    Unsupported(Cow<'static, str>),
    #[error("Invalid session state: {}", _0)]
    /// An operation was issued on a session that cannot accept it.
    InvalidState(Cow<'static, str>),
    #[error("The session has been disposed")]
    /// An operation was issued after `dispose`.
    ObjectDisposed,
    #[error("Timed out connecting to {}", _0)]
    /// The connect deadline elapsed before a TCP connection was established.
    ConnectTimeout(String),
    #[error("Conversion error: {}", _0)]
    /// Conversion failure from one type to another.
    Conversion(Cow<'static, str>),
    #[error("UTF-8 error")]
    /// Tried to convert data to UTF-8 that was not valid.
    Utf8,
    #[error("Error parsing an integer: {}", _0)]
    /// Tried to parse an integer that was not an integer.
    ParseInt(std::num::ParseIntError),
    #[error("Server error: {}", _0)]
    /// A typed error returned by the server in an ERR payload.
    Server(ServerError),
    #[error("Error forming TLS connection: {}", _0)]
    /// An error in the TLS handshake.
    Tls(String),
}

impl Error {
    /// Returns the vendor error code, if the error originates from the server.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Server(e) => Some(e.code),
            _ => None,
        }
    }

    /// True, if the error is a server-side error. Only this kind of error
    /// leaves the session in a working state.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Self::Io {
            kind: err.kind(),
            message: format!("{}", err),
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Error {
        Error::ParseInt(err)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Error {
        Error::Utf8
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_err: std::string::FromUtf8Error) -> Error {
        Error::Utf8
    }
}

impl From<uuid::Error> for Error {
    fn from(e: uuid::Error) -> Self {
        Self::Conversion(format!("Error converting a GUID value {}", e).into())
    }
}

impl From<tokio_rustls::rustls::Error> for Error {
    fn from(e: tokio_rustls::rustls::Error) -> Self {
        Self::Tls(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_io() {
        let err = Error::Io {
            kind: IoErrorKind::ConnectionRefused,
            message: "refused".into(),
        };
        assert!(format!("{}", err).contains("refused"));
    }

    #[test]
    fn error_display_protocol() {
        let err = Error::Protocol("bad framing".into());
        assert!(format!("{}", err).contains("bad framing"));
    }

    #[test]
    fn error_display_authentication() {
        let err = Error::Authentication("access denied".into());
        assert!(format!("{}", err).contains("access denied"));
    }

    #[test]
    fn error_display_invalid_state() {
        let err = Error::InvalidState("session has failed".into());
        assert!(format!("{}", err).contains("session has failed"));
    }

    #[test]
    fn error_from_io() {
        let e: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(e, Error::Io { .. }));
    }

    #[test]
    fn error_from_parse_int() {
        let e: Error = "abc".parse::<i32>().unwrap_err().into();
        assert!(matches!(e, Error::ParseInt(_)));
    }

    #[test]
    fn error_from_utf8_error() {
        let e: Error = std::str::from_utf8(b"\xff").unwrap_err().into();
        assert!(matches!(e, Error::Utf8));
    }

    #[test]
    fn error_from_string_utf8() {
        let e: Error = String::from_utf8(vec![0xff]).unwrap_err().into();
        assert!(matches!(e, Error::Utf8));
    }

    #[test]
    fn error_code_none_for_non_server() {
        assert_eq!(None, Error::Utf8.code());
        assert!(!Error::Utf8.is_server_error());
    }

    #[test]
    fn error_code_for_server_error() {
        let err = Error::Server(ServerError {
            code: 1045,
            sql_state: "28000".into(),
            message: "Access denied".into(),
        });
        assert_eq!(Some(1045), err.code());
        assert!(err.is_server_error());
    }

    #[test]
    fn error_clone_and_eq() {
        let e1 = Error::Utf8;
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }
}
