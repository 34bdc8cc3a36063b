use std::fmt;

use bytes::BytesMut;

use crate::protocol::{lenenc, Decode, ERR_HEADER};
use crate::Error;

/// A typed error returned by the server in an ERR payload.
///
/// A server error ends the current exchange but leaves the session usable;
/// it is the only error kind that does not fail the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Vendor error code, e.g. `1045` for access denied.
    pub code: u16,
    /// Five-character SQLSTATE, empty when the server sent none.
    pub sql_state: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sql_state.is_empty() {
            write!(f, "ERROR {}: {}", self.code, self.message)
        } else {
            write!(f, "ERROR {} ({}): {}", self.code, self.sql_state, self.message)
        }
    }
}

impl std::error::Error for ServerError {}

impl Decode for ServerError {
    fn decode(src: &mut BytesMut) -> crate::Result<Self> {
        let header = lenenc::read_u8(src)?;
        if header != ERR_HEADER {
            return Err(Error::Protocol(
                format!("expected an ERR payload, got header byte 0x{:02x}", header).into(),
            ));
        }

        let code = lenenc::read_u16_le(src)?;

        // Protocol 4.1 marks the SQLSTATE with a '#'.
        let sql_state = if src.first() == Some(&b'#') {
            let _ = lenenc::read_u8(src)?;
            let bytes = lenenc::take(src, 5)?;
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            String::new()
        };

        let message = String::from_utf8_lossy(src).into_owned();

        Ok(Self {
            code,
            sql_state,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_with_sql_state() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xFF, 0x15, 0x04]); // 1045
        buf.extend_from_slice(b"#28000");
        buf.extend_from_slice(b"Access denied for user 'app'");

        let err = ServerError::decode(&mut buf).unwrap();
        assert_eq!(1045, err.code);
        assert_eq!("28000", err.sql_state);
        assert_eq!("Access denied for user 'app'", err.message);
    }

    #[test]
    fn decode_without_sql_state() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xFF, 0xD0, 0x07]); // 2000
        buf.extend_from_slice(b"Unknown error");

        let err = ServerError::decode(&mut buf).unwrap();
        assert_eq!(2000, err.code);
        assert!(err.sql_state.is_empty());
        assert_eq!("Unknown error", err.message);
    }

    #[test]
    fn display_includes_code_and_state() {
        let err = ServerError {
            code: 1060,
            sql_state: "42000".into(),
            message: "You have an error".into(),
        };
        let rendered = format!("{}", err);
        assert!(rendered.contains("1060"));
        assert!(rendered.contains("42000"));
        assert!(rendered.contains("You have an error"));
    }

    #[test]
    fn decode_rejects_other_headers() {
        let mut buf = BytesMut::from(&[0x00u8][..]);
        assert!(ServerError::decode(&mut buf).is_err());
    }
}
