use bytes::BytesMut;

use crate::protocol::{lenenc, Decode, EOF_HEADER};
use crate::Error;

/// The server's request to redo authentication with another plugin and a
/// fresh challenge. Arrives instead of OK during the handshake or after
/// `COM_CHANGE_USER`.
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest {
    pub plugin_name: String,
    pub auth_data: Vec<u8>,
}

impl Decode for AuthSwitchRequest {
    fn decode(src: &mut BytesMut) -> crate::Result<Self> {
        let header = lenenc::read_u8(src)?;
        if header != EOF_HEADER {
            return Err(Error::Protocol(
                format!(
                    "expected an auth switch request, got header byte 0x{:02x}",
                    header
                )
                .into(),
            ));
        }

        let plugin_name = lenenc::read_null_terminated_string(src)?;

        // The challenge usually carries a trailing NUL that is not part of it.
        let mut auth_data = src.split().to_vec();
        if auth_data.last() == Some(&0) {
            auth_data.pop();
        }

        Ok(Self {
            plugin_name,
            auth_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_switch_request() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xFE]);
        buf.extend_from_slice(b"mysql_native_password\0");
        buf.extend_from_slice(&[9u8; 20]);
        buf.extend_from_slice(&[0]);

        let switch = AuthSwitchRequest::decode(&mut buf).unwrap();
        assert_eq!("mysql_native_password", switch.plugin_name);
        assert_eq!(vec![9u8; 20], switch.auth_data);
    }

    #[test]
    fn decode_rejects_other_headers() {
        let mut buf = BytesMut::from(&[0x00u8][..]);
        assert!(AuthSwitchRequest::decode(&mut buf).is_err());
    }
}
