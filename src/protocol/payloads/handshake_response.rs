use bytes::{BufMut, BytesMut};

use crate::protocol::{Capability, CapabilityFlags, Encode};
use crate::Error;

/// The collation the session asks for: `utf8mb4_general_ci`.
pub(crate) const DEFAULT_CHARACTER_SET: u8 = 45;

/// The largest logical payload the client announces it accepts.
const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// The abbreviated handshake response asking the server to switch the stream
/// to TLS. Byte-for-byte the first 32 bytes of [`HandshakeResponse41`], sent
/// in plaintext before the TLS handshake begins.
#[derive(Debug)]
pub(crate) struct SslRequest {
    pub capabilities: CapabilityFlags,
}

impl Encode for SslRequest {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u32_le(self.capabilities.bits());
        dst.put_u32_le(MAX_PACKET_SIZE);
        dst.put_u8(DEFAULT_CHARACTER_SET);
        dst.put_bytes(0, 23);
        Ok(())
    }
}

/// The protocol-4.1 handshake response carrying credentials.
#[derive(Debug)]
pub(crate) struct HandshakeResponse41<'a> {
    pub capabilities: CapabilityFlags,
    pub user: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin: Option<&'a str>,
}

impl Encode for HandshakeResponse41<'_> {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.put_u32_le(self.capabilities.bits());
        dst.put_u32_le(MAX_PACKET_SIZE);
        dst.put_u8(DEFAULT_CHARACTER_SET);
        dst.put_bytes(0, 23);

        dst.put_slice(self.user.as_bytes());
        dst.put_u8(0);

        // CLIENT_SECURE_CONNECTION: one length byte, then the scramble.
        if self.auth_response.len() > u8::MAX as usize {
            return Err(Error::Protocol("auth response too long".into()));
        }
        dst.put_u8(self.auth_response.len() as u8);
        dst.put_slice(self.auth_response);

        if let Some(database) = self.database {
            debug_assert!(self.capabilities.contains(Capability::ConnectWithDb));
            dst.put_slice(database.as_bytes());
            dst.put_u8(0);
        }

        if let Some(plugin) = self.auth_plugin {
            dst.put_slice(plugin.as_bytes());
            dst.put_u8(0);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> CapabilityFlags {
        Capability::Protocol41
            | Capability::SecureConnection
            | Capability::LongPassword
            | Capability::MultiResults
    }

    #[test]
    fn ssl_request_is_exactly_32_bytes() {
        let mut buf = BytesMut::new();
        let request = SslRequest {
            capabilities: caps() | Capability::Ssl,
        };
        request.encode(&mut buf).unwrap();
        assert_eq!(32, buf.len());
        assert_eq!((caps() | Capability::Ssl).bits().to_le_bytes(), buf[..4]);
    }

    #[test]
    fn response_prefix_matches_ssl_request() {
        let mut request = BytesMut::new();
        SslRequest {
            capabilities: caps(),
        }
        .encode(&mut request)
        .unwrap();

        let mut response = BytesMut::new();
        HandshakeResponse41 {
            capabilities: caps(),
            user: "app",
            auth_response: &[0xAB; 20],
            database: None,
            auth_plugin: None,
        }
        .encode(&mut response)
        .unwrap();

        assert_eq!(&request[..], &response[..32]);
    }

    #[test]
    fn response_layout() {
        let mut buf = BytesMut::new();
        HandshakeResponse41 {
            capabilities: caps() | Capability::ConnectWithDb | Capability::PluginAuth,
            user: "app",
            auth_response: &[0xAB; 20],
            database: Some("inventory"),
            auth_plugin: Some("mysql_native_password"),
        }
        .encode(&mut buf)
        .unwrap();

        // user follows the 32-byte prefix, NUL-terminated
        assert_eq!(b"app\0", &buf[32..36]);
        // then the length-prefixed scramble
        assert_eq!(20, buf[36]);
        assert_eq!(&[0xABu8; 20][..], &buf[37..57]);
        // then database and plugin, each NUL-terminated
        assert_eq!(b"inventory\0", &buf[57..67]);
        assert_eq!(b"mysql_native_password\0", &buf[67..]);
    }

    #[test]
    fn empty_password_sends_zero_length_scramble() {
        let mut buf = BytesMut::new();
        HandshakeResponse41 {
            capabilities: caps(),
            user: "app",
            auth_response: &[],
            database: None,
            auth_plugin: None,
        }
        .encode(&mut buf)
        .unwrap();
        assert_eq!(0, buf[36]);
        assert_eq!(37, buf.len());
    }
}
