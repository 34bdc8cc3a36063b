use bytes::{Buf, BytesMut};

use crate::protocol::{lenenc, Capability, CapabilityFlags, Decode, ServerStatusFlags};
use crate::Error;

/// The protocol version this client understands. Everything since MySQL 3.21
/// sends it.
const PROTOCOL_VERSION: u8 = 10;

/// The server's opening message: its identity, capabilities, and the 20-byte
/// auth challenge the password is hashed against.
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data: [u8; 20],
    pub capabilities: CapabilityFlags,
    pub character_set: u8,
    pub status: ServerStatusFlags,
    pub auth_plugin_name: String,
}

impl Decode for InitialHandshake {
    fn decode(src: &mut BytesMut) -> crate::Result<Self> {
        let protocol_version = lenenc::read_u8(src)?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(Error::Protocol(
                format!("unsupported protocol version {}", protocol_version).into(),
            ));
        }

        let server_version = lenenc::read_null_terminated_string(src)?;
        let connection_id = lenenc::read_u32_le(src)?;

        let mut auth_plugin_data = [0u8; 20];
        let part1 = lenenc::take(src, 8)?;
        auth_plugin_data[..8].copy_from_slice(&part1);
        let _filler = lenenc::read_u8(src)?;

        let capability_low = lenenc::read_u16_le(src)?;
        let character_set = lenenc::read_u8(src)?;
        let status = ServerStatusFlags::from_bits_truncate(lenenc::read_u16_le(src)?);
        let capability_high = lenenc::read_u16_le(src)?;

        let capabilities = CapabilityFlags::from_bits_truncate(
            u32::from(capability_low) | (u32::from(capability_high) << 16),
        );

        let auth_data_len = lenenc::read_u8(src)? as usize;
        let _reserved = lenenc::take(src, 10)?;

        if capabilities.contains(Capability::SecureConnection) {
            // Part two is at least 13 bytes; only the first 12 belong to the
            // challenge, the 13th is a NUL.
            let part2_len = usize::max(13, auth_data_len.saturating_sub(8));
            let part2 = lenenc::take(src, usize::min(part2_len, src.len()))?;
            if part2.len() < 12 {
                return Err(Error::Protocol("auth challenge is too short".into()));
            }
            auth_plugin_data[8..].copy_from_slice(&part2[..12]);
        }

        let auth_plugin_name = if capabilities.contains(Capability::PluginAuth) {
            // Some servers omit the trailing NUL on the plugin name.
            match src.iter().position(|byte| *byte == 0) {
                Some(index) => {
                    let name = src.split_to(index);
                    src.advance(1);
                    String::from_utf8(name.to_vec())?
                }
                None => String::from_utf8(src.split().to_vec())?,
            }
        } else {
            String::new()
        };

        Ok(Self {
            server_version,
            connection_id,
            auth_plugin_data,
            capabilities,
            character_set,
            status,
            auth_plugin_name,
        })
    }
}

/// A parsed `major.minor.patch` server version, with whatever suffix the
/// build carries stripped for comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    original: String,
}

impl ServerVersion {
    pub fn parse(version: &str) -> Self {
        let numeric: &str = version
            .split(|c: char| !c.is_ascii_digit() && c != '.')
            .next()
            .unwrap_or("");

        let mut parts = numeric.split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|part| part.parse::<u16>().ok())
                .unwrap_or(0)
        };

        let major = next();
        let minor = next();
        let patch = next();

        Self {
            major,
            minor,
            patch,
            original: version.to_string(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            original: String::new(),
        }
    }

    /// `COM_RESET_CONNECTION` exists since 5.7.3.
    pub fn supports_reset_connection(&self) -> bool {
        (self.major, self.minor, self.patch) >= (5, 7, 3)
    }

    /// The version string as the server sent it.
    pub fn as_str(&self) -> &str {
        &self.original
    }
}
