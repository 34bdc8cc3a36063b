use bytes::BytesMut;

use crate::protocol::{lenenc, Decode, ServerStatus, ServerStatusFlags, EOF_HEADER};
use crate::Error;

/// The EOF payload closing the column-definition block and each row block.
///
/// Only a 0xFE payload shorter than nine bytes is an EOF; the result-set
/// reader checks that before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EofPayload {
    pub warning_count: u16,
    pub server_status: ServerStatusFlags,
}

impl Decode for EofPayload {
    fn decode(src: &mut BytesMut) -> crate::Result<Self> {
        let header = lenenc::read_u8(src)?;
        if header != EOF_HEADER {
            return Err(Error::Protocol(
                format!("expected an EOF payload, got header byte 0x{:02x}", header).into(),
            ));
        }

        let warning_count = lenenc::read_u16_le(src)?;
        let server_status = ServerStatusFlags::from_bits_truncate(lenenc::read_u16_le(src)?);

        Ok(Self {
            warning_count,
            server_status,
        })
    }
}

impl EofPayload {
    /// True when another result set follows the current one.
    pub fn has_more_results(&self) -> bool {
        self.server_status.contains(ServerStatus::MoreResultsExist)
    }
}
