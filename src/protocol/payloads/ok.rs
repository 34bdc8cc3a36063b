use bytes::BytesMut;

use crate::protocol::{lenenc, Decode, ServerStatus, ServerStatusFlags, OK_HEADER};
use crate::Error;

/// The OK payload the server answers most commands with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPayload {
    /// Rows changed by the statement.
    pub affected_rows: u64,
    /// The auto-increment value generated by the statement, if any.
    pub last_insert_id: u64,
    /// Session status bits, notably [`ServerStatus::MoreResultsExist`].
    pub server_status: ServerStatusFlags,
    /// Number of warnings the statement produced.
    pub warning_count: u16,
    /// Human-readable info, often empty.
    pub info: String,
}

impl Decode for OkPayload {
    fn decode(src: &mut BytesMut) -> crate::Result<Self> {
        let header = lenenc::read_u8(src)?;
        if header != OK_HEADER {
            return Err(Error::Protocol(
                format!("expected an OK payload, got header byte 0x{:02x}", header).into(),
            ));
        }

        let affected_rows = lenenc::read_u64(src)?;
        let last_insert_id = lenenc::read_u64(src)?;
        let server_status = ServerStatusFlags::from_bits_truncate(lenenc::read_u16_le(src)?);
        let warning_count = lenenc::read_u16_le(src)?;
        let info = String::from_utf8_lossy(src).into_owned();

        Ok(Self {
            affected_rows,
            last_insert_id,
            server_status,
            warning_count,
            info,
        })
    }
}

impl OkPayload {
    /// True when another result set follows the current one.
    pub fn has_more_results(&self) -> bool {
        self.server_status.contains(ServerStatus::MoreResultsExist)
    }
}
