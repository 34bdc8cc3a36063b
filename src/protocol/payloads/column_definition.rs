use bytes::BytesMut;

use crate::protocol::{lenenc, ColumnFlag, ColumnFlags, Decode};
use crate::Error;

/// The character-set id the server uses for binary (non-text) columns.
pub(crate) const BINARY_CHARACTER_SET: u16 = 63;

uint_enum! {
    /// Column type tags of the text protocol.
    #[repr(u8)]
    pub enum ColumnType {
        Decimal = 0x00,
        Tiny = 0x01,
        Short = 0x02,
        Long = 0x03,
        Float = 0x04,
        Double = 0x05,
        Null = 0x06,
        Timestamp = 0x07,
        Longlong = 0x08,
        Int24 = 0x09,
        Date = 0x0A,
        Time = 0x0B,
        Datetime = 0x0C,
        Year = 0x0D,
        Newdate = 0x0E,
        Varchar = 0x0F,
        Bit = 0x10,
        Json = 0xF5,
        NewDecimal = 0xF6,
        Enum = 0xF7,
        Set = 0xF8,
        TinyBlob = 0xF9,
        MediumBlob = 0xFA,
        LongBlob = 0xFB,
        Blob = 0xFC,
        VarString = 0xFD,
        String = 0xFE,
        Geometry = 0xFF,
    }
}

/// The metadata the server sends for each column of a result set. Immutable
/// for the duration of the result set.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub character_set: u16,
    /// Maximum column length in bytes.
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    /// Digits after the decimal point, for decimal and temporal columns.
    pub decimals: u8,
}

impl Decode for ColumnDefinition {
    fn decode(src: &mut BytesMut) -> crate::Result<Self> {
        let catalog = lenenc::read_string(src)?;
        let schema = lenenc::read_string(src)?;
        let table = lenenc::read_string(src)?;
        let org_table = lenenc::read_string(src)?;
        let name = lenenc::read_string(src)?;
        let org_name = lenenc::read_string(src)?;

        // Length of the fixed fields, always 0x0C.
        let _fixed_length = lenenc::read_u64(src)?;

        let character_set = lenenc::read_u16_le(src)?;
        let column_length = lenenc::read_u32_le(src)?;

        let type_tag = lenenc::read_u8(src)?;
        let column_type = ColumnType::try_from(type_tag).map_err(|_| {
            Error::Unsupported(format!("unknown column type 0x{:02x}", type_tag).into())
        })?;

        let flags = ColumnFlags::from_bits_truncate(lenenc::read_u16_le(src)?);
        let decimals = lenenc::read_u8(src)?;

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            character_set,
            column_length,
            column_type,
            flags,
            decimals,
        })
    }
}

impl ColumnDefinition {
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlag::Unsigned)
    }

    /// True for columns using the binary character set, i.e. raw bytes.
    pub fn is_binary(&self) -> bool {
        self.character_set == BINARY_CHARACTER_SET
    }

    /// The column length in characters rather than bytes.
    pub(crate) fn char_length(&self) -> u32 {
        self.column_length / max_bytes_per_char(self.character_set)
    }
}

/// Widest encoding of one character in the given character set. Only the
/// families the server actually sends for text columns matter here.
fn max_bytes_per_char(character_set: u16) -> u32 {
    match character_set {
        // utf8mb4 collations
        45 | 46 | 224..=247 | 255..=323 => 4,
        // utf8mb3 collations
        33 | 83 | 192..=223 => 3,
        // latin1, ascii, binary and the other single-byte sets
        _ => 1,
    }
}
