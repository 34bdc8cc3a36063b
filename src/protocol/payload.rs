use bytes::BytesMut;

/// The header byte of an OK payload.
pub(crate) const OK_HEADER: u8 = 0x00;
/// The header byte of a LOCAL INFILE request.
pub(crate) const LOCAL_INFILE_HEADER: u8 = 0xFB;
/// The header byte an EOF payload (and an auth-switch request) starts with.
pub(crate) const EOF_HEADER: u8 = 0xFE;
/// The header byte of an ERR payload.
pub(crate) const ERR_HEADER: u8 = 0xFF;

/// Encoding of an application-level message into a payload buffer.
pub trait Encode {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()>;
}

/// Decoding of a payload buffer into a typed message. The buffer is consumed.
pub trait Decode: Sized {
    fn decode(src: &mut BytesMut) -> crate::Result<Self>;
}

impl Encode for &[u8] {
    fn encode(&self, dst: &mut BytesMut) -> crate::Result<()> {
        dst.extend_from_slice(self);
        Ok(())
    }
}

/// A logical application message: the reassembled bytes of one packet
/// exchange, plus the header byte the response dispatch keys on.
#[derive(Debug)]
pub struct Payload {
    buf: BytesMut,
}

impl Payload {
    pub(crate) fn new(buf: BytesMut) -> Self {
        Self { buf }
    }

    /// The first byte, used for dispatch. `None` for an empty payload.
    pub fn header_byte(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// True for an OK payload.
    pub fn is_ok(&self) -> bool {
        self.header_byte() == Some(OK_HEADER)
    }

    /// True for an ERR payload.
    pub fn is_err(&self) -> bool {
        self.header_byte() == Some(ERR_HEADER)
    }

    /// True for an EOF payload. 0xFE only means EOF when the payload is
    /// shorter than nine bytes; longer 0xFE payloads are rows or auth-switch
    /// requests.
    pub fn is_eof(&self) -> bool {
        self.header_byte() == Some(EOF_HEADER) && self.len() < 9
    }

    /// True for the marker of a LOCAL INFILE request.
    pub fn is_local_infile(&self) -> bool {
        self.header_byte() == Some(LOCAL_INFILE_HEADER)
    }

    pub(crate) fn into_inner(self) -> BytesMut {
        self.buf
    }
}
