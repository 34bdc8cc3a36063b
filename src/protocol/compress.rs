//! The compressed protocol.
//!
//! When `CLIENT_COMPRESS` is negotiated, every plain packet travels inside an
//! envelope: a 7-byte header (u24 LE compressed length, u8 envelope sequence,
//! u24 LE uncompressed length) followed by the zlib-deflated packet bytes. An
//! uncompressed length of zero marks a payload stored as-is, which is used
//! whenever deflating would not actually shrink the bytes.
//!
//! Envelope sequence numbers form their own conversation, independent of the
//! packet sequence numbers travelling inside.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use bytes::BytesMut;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use futures_util::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{COMPRESSED_HEADER_BYTES, MAX_PACKET_PAYLOAD, MIN_COMPRESS_LENGTH};
use crate::connection::tls::MaybeTlsStream;
use crate::Error;

#[derive(Debug)]
pub(crate) struct CompressionContext {
    next_sequence: u8,
    /// Inner packet bytes already inflated but not yet consumed.
    buf: BytesMut,
}

impl CompressionContext {
    pub(crate) fn new() -> Self {
        Self {
            next_sequence: 0,
            buf: BytesMut::new(),
        }
    }

    /// Aligns the envelope counter with a fresh conversation.
    pub(crate) fn reset_sequence(&mut self) {
        self.next_sequence = 0;
    }

    fn take_sequence(&mut self) -> u8 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    /// Makes at least `needed` inner bytes available, reading further
    /// envelopes from the stream as required.
    pub(crate) async fn fill<S>(
        &mut self,
        stream: &mut MaybeTlsStream<S>,
        needed: usize,
    ) -> crate::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        while self.buf.len() < needed {
            self.read_envelope(stream).await?;
        }
        Ok(())
    }

    /// Hands out `length` inner bytes. Callers must `fill` first.
    pub(crate) fn take(&mut self, length: usize) -> BytesMut {
        self.buf.split_to(length)
    }

    async fn read_envelope<S>(&mut self, stream: &mut MaybeTlsStream<S>) -> crate::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut header = [0u8; COMPRESSED_HEADER_BYTES];
        stream.read_exact(&mut header).await?;

        let compressed_length = LittleEndian::read_u24(&header[..3]) as usize;
        let sequence = header[3];
        let uncompressed_length = LittleEndian::read_u24(&header[4..7]) as usize;

        let expected = self.take_sequence();
        if sequence != expected {
            self.next_sequence = sequence.wrapping_add(1);
            return Err(Error::Protocol(
                format!(
                    "compressed envelope out of order: expected sequence {}, got {}",
                    expected, sequence
                )
                .into(),
            ));
        }

        let mut body = vec![0u8; compressed_length];
        stream.read_exact(&mut body).await?;

        if uncompressed_length == 0 {
            self.buf.extend_from_slice(&body);
        } else {
            let mut inflated = Vec::with_capacity(uncompressed_length);
            let mut decoder = ZlibDecoder::new(body.as_slice());
            decoder.read_to_end(&mut inflated).map_err(|e| {
                Error::Protocol(format!("corrupt compressed envelope: {}", e).into())
            })?;

            if inflated.len() != uncompressed_length {
                return Err(Error::Protocol(
                    "compressed envelope length does not match its header".into(),
                ));
            }

            self.buf.extend_from_slice(&inflated);
        }

        Ok(())
    }

    /// Wraps raw packet bytes into one or more envelopes and writes them out.
    pub(crate) async fn write<S>(
        &mut self,
        stream: &mut MaybeTlsStream<S>,
        packet: &[u8],
    ) -> crate::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        for chunk in packet.chunks(MAX_PACKET_PAYLOAD) {
            let sequence = self.take_sequence();

            let deflated = if chunk.len() >= MIN_COMPRESS_LENGTH {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(chunk)?;
                let out = encoder.finish()?;
                // Stored beats deflated unless deflate actually wins.
                (out.len() < chunk.len()).then_some(out)
            } else {
                None
            };

            let mut header = [0u8; COMPRESSED_HEADER_BYTES];
            header[3] = sequence;

            match &deflated {
                Some(out) => {
                    LittleEndian::write_u24(&mut header[..3], out.len() as u32);
                    LittleEndian::write_u24(&mut header[4..7], chunk.len() as u32);
                    stream.write_all(&header).await?;
                    stream.write_all(out).await?;
                }
                None => {
                    LittleEndian::write_u24(&mut header[..3], chunk.len() as u32);
                    stream.write_all(&header).await?;
                    stream.write_all(chunk).await?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::compat::TokioAsyncReadCompatExt;

    #[tokio::test]
    async fn small_payloads_are_stored_raw() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut writer = MaybeTlsStream::Raw(client.compat());
        let mut reader = server.compat();

        let mut ctx = CompressionContext::new();
        ctx.write(&mut writer, b"tiny").await.unwrap();

        let mut header = [0u8; COMPRESSED_HEADER_BYTES];
        reader.read_exact(&mut header).await.unwrap();
        assert_eq!(4, LittleEndian::read_u24(&header[..3]));
        assert_eq!(0, header[3]);
        // uncompressed length of zero means the payload was not deflated
        assert_eq!(0, LittleEndian::read_u24(&header[4..7]));

        let mut body = [0u8; 4];
        reader.read_exact(&mut body).await.unwrap();
        assert_eq!(b"tiny", &body);
    }

    #[tokio::test]
    async fn compressible_payloads_are_deflated() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut writer = MaybeTlsStream::Raw(client.compat());
        let mut reader = server.compat();

        let payload = vec![0u8; 512];
        let mut ctx = CompressionContext::new();
        ctx.write(&mut writer, &payload).await.unwrap();

        let mut header = [0u8; COMPRESSED_HEADER_BYTES];
        reader.read_exact(&mut header).await.unwrap();
        let compressed_length = LittleEndian::read_u24(&header[..3]) as usize;
        assert!(compressed_length < 512);
        assert_eq!(512, LittleEndian::read_u24(&header[4..7]));
    }

    #[tokio::test]
    async fn write_then_fill_roundtrip() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut writer = MaybeTlsStream::Raw(client.compat());
        let mut reader = MaybeTlsStream::Raw(server.compat());

        let payload: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        let mut write_ctx = CompressionContext::new();
        write_ctx.write(&mut writer, &payload).await.unwrap();

        let mut read_ctx = CompressionContext::new();
        read_ctx.fill(&mut reader, payload.len()).await.unwrap();
        assert_eq!(&payload[..], &read_ctx.take(payload.len())[..]);
    }

    #[tokio::test]
    async fn envelope_sequence_mismatch_is_a_protocol_error() {
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut writer = MaybeTlsStream::Raw(client.compat());
        let mut reader = MaybeTlsStream::Raw(server.compat());

        let mut write_ctx = CompressionContext::new();
        write_ctx.take_sequence(); // skew the writer's counter
        write_ctx.write(&mut writer, b"x").await.unwrap();

        let mut read_ctx = CompressionContext::new();
        let err = read_ctx.fill(&mut reader, 1).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
