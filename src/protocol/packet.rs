//! Packet framing over the session's byte stream.
//!
//! A plain packet is a 3-byte little-endian payload length, a 1-byte sequence
//! number, and up to 2²⁴−1 payload bytes. A logical payload of 2²⁴−1 bytes or
//! more spans several packets; a logical payload whose length is an exact
//! positive multiple of 2²⁴−1 is terminated by an empty packet.
//!
//! The codec owns no sequence state: numbers are taken from and verified
//! against the [`Conversation`] passed into each call.

use byteorder::{ByteOrder, LittleEndian};
use bytes::BytesMut;
use futures_util::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{event, Level};

use super::compress::CompressionContext;
use super::{Conversation, Payload, ProtocolErrorBehavior, MAX_PACKET_PAYLOAD, PACKET_HEADER_BYTES};
use crate::connection::tls::{connect_tls, MaybeTlsStream};
use crate::connection::Config;
use crate::Error;

/// The byte source and packet codec underneath a session: the (possibly
/// TLS-wrapped) stream plus the optional compression context.
#[derive(Debug)]
pub(crate) struct Transport<S> {
    stream: MaybeTlsStream<S>,
    compression: Option<CompressionContext>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Transport<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream: MaybeTlsStream::Raw(stream),
            compression: None,
        }
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    pub(crate) fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }

    /// Switches to the compressed protocol. Called once, after the handshake
    /// that negotiated `CLIENT_COMPRESS` completes.
    pub(crate) fn enable_compression(&mut self) {
        self.compression = Some(CompressionContext::new());
    }

    pub(crate) fn reset_compressed_sequence(&mut self) {
        if let Some(ctx) = &mut self.compression {
            ctx.reset_sequence();
        }
    }

    /// Swaps the raw stream for its TLS wrapping, in place. All plaintext
    /// bytes must have been flushed before this is called.
    pub(crate) async fn upgrade_to_tls(
        &mut self,
        config: &Config,
        hostname: &str,
    ) -> crate::Result<()> {
        let stream = std::mem::replace(&mut self.stream, MaybeTlsStream::Detached);
        let raw = match stream {
            MaybeTlsStream::Raw(raw) => raw,
            other => {
                self.stream = other;
                return Err(Error::Tls("the stream is already encrypted".to_string()));
            }
        };

        let tls = connect_tls(config, hostname, raw).await?;
        self.stream = MaybeTlsStream::Tls(Box::new(tls));
        Ok(())
    }

    /// Reads one logical payload, reassembling packet fragments.
    pub(crate) async fn read_packet(
        &mut self,
        conversation: &mut Conversation,
        behavior: ProtocolErrorBehavior,
    ) -> crate::Result<Payload> {
        let (sequence, mut payload) = self.read_frame().await?;
        conversation.accept_sequence(sequence, behavior)?;

        if payload.len() == MAX_PACKET_PAYLOAD {
            loop {
                let (sequence, fragment) = self.read_frame().await?;
                conversation.accept_sequence(sequence, behavior)?;

                let last = fragment.len() < MAX_PACKET_PAYLOAD;
                payload.extend_from_slice(&fragment);
                if last {
                    break;
                }
            }
        }

        event!(Level::TRACE, len = payload.len(), "read payload");
        Ok(Payload::new(payload))
    }

    /// Writes one logical payload, fragmenting as needed.
    pub(crate) async fn write_packet(
        &mut self,
        conversation: &mut Conversation,
        payload: &[u8],
    ) -> crate::Result<()> {
        let mut rest = payload;
        loop {
            let take = rest.len().min(MAX_PACKET_PAYLOAD);
            let (chunk, tail) = rest.split_at(take);
            self.write_frame(conversation.take_sequence(), chunk).await?;
            rest = tail;

            // A full-sized fragment needs a follow-up, empty if nothing is left.
            if take < MAX_PACKET_PAYLOAD {
                break;
            }
        }

        self.stream.flush().await?;
        event!(Level::TRACE, len = payload.len(), "wrote payload");
        Ok(())
    }

    async fn read_frame(&mut self) -> crate::Result<(u8, BytesMut)> {
        match &mut self.compression {
            None => {
                let mut header = [0u8; PACKET_HEADER_BYTES];
                self.stream.read_exact(&mut header).await?;

                let length = LittleEndian::read_u24(&header[..3]) as usize;
                let sequence = header[3];

                let mut payload = BytesMut::new();
                payload.resize(length, 0);
                self.stream.read_exact(&mut payload[..]).await?;

                Ok((sequence, payload))
            }
            Some(ctx) => {
                ctx.fill(&mut self.stream, PACKET_HEADER_BYTES).await?;
                let header = ctx.take(PACKET_HEADER_BYTES);

                let length = LittleEndian::read_u24(&header[..3]) as usize;
                let sequence = header[3];

                ctx.fill(&mut self.stream, length).await?;
                Ok((sequence, ctx.take(length)))
            }
        }
    }

    async fn write_frame(&mut self, sequence: u8, payload: &[u8]) -> crate::Result<()> {
        let mut header = [0u8; PACKET_HEADER_BYTES];
        LittleEndian::write_u24(&mut header[..3], payload.len() as u32);
        header[3] = sequence;

        match &mut self.compression {
            None => {
                self.stream.write_all(&header).await?;
                self.stream.write_all(payload).await?;
            }
            Some(ctx) => {
                let mut packet = Vec::with_capacity(PACKET_HEADER_BYTES + payload.len());
                packet.extend_from_slice(&header);
                packet.extend_from_slice(payload);
                ctx.write(&mut self.stream, &packet).await?;
            }
        }

        Ok(())
    }

    /// Shuts the stream down. Best-effort, used on dispose.
    pub(crate) async fn shutdown(&mut self) -> crate::Result<()> {
        self.stream.close().await?;
        Ok(())
    }
}
