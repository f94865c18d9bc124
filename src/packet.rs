//! Packetized writes
//!
//! Outbound messages are encoded once, then cut into fixed-size packets. The last packet is padded with ASCII spaces
//! so every packet handed to the transport is exactly [`PacketSize`] bytes long. Packets are written strictly in
//! order, and each write is awaited before the next one is issued.

use std::num::NonZeroUsize;

use tracing::{debug, trace};

use crate::codepage::{CodePage, UnmappablePolicy};
use crate::error::ErrorKind;
use crate::{Error, Result, Transport};

/// The byte the tail of a short packet is filled with
pub const PADDING: u8 = b' ';

/// Size in bytes of every packet a [`PacketWriter`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "usize", into = "usize")
)]
pub struct PacketSize(NonZeroUsize);

impl PacketSize {
    /// The packet size used when none is configured
    pub const DEFAULT: PacketSize = PacketSize(match NonZeroUsize::new(64) {
        Some(size) => size,
        None => unreachable!(),
    });

    /// Creates a packet size.
    ///
    /// Fails with [`ErrorKind::InvalidParameter`] if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        NonZeroUsize::new(size)
            .map(PacketSize)
            .ok_or_else(|| Error::new(ErrorKind::InvalidParameter, None, "packet size must be positive"))
    }

    /// The size in bytes
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for PacketSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for PacketSize {
    type Error = Error;

    fn try_from(size: usize) -> Result<Self> {
        Self::new(size)
    }
}

impl From<PacketSize> for usize {
    fn from(size: PacketSize) -> Self {
        size.get()
    }
}

/// Outbound data for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Text, encoded through the writer's code page
    Text(&'a str),
    /// Bytes that are already encoded and are sent as-is
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(text: &'a String) -> Self {
        Payload::Text(text)
    }
}

impl<'a> From<&'a [u8]> for Payload<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Payload<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Payload::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for Payload<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl Payload<'_> {
    /// Encodes the payload into the bytes that go on the wire.
    pub fn encode(self, code_page: CodePage, policy: UnmappablePolicy) -> Result<Vec<u8>> {
        match self {
            Payload::Text(text) => code_page.encode(text, policy),
            Payload::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// A packet of exactly [`PacketSize`] bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet(Box<[u8]>);

impl Packet {
    /// The packet bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The packet length, which always equals the packet size it was cut with
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Packets are never empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for Packet {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Iterator over the packets of an encoded message, returned by [`packetize`]
#[derive(Debug, Clone)]
pub struct Packets<'a> {
    chunks: std::slice::Chunks<'a, u8>,
    size: usize,
}

impl Iterator for Packets<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        let chunk = self.chunks.next()?;
        let mut packet = vec![PADDING; self.size].into_boxed_slice();
        packet[..chunk.len()].copy_from_slice(chunk);
        Some(Packet(packet))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Packets<'_> {}

/// Cuts `bytes` into space-padded packets of `size` bytes.
///
/// Yields `ceil(bytes.len() / size)` packets; an empty input yields none.
pub fn packetize(bytes: &[u8], size: PacketSize) -> Packets<'_> {
    Packets {
        chunks: bytes.chunks(size.get()),
        size: size.get(),
    }
}

/// Writes messages to a [`Transport`] as a sequence of fixed-size packets.
pub struct PacketWriter<'a, T: ?Sized> {
    transport: &'a T,
    packet_size: PacketSize,
    code_page: CodePage,
    policy: UnmappablePolicy,
}

impl<T: ?Sized> std::fmt::Debug for PacketWriter<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketWriter")
            .field("packet_size", &self.packet_size)
            .field("code_page", &self.code_page)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Transport + ?Sized> PacketWriter<'a, T> {
    /// Creates a writer with the default packet size (64), code page and unmappable policy
    pub fn new(transport: &'a T) -> Self {
        PacketWriter {
            transport,
            packet_size: PacketSize::DEFAULT,
            code_page: CodePage::default(),
            policy: UnmappablePolicy::default(),
        }
    }

    /// Sets the packet size
    pub fn packet_size(mut self, packet_size: PacketSize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Sets the code page text payloads are encoded with
    pub fn code_page(mut self, code_page: CodePage) -> Self {
        self.code_page = code_page;
        self
    }

    /// Sets how unmappable characters are handled
    pub fn unmappable(mut self, policy: UnmappablePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Encodes `payload`, splits it into packets and writes them in order.
    ///
    /// Returns the number of packets written. An empty payload writes nothing and returns `0` without contacting the
    /// transport. Fails with:
    ///
    /// - [`ErrorKind::Encoding`] if text contains characters outside the code page (nothing is written)
    /// - [`ErrorKind::NotConnected`] if the transport has no active connection (nothing is written)
    /// - [`ErrorKind::TransportWrite`] if a packet write fails or is not acknowledged; the remaining packets are
    ///   not written
    pub async fn write_packets(&self, payload: impl Into<Payload<'_>>) -> Result<usize> {
        let bytes = payload.into().encode(self.code_page, self.policy)?;
        let packets = packetize(&bytes, self.packet_size);
        let total = packets.len();
        if total == 0 {
            trace!("empty payload, no packets to write");
            return Ok(0);
        }

        if !self.transport.is_connected().await? {
            return Err(Error::new(
                ErrorKind::NotConnected,
                None,
                format!("cannot write {total} packet(s) without a connection"),
            ));
        }

        debug!(
            bytes = bytes.len(),
            packets = total,
            packet_size = self.packet_size.get(),
            "writing packets"
        );
        for (index, packet) in packets.enumerate() {
            match self.transport.write(&packet).await {
                Ok(true) => trace!(index, "packet acknowledged"),
                Ok(false) => {
                    return Err(Error::new(
                        ErrorKind::TransportWrite,
                        None,
                        format!("packet {index} of {total} was not acknowledged"),
                    ))
                }
                Err(err) => {
                    return Err(Error::new(
                        ErrorKind::TransportWrite,
                        Some(Box::new(err)),
                        format!("packet {index} of {total}"),
                    ))
                }
            }
        }

        Ok(total)
    }
}
