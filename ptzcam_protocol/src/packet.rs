use crate::{buffer::PacketBuffer, Error, Result};
use modular_bitfield::{bitfield, specifiers::B3};
use std::io::{ErrorKind, Read};

/// Byte which terminates every packet.
pub const TERMINATOR: u8 = 0xff;

/// Mask for the 3-bit device addresses.
const ADDRESS_MASK: u8 = 0x07;

/// Packet header.
///
/// ## Format
///
/// This is a `u8` bitfield. Fields from LSB to MSB:
///
/// * `u3 0x07`: receiver address
/// * `bit 0x08`: unused, always 0
/// * `u3 0x70`: sender address
/// * `bit 0x80`: header marker, always 1
#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct PacketHeader {
    // The device being addressed.
    pub receiver: B3,
    #[skip]
    __: bool,
    // The device which sent the packet.
    pub sender: B3,
    // Set on every header byte, which distinguishes it from body bytes.
    pub marker: bool,
}

/// Builds a header byte for a packet from `sender_addr` to `receiver_addr`.
///
/// Only the low 3 bits of each address are used.
pub fn encode_header(receiver_addr: u8, sender_addr: u8) -> u8 {
    PacketHeader::new()
        .with_receiver(receiver_addr & ADDRESS_MASK)
        .with_sender(sender_addr & ADDRESS_MASK)
        .with_marker(true)
        .into()
}

/// Progress of decoding a packet, after a byte has been pushed to
/// [`ViscaPacket::push_wire_byte()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeProgress {
    /// The byte was added to the body; the packet has not ended yet.
    Incomplete,
    /// The byte was the terminator; the packet is complete.
    Complete,
    /// The byte did not fit in the buffer, and was dropped.
    Overflow,
}

/// [ViscaPacket] is the basic unit of communication with a VISCA camera.
///
/// Everything else is built on top of it.
///
/// ## Packet format
///
/// * `u8`: [header][PacketHeader]
/// * body: 0 or more bytes, never containing `0xFF`
/// * `u8`: terminator (`0xFF`)
///
/// The packet is stored in a caller-provided [PacketBuffer], so building or
/// decoding one never allocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViscaPacket<B> {
    /// Address of the device being addressed (0 - 7).
    pub receiver_addr: u8,
    /// Address of the device sending the packet (0 - 7).
    pub sender_addr: u8,
    buffer: PacketBuffer<B>,
}

impl<B> ViscaPacket<B> {
    /// Receiver address used for commands sent by a controller.
    pub const DEFAULT_RECEIVER: u8 = 1;
    /// Sender address used for commands sent by a controller.
    pub const DEFAULT_SENDER: u8 = 0;

    pub const fn new(receiver_addr: u8, sender_addr: u8, buffer: PacketBuffer<B>) -> Self {
        Self {
            receiver_addr,
            sender_addr,
            buffer,
        }
    }

    /// Starts a packet from a `header` byte read off the wire.
    pub fn from_header(header: u8, buffer: PacketBuffer<B>) -> Self {
        let header = PacketHeader::from(header);
        if !header.marker() {
            debug!("header {header:?} does not have the marker bit set");
        }
        Self::new(header.receiver(), header.sender(), buffer)
    }

    /// The header byte for this packet.
    pub fn header(&self) -> u8 {
        encode_header(self.receiver_addr, self.sender_addr)
    }

    pub const fn buffer(&self) -> &PacketBuffer<B> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut PacketBuffer<B> {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> PacketBuffer<B> {
        self.buffer
    }
}

impl<B: AsRef<[u8]>> ViscaPacket<B> {
    /// The packet body, without header or terminator.
    pub fn body(&self) -> &[u8] {
        self.buffer.body()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ViscaPacket<B> {
    /// Appends a byte to the body. See [`PacketBuffer::write_byte()`].
    pub fn write_byte(&mut self, value: u8) -> bool {
        self.buffer.write_byte(value)
    }

    /// Appends bytes to the body. See [`PacketBuffer::write_bytes()`].
    pub fn write_bytes(&mut self, data: &[u8]) -> bool {
        self.buffer.write_bytes(data)
    }

    /// Writes the header and terminator into the buffer, and returns the
    /// complete wire form of the packet.
    pub fn encode(&mut self) -> Result<&[u8]> {
        let header = self.header();
        self.buffer.encode(header)
    }

    /// Handles the next byte read from the wire after the header.
    pub fn push_wire_byte(&mut self, value: u8) -> DecodeProgress {
        if value == TERMINATOR {
            DecodeProgress::Complete
        } else if self.write_byte(value) {
            DecodeProgress::Incomplete
        } else {
            DecodeProgress::Overflow
        }
    }

    /// Reads a single packet from `stream` into `storage`.
    ///
    /// This blocks for as long as `stream` blocks; there is no timeout.
    ///
    /// ## Errors
    ///
    /// * [`Error::StreamClosed`] if the stream ends before the terminator.
    /// * [`Error::BufferTooSmall`] if the body doesn't fit in `storage`. The
    ///   rest of the packet is read and discarded up to and including its
    ///   terminator, so the next call starts at a packet boundary.
    pub fn decode<R: Read>(storage: B, stream: &mut R) -> Result<Self> {
        let header = read_byte(stream)?;
        let mut packet = Self::from_header(header, PacketBuffer::new(storage));

        loop {
            match packet.push_wire_byte(read_byte(stream)?) {
                DecodeProgress::Incomplete => (),
                DecodeProgress::Complete => {
                    trace!(
                        "<<< {}->{}: {}",
                        packet.sender_addr,
                        packet.receiver_addr,
                        hex::encode(packet.body())
                    );
                    return Ok(packet);
                }
                DecodeProgress::Overflow => {
                    let skipped = skip_to_terminator(stream)?;
                    warn!(
                        "packet body exceeds buffer capacity of {} bytes, skipped {} more bytes",
                        packet.buffer.capacity(),
                        skipped + 1
                    );
                    return Err(Error::BufferTooSmall);
                }
            }
        }
    }
}

/// Reads one byte, mapping end-of-stream to [`Error::StreamClosed`].
fn read_byte<R: Read>(stream: &mut R) -> Result<u8> {
    let mut b = [0u8; 1];
    match stream.read_exact(&mut b) {
        Ok(()) => Ok(b[0]),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::StreamClosed),
        Err(e) => Err(e.into()),
    }
}

/// Discards bytes up to and including the next terminator.
///
/// Returns the number of bytes discarded before the terminator.
fn skip_to_terminator<R: Read>(stream: &mut R) -> Result<usize> {
    let mut skipped = 0;
    while read_byte(stream)? != TERMINATOR {
        skipped += 1;
    }
    Ok(skipped)
}
