//! Transport layer for VISCA over byte streams.
//!
//! VISCA cameras are normally controlled over RS-232 or RS-422 serial links
//! ([`ViscaChannel::open_serial()`]). Camera bridges and simulators also
//! accept the same byte stream over TCP ([`ViscaChannel::connect()`]).
//!
//! Packets are not length-prefixed: each one is read a byte at a time until
//! its `0xFF` terminator, so readers should be buffered.
use crate::{
    protocol::{
        DecodeProgress, Error as ProtocolError, PacketBuffer, ViscaPacket, TERMINATOR,
    },
    Error, Result,
};
use std::io::ErrorKind;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::{TcpStream, ToSocketAddrs},
};
use tokio_serial::{
    DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits,
};

pub struct ViscaChannel<T> {
    stream: Option<T>,
}

impl<T> ViscaChannel<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Extracts the inner stream from this channel.
    ///
    /// This renders the [ViscaChannel] unusable.
    pub fn take_inner(&mut self) -> Result<T> {
        self.stream.take().ok_or(Error::ChannelUnavailable)
    }
}

impl ViscaChannel<TcpStream> {
    /// Connects to a camera (or camera bridge) over TCP.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl ViscaChannel<SerialStream> {
    /// Opens a camera's serial port (eg: `/dev/ttyUSB0`).
    ///
    /// VISCA links are 8N1, without flow control.
    ///
    /// This must be called from within a tokio runtime.
    ///
    /// ## Errors
    ///
    /// * [`Error::SerialError`] if the port can't be opened.
    pub fn open_serial(path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("could not open serial port {path}: {e}");
                Error::from(e)
            })?;

        info!("Opened serial port {path} at {baud_rate} baud");
        Ok(Self::new(port))
    }
}

impl<T: AsyncRead + AsyncWrite> ViscaChannel<T> {
    /// Splits the channel into separate receiving and sending channels.
    pub fn split(mut self) -> Result<(ViscaChannel<ReadHalf<T>>, ViscaChannel<WriteHalf<T>>)> {
        let (r, w) = tokio::io::split(self.take_inner()?);
        Ok((ViscaChannel::new(r), ViscaChannel::new(w)))
    }
}

impl<T: AsyncWrite + Unpin> ViscaChannel<T> {
    /// Encodes `packet` and writes it to the stream.
    pub async fn send<B>(&mut self, packet: &mut ViscaPacket<B>) -> Result
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        let stream = self.stream.as_mut().ok_or(Error::ChannelUnavailable)?;
        let wire = packet.encode()?;
        trace!(">>> {}", hex::encode(wire));
        stream.write_all(wire).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl<T: AsyncRead + Unpin> ViscaChannel<T> {
    /// Reads the next packet from the stream into `storage`.
    ///
    /// ## Errors
    ///
    /// * [`ProtocolError::StreamClosed`] when the stream ends.
    /// * [`ProtocolError::BufferTooSmall`] when the packet body doesn't fit in
    ///   `storage`. The rest of the packet is discarded, so the channel can
    ///   continue to be used.
    pub async fn recv<B>(&mut self, storage: B) -> Result<ViscaPacket<B>>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        let header = self.read_byte().await?;
        let mut packet = ViscaPacket::from_header(header, PacketBuffer::new(storage));

        loop {
            match packet.push_wire_byte(self.read_byte().await?) {
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
                    let mut skipped = 1;
                    while self.read_byte().await? != TERMINATOR {
                        skipped += 1;
                    }
                    warn!(
                        "dropped packet from {} larger than {} bytes ({skipped} bytes discarded)",
                        packet.sender_addr,
                        packet.buffer().capacity(),
                    );
                    return Err(ProtocolError::BufferTooSmall.into());
                }
            }
        }
    }

    async fn read_byte(&mut self) -> Result<u8> {
        let stream = self.stream.as_mut().ok_or(Error::ChannelUnavailable)?;
        match stream.read_u8().await {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(ProtocolError::StreamClosed.into()),
            Err(e) => Err(e.into()),
        }
    }
}
