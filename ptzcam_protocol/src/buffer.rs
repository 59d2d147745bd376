//! # Fixed-capacity packet buffer
//!
//! [PacketBuffer] is the storage that every [ViscaPacket] is built in or
//! decoded into.
//!
//! ## Layout
//!
//! * `u8`: header, written by [PacketBuffer::encode]
//! * `data_size` bytes: packet body
//! * `u8`: terminator (`0xFF`), written by [PacketBuffer::encode]
//!
//! Two bytes of the capacity are always reserved for the header and
//! terminator, so a buffer of capacity `N` holds at most `N - 2` body bytes.
//!
//! [ViscaPacket]: crate::ViscaPacket
use crate::{packet::TERMINATOR, Error, Result};

/// Fixed-capacity byte buffer with a write cursor.
///
/// The buffer never grows: writes past the capacity fail rather than
/// allocating. Any storage which can be borrowed as a mutable byte slice may
/// be used, including `[u8; N]`, `&mut [u8]` and `Vec<u8>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBuffer<B> {
    storage: B,
    /// Number of body bytes written so far.
    ///
    /// Always `<= capacity - 2`.
    data_size: usize,
}

impl<B> PacketBuffer<B> {
    /// Wraps `storage` in an empty buffer.
    ///
    /// Existing contents of `storage` are ignored, and will be overwritten.
    pub const fn new(storage: B) -> Self {
        Self {
            storage,
            data_size: 0,
        }
    }

    /// Number of body bytes written.
    pub const fn len(&self) -> usize {
        self.data_size
    }

    pub const fn is_empty(&self) -> bool {
        self.data_size == 0
    }

    /// Discards the body, without clearing the underlying storage.
    pub fn clear(&mut self) {
        self.data_size = 0;
    }

    /// Returns the underlying storage.
    pub fn into_inner(self) -> B {
        self.storage
    }
}

impl<B: AsRef<[u8]>> PacketBuffer<B> {
    /// Total capacity of the buffer, including the header and terminator.
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    /// Number of body bytes which can still be written.
    pub fn remaining(&self) -> usize {
        self.capacity()
            .saturating_sub(2)
            .saturating_sub(self.data_size)
    }

    /// The body bytes written so far.
    pub fn body(&self) -> &[u8] {
        let storage = self.storage.as_ref();
        if storage.is_empty() {
            return &[];
        }
        &storage[1..1 + self.data_size]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PacketBuffer<B> {
    /// Appends a byte to the body.
    ///
    /// Returns `false` without changing the buffer if it is full.
    pub fn write_byte(&mut self, value: u8) -> bool {
        if self.remaining() == 0 {
            return false;
        }

        self.storage.as_mut()[1 + self.data_size] = value;
        self.data_size += 1;
        true
    }

    /// Appends bytes to the body, one at a time.
    ///
    /// Returns `false` at the first byte which doesn't fit. Bytes before that
    /// point *remain written*: this is not atomic.
    pub fn write_bytes(&mut self, data: &[u8]) -> bool {
        data.iter().all(|&b| self.write_byte(b))
    }

    /// Mutable access to the body bytes written so far.
    pub fn body_mut(&mut self) -> &mut [u8] {
        let data_size = self.data_size;
        let storage = self.storage.as_mut();
        if storage.is_empty() {
            return &mut [];
        }
        &mut storage[1..1 + data_size]
    }

    /// Writes the `header` and terminator around the body, and returns the
    /// complete wire form of the packet.
    ///
    /// ## Errors
    ///
    /// * [`Error::BufferTooSmall`] if the capacity is less than 2 bytes.
    pub fn encode(&mut self, header: u8) -> Result<&[u8]> {
        if self.capacity() < 2 {
            error!("buffer capacity {} cannot hold packet framing", self.capacity());
            return Err(Error::BufferTooSmall);
        }

        let data_size = self.data_size;
        let storage = self.storage.as_mut();
        storage[0] = header;
        storage[1 + data_size] = TERMINATOR;
        Ok(&storage[..data_size + 2])
    }
}

impl<const N: usize> Default for PacketBuffer<[u8; N]> {
    fn default() -> Self {
        Self::new([0u8; N])
    }
}
