//! VISCA camera commands
//!
//! [Command] values are validated, and then written into a
//! [ViscaPacket]'s body.
//!
//! ## Implemented commands
//!
//! Command | Body | Minimum buffer capacity
//! ------- | ---- | -----------------------
//! [PanTiltDrive][Command::PanTiltDrive] | `01 06 01 <pan speed> <tilt speed> <pan dir> <tilt dir>` | 9
//! [ZoomStop][Command::ZoomStop] | `01 04 07 00` | 6
//! [Zoom][Command::Zoom] | `01 04 07 <dir << 4 \| speed>` | 6
//! [Memory][Command::Memory] | `01 04 3f <action> <position>` | 7
//!
//! Buffer capacities include the header and terminator bytes.
use crate::{buffer::PacketBuffer, packet::ViscaPacket, Error, Result};
use binrw::{binrw, binwrite, BinRead, BinWrite};
#[cfg(feature = "clap")]
use clap::ValueEnum;
use modular_bitfield::{bitfield, specifiers::B4};
use num_traits::FromPrimitive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Maximum pan and tilt speed value (`0x18`).
pub const MAX_DRIVE_SPEED: u8 = 0x18;

/// Maximum zoom speed value.
pub const MAX_ZOOM_SPEED: u8 = 7;

/// Highest memory position index; cameras have 6 memory positions.
pub const MAX_POSITION_INDEX: u8 = 5;

/// Direction around the pan (X) axis.
#[binrw]
#[brw(repr = u8)]
#[derive(Debug, Default, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PanDirection {
    Left = 1,
    Right = 2,
    #[default]
    None = 3,
}

/// Direction around the tilt (Y) axis.
#[binrw]
#[brw(repr = u8)]
#[derive(Debug, Default, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TiltDirection {
    Up = 1,
    Down = 2,
    #[default]
    None = 3,
}

/// Zoom direction.
///
/// This is packed into the high nibble of the zoom byte, see [ZoomParams].
#[derive(Debug, Default, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ZoomDirection {
    #[default]
    None = 0,
    /// Zoom in (forward).
    Tele = 2,
    /// Zoom out (backward).
    Wide = 3,
}

/// Action on the camera's position memory.
#[binrw]
#[brw(repr = u8)]
#[derive(Debug, Default, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "clap", derive(ValueEnum))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum MemoryAction {
    /// Forget all stored positions.
    Reset = 0,
    /// Store the current position.
    Set = 1,
    /// Move to a stored position.
    Recall = 2,
    /// No pending action. Cameras reject this value.
    #[default]
    None = 3,
}

/// Zoom speed and direction byte.
///
/// ## Format
///
/// This is a `u8` bitfield. Fields from LSB to MSB:
///
/// * `u4 0x0f`: speed
/// * `u4 0xf0`: direction ([ZoomDirection])
///
/// The direction is kept as a raw value, as packets from the wire may contain
/// values which aren't a valid [ZoomDirection].
#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(BinRead, BinWrite, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[br(map = From::<u8>::from)]
#[bw(map = |&x| Into::<u8>::into(x))]
pub struct ZoomParams {
    pub speed: B4,
    pub direction: B4,
}

impl ZoomParams {
    /// The [ZoomDirection] in the high nibble, or `None` if it is not a valid
    /// direction.
    pub fn zoom_direction(&self) -> Option<ZoomDirection> {
        ZoomDirection::from_u8(self.direction())
    }
}

/// A VISCA command, which can be written into a packet body.
///
/// Speeds and indexes are range-checked by [`Command::validate()`] before
/// anything is written.
#[binwrite]
#[bw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Command {
    /// Moves the camera around the pan and tilt axes.
    ///
    /// Speeds are `1..=24`.
    #[bw(magic = b"\x01\x06\x01")]
    PanTiltDrive {
        pan_speed: u8,
        tilt_speed: u8,
        pan_direction: PanDirection,
        tilt_direction: TiltDirection,
    },

    /// Stops zooming.
    #[bw(magic = b"\x01\x04\x07\x00")]
    ZoomStop,

    /// Zooms the camera.
    ///
    /// Speed is `0..=7`.
    #[bw(magic = b"\x01\x04\x07")]
    Zoom {
        #[bw(ignore)]
        speed: u8,
        #[bw(ignore)]
        direction: ZoomDirection,
        #[bw(calc = ZoomParams::new()
            .with_speed(*speed & 0x0f)
            .with_direction(*direction as u8))]
        params: ZoomParams,
    },

    /// Acts on a memory position.
    ///
    /// Position index is `0..=5`.
    #[bw(magic = b"\x01\x04\x3f")]
    Memory {
        action: MemoryAction,
        position_index: u8,
    },
}

impl Command {
    /// Longest body of any command.
    pub const MAX_BODY_LENGTH: usize = 7;

    /// Checks that the command's parameters are in range.
    ///
    /// ## Errors
    ///
    /// * [`Error::ParameterOutOfRange`]
    pub fn validate(&self) -> Result<()> {
        match *self {
            Command::PanTiltDrive {
                pan_speed,
                tilt_speed,
                ..
            } => {
                if !(1..=MAX_DRIVE_SPEED).contains(&pan_speed) {
                    error!("pan speed {pan_speed} out of range 1..={MAX_DRIVE_SPEED}");
                    return Err(Error::ParameterOutOfRange);
                }

                if !(1..=MAX_DRIVE_SPEED).contains(&tilt_speed) {
                    error!("tilt speed {tilt_speed} out of range 1..={MAX_DRIVE_SPEED}");
                    return Err(Error::ParameterOutOfRange);
                }
            }

            Command::ZoomStop => (),

            Command::Zoom { speed, .. } => {
                if speed > MAX_ZOOM_SPEED {
                    error!("zoom speed {speed} out of range 0..={MAX_ZOOM_SPEED}");
                    return Err(Error::ParameterOutOfRange);
                }
            }

            Command::Memory { position_index, .. } => {
                if position_index > MAX_POSITION_INDEX {
                    error!("position index {position_index} out of range 0..={MAX_POSITION_INDEX}");
                    return Err(Error::ParameterOutOfRange);
                }
            }
        }

        Ok(())
    }

    /// Validates the command, and appends it to `packet`'s body.
    ///
    /// ## Errors
    ///
    /// * [`Error::ParameterOutOfRange`] if validation fails. Nothing is
    ///   written.
    /// * [`Error::BufferTooSmall`] if `packet` can't hold the body. The bytes
    ///   which fitted are left in the packet, and the packet should not be
    ///   sent.
    pub fn write_body<B>(&self, packet: &mut ViscaPacket<B>) -> Result<()>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.validate()?;

        let mut body = Cursor::new([0u8; Self::MAX_BODY_LENGTH]);
        self.write(&mut body)?;
        let len = usize::try_from(body.position()).map_err(|_| Error::InvalidLength)?;

        if !packet.write_bytes(&body.get_ref()[..len]) {
            error!(
                "{self:?} needs a {} byte buffer, got {} bytes",
                len + 2,
                packet.buffer().capacity()
            );
            return Err(Error::BufferTooSmall);
        }

        Ok(())
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ViscaPacket<B> {
    /// Builds a packet containing `command`, addressed from
    /// [DEFAULT_SENDER][Self::DEFAULT_SENDER] to
    /// [DEFAULT_RECEIVER][Self::DEFAULT_RECEIVER].
    ///
    /// See [`Command::write_body()`] for errors.
    pub fn new_command(storage: B, command: &Command) -> Result<Self> {
        let mut packet = Self::new(
            Self::DEFAULT_RECEIVER,
            Self::DEFAULT_SENDER,
            PacketBuffer::new(storage),
        );
        command.write_body(&mut packet)?;
        Ok(packet)
    }

    /// Builds a [PanTiltDrive][Command::PanTiltDrive] packet.
    ///
    /// `storage` must hold at least 9 bytes.
    pub fn new_pan_tilt_drive(
        storage: B,
        pan_speed: u8,
        pan_direction: PanDirection,
        tilt_speed: u8,
        tilt_direction: TiltDirection,
    ) -> Result<Self> {
        Self::new_command(
            storage,
            &Command::PanTiltDrive {
                pan_speed,
                tilt_speed,
                pan_direction,
                tilt_direction,
            },
        )
    }

    /// Builds a [Zoom][Command::Zoom] packet.
    ///
    /// `storage` must hold at least 6 bytes.
    pub fn new_zoom(storage: B, speed: u8, direction: ZoomDirection) -> Result<Self> {
        Self::new_command(storage, &Command::Zoom { speed, direction })
    }

    /// Builds a [ZoomStop][Command::ZoomStop] packet.
    ///
    /// `storage` must hold at least 6 bytes.
    pub fn new_zoom_stop(storage: B) -> Result<Self> {
        Self::new_command(storage, &Command::ZoomStop)
    }

    /// Builds a [Memory][Command::Memory] packet.
    ///
    /// `storage` must hold at least 7 bytes.
    pub fn new_memory(storage: B, action: MemoryAction, position_index: u8) -> Result<Self> {
        Self::new_command(
            storage,
            &Command::Memory {
                action,
                position_index,
            },
        )
    }

    /// Builds a packet which moves the camera to a stored position.
    pub fn new_recall_position(storage: B, position_index: u8) -> Result<Self> {
        Self::new_memory(storage, MemoryAction::Recall, position_index)
    }

    /// Builds a packet which stores the camera's current position.
    pub fn new_set_position(storage: B, position_index: u8) -> Result<Self> {
        Self::new_memory(storage, MemoryAction::Set, position_index)
    }

    /// Builds a packet which resets the camera's stored positions.
    pub fn new_reset_position(storage: B, position_index: u8) -> Result<Self> {
        Self::new_memory(storage, MemoryAction::Reset, position_index)
    }
}
