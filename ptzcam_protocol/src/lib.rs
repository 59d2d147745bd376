#![doc = include_str!("../README.md")]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate tracing;

pub mod buffer;
pub mod command;
pub mod dispatch;
mod error;
mod packet;

pub use crate::{
    buffer::PacketBuffer,
    command::{Command, MemoryAction, PanDirection, TiltDirection, ZoomDirection, ZoomParams},
    dispatch::{dispatch, CameraSink, CommandKind, DispatchOutcome, SPEED_LOOKUP},
    error::Error,
    packet::{encode_header, DecodeProgress, PacketHeader, ViscaPacket, TERMINATOR},
};

/// Result type.
pub type Result<T = ()> = std::result::Result<T, Error>;
