#![doc = include_str!("../README.md")]

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate tracing;

mod channel;
mod controller;
mod error;
mod server;
mod state;

pub use {
    crate::{
        channel::ViscaChannel,
        controller::{CameraController, ControlInput, MemoryRequest},
        error::Error,
        server::{CameraServer, PollOutcome},
        state::{BusyFlag, CameraState, StateUpdate, MEMORY_SLOTS},
    },
    ptzcam_protocol as protocol,
};
pub type Result<T = ()> = std::result::Result<T, Error>;
