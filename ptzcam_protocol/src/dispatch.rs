//! Incoming command dispatch
//!
//! [dispatch] matches a decoded packet's body against a table of command
//! signatures, and applies the matching command to a [CameraSink].
//!
//! Malformed or unknown packets are logged and reported in the
//! [DispatchOutcome]; they never stop the caller's packet loop.
use crate::{
    command::{MemoryAction, ZoomDirection, ZoomParams, MAX_POSITION_INDEX, MAX_ZOOM_SPEED},
    packet::ViscaPacket,
    Error, Result,
};
use num_traits::FromPrimitive;

/// Pan and tilt speeds (in degrees per second) for each wire speed value.
///
/// Index 0 is not a valid wire speed.
pub static SPEED_LOOKUP: [f32; 25] = [
    0., 1.3, 1.7, 2.2, 3.2, 5.4, 11., 16., 21., 27., 31., 35., 40., 42., 44., 46., 48., 50., 79.,
    81., 83., 85., 87., 90., 100.,
];

/// Camera which incoming commands are applied to.
///
/// Signed speeds select a direction on their axis; `0` stops the axis.
pub trait CameraSink {
    /// Sets the pan axis speed, in degrees per second.
    fn set_pan_speed(&mut self, speed: f32);
    /// Sets the tilt axis speed, in degrees per second.
    fn set_tilt_speed(&mut self, speed: f32);
    /// Starts moving at the current pan and tilt speeds.
    fn drive(&mut self);
    fn set_zoom_speed(&mut self, speed: i32);
    /// Stores the current position in memory slot `index`.
    fn set_position(&mut self, index: u8);
    /// Moves to the position in memory slot `index`.
    fn recall_position(&mut self, index: u8);
    /// Forgets all stored positions.
    fn reset_positions(&mut self);
    /// `true` while the camera is moving to a recalled position, and can't
    /// take new commands.
    fn is_busy(&self) -> bool;
}

/// Kind of command matched by [dispatch].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Memory,
    PanTilt,
    Zoom,
}

/// Result of [dispatch]ing a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command was applied to the camera.
    Applied(CommandKind),
    /// The body didn't match any known command. Contains the body.
    UnknownPacket(Vec<u8>),
    /// The body matched a command, but was malformed or out of range. The
    /// camera was not changed.
    InvalidCommand(CommandKind),
}

type Handler = fn(&mut dyn CameraSink, &[u8]) -> Result<()>;

struct Signature {
    prefix: &'static [u8],
    kind: CommandKind,
    handler: Handler,
}

/// Known command signatures.
///
/// Prefixes must not be prefixes of each other, so that at most one matches.
static SIGNATURES: [Signature; 3] = [
    Signature {
        prefix: b"\x01\x04\x3f",
        kind: CommandKind::Memory,
        handler: memory,
    },
    Signature {
        prefix: b"\x01\x06\x01",
        kind: CommandKind::PanTilt,
        handler: pan_tilt,
    },
    Signature {
        prefix: b"\x01\x04\x07",
        kind: CommandKind::Zoom,
        handler: zoom,
    },
];

/// Applies the command in `packet` to `sink`.
pub fn dispatch<S, B>(sink: &mut S, packet: &ViscaPacket<B>) -> DispatchOutcome
where
    S: CameraSink,
    B: AsRef<[u8]>,
{
    let body = packet.body();
    let Some(signature) = SIGNATURES.iter().find(|s| body.starts_with(s.prefix)) else {
        warn!(
            "unknown packet from {}: {}",
            packet.sender_addr,
            hex::encode(body)
        );
        return DispatchOutcome::UnknownPacket(body.to_vec());
    };

    match (signature.handler)(sink, body) {
        Ok(()) => {
            debug!("applied {:?}: {}", signature.kind, hex::encode(body));
            DispatchOutcome::Applied(signature.kind)
        }
        Err(e) => {
            warn!(
                "invalid {:?} command ({e}): {}",
                signature.kind,
                hex::encode(body)
            );
            DispatchOutcome::InvalidCommand(signature.kind)
        }
    }
}

/// `01 04 3f <action> <position>`
fn memory(sink: &mut dyn CameraSink, body: &[u8]) -> Result<()> {
    let &[_, _, _, action, position_index] = body else {
        return Err(Error::InvalidLength);
    };

    if position_index > MAX_POSITION_INDEX {
        return Err(Error::InvalidCommand);
    }

    match MemoryAction::from_u8(action) {
        Some(MemoryAction::Reset) => sink.reset_positions(),
        Some(MemoryAction::Set) => sink.set_position(position_index),
        Some(MemoryAction::Recall) => sink.recall_position(position_index),
        Some(MemoryAction::None) | None => return Err(Error::InvalidCommand),
    }

    Ok(())
}

/// `01 06 01 <pan speed> <tilt speed> <pan dir> <tilt dir>`
fn pan_tilt(sink: &mut dyn CameraSink, body: &[u8]) -> Result<()> {
    let &[_, _, _, pan_speed, tilt_speed, pan_direction, tilt_direction] = body else {
        return Err(Error::InvalidLength);
    };

    // A bad speed on either axis stops both.
    let (pan_speed, tilt_speed) = match (
        SPEED_LOOKUP.get(usize::from(pan_speed)),
        SPEED_LOOKUP.get(usize::from(tilt_speed)),
    ) {
        (Some(&pan), Some(&tilt)) => (pan, tilt),
        _ => {
            debug!("speed out of range (pan {pan_speed}, tilt {tilt_speed}), stopping");
            (0., 0.)
        }
    };

    sink.set_pan_speed(axis_velocity(pan_speed, pan_direction));
    sink.set_tilt_speed(axis_velocity(tilt_speed, tilt_direction));
    sink.drive();
    Ok(())
}

fn axis_velocity(speed: f32, direction: u8) -> f32 {
    match direction {
        1 => speed,
        2 => -speed,
        _ => 0.,
    }
}

/// `01 04 07 <dir << 4 | speed>`
fn zoom(sink: &mut dyn CameraSink, body: &[u8]) -> Result<()> {
    let &[_, _, _, params] = body else {
        return Err(Error::InvalidLength);
    };

    let params = ZoomParams::from(params);
    let speed = params.speed();
    if !(1..=MAX_ZOOM_SPEED).contains(&speed) {
        return Err(Error::InvalidCommand);
    }

    let speed = i32::from(speed);
    let velocity = match params.zoom_direction() {
        Some(ZoomDirection::None) => 0,
        Some(ZoomDirection::Tele) => -speed,
        Some(ZoomDirection::Wide) => speed,
        None => return Err(Error::InvalidCommand),
    };

    sink.set_zoom_speed(velocity);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::PacketBuffer;
    use std::io::Cursor;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Event {
        PanSpeed(f32),
        TiltSpeed(f32),
        Drive,
        ZoomSpeed(i32),
        SetPosition(u8),
        RecallPosition(u8),
        ResetPositions,
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
    }

    impl CameraSink for RecordingSink {
        fn set_pan_speed(&mut self, speed: f32) {
            self.events.push(Event::PanSpeed(speed));
        }

        fn set_tilt_speed(&mut self, speed: f32) {
            self.events.push(Event::TiltSpeed(speed));
        }

        fn drive(&mut self) {
            self.events.push(Event::Drive);
        }

        fn set_zoom_speed(&mut self, speed: i32) {
            self.events.push(Event::ZoomSpeed(speed));
        }

        fn set_position(&mut self, index: u8) {
            self.events.push(Event::SetPosition(index));
        }

        fn recall_position(&mut self, index: u8) {
            self.events.push(Event::RecallPosition(index));
        }

        fn reset_positions(&mut self) {
            self.events.push(Event::ResetPositions);
        }

        fn is_busy(&self) -> bool {
            false
        }
    }

    fn packet(body: &str) -> Result<ViscaPacket<[u8; 16]>> {
        let mut packet = ViscaPacket::new(1, 0, PacketBuffer::new([0u8; 16]));
        assert!(packet.write_bytes(&hex::decode(body)?));
        Ok(packet)
    }

    fn dispatch_body(body: &str) -> Result<(DispatchOutcome, Vec<Event>)> {
        let mut sink = RecordingSink::default();
        let outcome = dispatch(&mut sink, &packet(body)?);
        Ok((outcome, sink.events))
    }

    #[test]
    fn signatures_disjoint() {
        for (i, a) in SIGNATURES.iter().enumerate() {
            for (j, b) in SIGNATURES.iter().enumerate() {
                if i != j {
                    assert!(!a.prefix.starts_with(b.prefix), "{:?} / {:?}", a.kind, b.kind);
                }
            }
        }
    }

    #[test]
    fn unknown() -> Result<()> {
        let _ = tracing_subscriber::fmt().try_init();
        let (outcome, events) = dispatch_body("010402")?;
        assert_eq!(DispatchOutcome::UnknownPacket(vec![0x01, 0x04, 0x02]), outcome);
        assert!(events.is_empty());

        let (outcome, events) = dispatch_body("")?;
        assert_eq!(DispatchOutcome::UnknownPacket(vec![]), outcome);
        assert!(events.is_empty());

        // Truncated signature
        let (outcome, _) = dispatch_body("0106")?;
        assert_eq!(DispatchOutcome::UnknownPacket(vec![0x01, 0x06]), outcome);
        Ok(())
    }

    #[test]
    fn pan_tilt() -> Result<()> {
        let (outcome, events) = dispatch_body("01060101180102")?;
        assert_eq!(DispatchOutcome::Applied(CommandKind::PanTilt), outcome);
        assert_eq!(
            vec![Event::PanSpeed(1.3), Event::TiltSpeed(-100.), Event::Drive],
            events
        );

        let (_, events) = dispatch_body("01060105070201")?;
        assert_eq!(
            vec![Event::PanSpeed(-5.4), Event::TiltSpeed(16.), Event::Drive],
            events
        );

        // Direction 3 (or anything else) stops the axis.
        let (_, events) = dispatch_body("01060105070309")?;
        assert_eq!(
            vec![Event::PanSpeed(0.), Event::TiltSpeed(0.), Event::Drive],
            events
        );
        Ok(())
    }

    #[test]
    fn pan_tilt_bad_speed_stops_both() -> Result<()> {
        for body in ["010601c8050101", "01060105c80101", "01060119190202"] {
            let (outcome, events) = dispatch_body(body)?;
            assert_eq!(DispatchOutcome::Applied(CommandKind::PanTilt), outcome);
            assert_eq!(
                vec![Event::PanSpeed(0.), Event::TiltSpeed(0.), Event::Drive],
                events,
                "{body}"
            );
        }
        Ok(())
    }

    #[test]
    fn pan_tilt_length() -> Result<()> {
        for body in ["010601", "010601010101", "0106010101010101"] {
            let (outcome, events) = dispatch_body(body)?;
            assert_eq!(DispatchOutcome::InvalidCommand(CommandKind::PanTilt), outcome);
            assert!(events.is_empty());
        }
        Ok(())
    }

    #[test]
    fn zoom() -> Result<()> {
        let (outcome, events) = dispatch_body("01040734")?;
        assert_eq!(DispatchOutcome::Applied(CommandKind::Zoom), outcome);
        assert_eq!(vec![Event::ZoomSpeed(4)], events);

        let (_, events) = dispatch_body("01040727")?;
        assert_eq!(vec![Event::ZoomSpeed(-7)], events);

        // Direction 0 stops, whatever the speed.
        for speed in 1..=7 {
            let (outcome, events) = dispatch_body(&format!("0104070{speed}"))?;
            assert_eq!(DispatchOutcome::Applied(CommandKind::Zoom), outcome);
            assert_eq!(vec![Event::ZoomSpeed(0)], events);
        }
        Ok(())
    }

    #[test]
    fn zoom_invalid() -> Result<()> {
        // Bad direction, speed 0, speed 8, zoom stop, bad length
        for body in ["01040714", "01040744", "01040720", "01040738", "01040700", "0104073300"] {
            let (outcome, events) = dispatch_body(body)?;
            assert_eq!(DispatchOutcome::InvalidCommand(CommandKind::Zoom), outcome, "{body}");
            assert!(events.is_empty());
        }
        Ok(())
    }

    #[test]
    fn memory() -> Result<()> {
        let (outcome, events) = dispatch_body("01043f0205")?;
        assert_eq!(DispatchOutcome::Applied(CommandKind::Memory), outcome);
        assert_eq!(vec![Event::RecallPosition(5)], events);

        let (_, events) = dispatch_body("01043f0100")?;
        assert_eq!(vec![Event::SetPosition(0)], events);

        let (_, events) = dispatch_body("01043f0003")?;
        assert_eq!(vec![Event::ResetPositions], events);
        Ok(())
    }

    #[test]
    fn memory_invalid() -> Result<()> {
        // Index 6, action None, unknown action, bad length
        for body in ["01043f0206", "01043f0301", "01043f0901", "01043f02", "01043f020100"] {
            let (outcome, events) = dispatch_body(body)?;
            assert_eq!(DispatchOutcome::InvalidCommand(CommandKind::Memory), outcome, "{body}");
            assert!(events.is_empty());
        }
        Ok(())
    }

    #[test]
    fn built_commands() -> Result<()> {
        let mut sink = RecordingSink::default();
        let packet = ViscaPacket::new_recall_position([0u8; 16], 2)?;
        assert_eq!(
            DispatchOutcome::Applied(CommandKind::Memory),
            dispatch(&mut sink, &packet)
        );

        let packet = ViscaPacket::new_zoom([0u8; 16], 3, ZoomDirection::Wide)?;
        assert_eq!(
            DispatchOutcome::Applied(CommandKind::Zoom),
            dispatch(&mut sink, &packet)
        );

        assert_eq!(vec![Event::RecallPosition(2), Event::ZoomSpeed(3)], sink.events);
        Ok(())
    }

    #[test]
    fn decode_and_dispatch() -> Result<()> {
        let _ = tracing_subscriber::fmt().try_init();
        let mut data = Cursor::new(hex::decode("8101060101010102ff")?);
        let packet = ViscaPacket::decode([0u8; 16], &mut data)?;
        assert_eq!(1, packet.receiver_addr);
        assert_eq!(0, packet.sender_addr);
        assert_eq!(hex::decode("01060101010102")?, packet.body());

        let mut sink = RecordingSink::default();
        assert_eq!(
            DispatchOutcome::Applied(CommandKind::PanTilt),
            dispatch(&mut sink, &packet)
        );
        assert_eq!(
            vec![Event::PanSpeed(1.3), Event::TiltSpeed(-1.3), Event::Drive],
            sink.events
        );
        Ok(())
    }
}
