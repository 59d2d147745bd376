use crate::{
    channel::ViscaChannel,
    protocol::{
        command::MAX_ZOOM_SPEED, Command, MemoryAction, PanDirection, TiltDirection,
        ViscaPacket, ZoomDirection,
    },
    Result,
};
use tokio::io::AsyncWrite;

/// Capacity of the controller's packet buffer.
const BUFFER_SIZE: usize = 16;

/// A memory action requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequest {
    pub action: MemoryAction,
    pub position_index: u8,
}

/// One snapshot of the operator's controls.
///
/// Speeds have already been mapped into the ranges each command accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInput {
    pub pan_speed: u8,
    pub pan_direction: PanDirection,
    pub tilt_speed: u8,
    pub tilt_direction: TiltDirection,
    pub zoom_speed: u8,
    pub zoom_direction: ZoomDirection,
    /// Pending memory action, which is cleared once it has been sent.
    pub memory: Option<MemoryRequest>,
}

impl Default for ControlInput {
    fn default() -> Self {
        Self {
            pan_speed: 1,
            pan_direction: PanDirection::None,
            tilt_speed: 1,
            tilt_direction: TiltDirection::None,
            zoom_speed: 1,
            zoom_direction: ZoomDirection::None,
            memory: None,
        }
    }
}

/// [CameraController] sends commands to a camera.
///
/// Every packet is built in the same buffer, so commands are sent one at a
/// time.
pub struct CameraController<W> {
    channel: ViscaChannel<W>,
    buffer: [u8; BUFFER_SIZE],
}

impl<W: AsyncWrite + Unpin> CameraController<W> {
    pub const BUFFER_SIZE: usize = BUFFER_SIZE;

    pub fn new(channel: ViscaChannel<W>) -> Self {
        Self {
            channel,
            buffer: [0; BUFFER_SIZE],
        }
    }

    /// Builds a packet for `command`, and sends it to the camera.
    pub async fn send(&mut self, command: &Command) -> Result {
        let mut packet = ViscaPacket::new_command(&mut self.buffer[..], command)?;
        self.channel.send(&mut packet).await
    }

    pub async fn pan_tilt_drive(
        &mut self,
        pan_speed: u8,
        pan_direction: PanDirection,
        tilt_speed: u8,
        tilt_direction: TiltDirection,
    ) -> Result {
        self.send(&Command::PanTiltDrive {
            pan_speed,
            tilt_speed,
            pan_direction,
            tilt_direction,
        })
        .await
    }

    pub async fn zoom(&mut self, speed: u8, direction: ZoomDirection) -> Result {
        self.send(&Command::Zoom { speed, direction }).await
    }

    pub async fn stop_zoom(&mut self) -> Result {
        self.send(&Command::ZoomStop).await
    }

    /// Moves the camera to a stored position.
    pub async fn recall_position(&mut self, position_index: u8) -> Result {
        self.memory(MemoryAction::Recall, position_index).await
    }

    /// Stores the camera's current position.
    pub async fn set_position(&mut self, position_index: u8) -> Result {
        self.memory(MemoryAction::Set, position_index).await
    }

    pub async fn reset_position(&mut self, position_index: u8) -> Result {
        self.memory(MemoryAction::Reset, position_index).await
    }

    async fn memory(&mut self, action: MemoryAction, position_index: u8) -> Result {
        self.send(&Command::Memory {
            action,
            position_index,
        })
        .await
    }

    /// Sends the commands for one snapshot of the controls.
    ///
    /// This sends, in order:
    ///
    /// 1. the pending [memory request][ControlInput::memory], if any. It is
    ///    cleared once sent.
    /// 2. a zoom command. The speed is clamped to `1..=7` in every direction,
    ///    as cameras reject zoom speeds outside that range. When zoom is
    ///    centred the command has no direction, which cameras treat as a stop.
    /// 3. a pan-tilt drive command.
    pub async fn send_control(&mut self, input: &mut ControlInput) -> Result {
        if let Some(request) = input.memory {
            match request.action {
                MemoryAction::None => (),
                action => self.memory(action, request.position_index).await?,
            }
            input.memory = None;
        }

        let zoom_speed = input.zoom_speed.clamp(1, MAX_ZOOM_SPEED);
        self.zoom(zoom_speed, input.zoom_direction).await?;

        self.pan_tilt_drive(
            input.pan_speed,
            input.pan_direction,
            input.tilt_speed,
            input.tilt_direction,
        )
        .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        protocol::{dispatch, CommandKind, DispatchOutcome, Error as ProtocolError},
        CameraState, Error,
    };
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    async fn read_wire(stream: &mut DuplexStream, len: usize) -> Result<Vec<u8>> {
        let mut b = vec![0; len];
        stream.read_exact(&mut b).await?;
        Ok(b)
    }

    #[tokio::test]
    async fn send_control() -> Result {
        let (a, mut b) = duplex(64);
        let mut controller = CameraController::new(ViscaChannel::new(a));

        let mut input = ControlInput {
            pan_speed: 5,
            pan_direction: PanDirection::Left,
            memory: Some(MemoryRequest {
                action: MemoryAction::Recall,
                position_index: 2,
            }),
            ..Default::default()
        };
        controller.send_control(&mut input).await?;
        assert_eq!(None, input.memory);

        let expected = hex::decode(concat!(
            "8101043f0202ff",
            "8101040701ff",
            "8101060105010103ff"
        ))?;
        assert_eq!(expected, read_wire(&mut b, expected.len()).await?);

        // The memory request was only sent once.
        input.zoom_direction = ZoomDirection::Tele;
        input.zoom_speed = 6;
        controller.send_control(&mut input).await?;
        let expected = hex::decode("8101040726ff8101060105010103ff")?;
        assert_eq!(expected, read_wire(&mut b, expected.len()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn neutral_zoom_stops_camera() -> Result {
        let (a, mut b) = duplex(64);
        let mut controller = CameraController::new(ViscaChannel::new(a));
        let mut input = ControlInput {
            zoom_speed: 0,
            ..Default::default()
        };
        controller.send_control(&mut input).await?;

        let mut camera = ViscaChannel::new(&mut b);
        let mut state = CameraState::default();
        let zoom = camera.recv([0u8; 16]).await?;
        assert_eq!(
            DispatchOutcome::Applied(CommandKind::Zoom),
            dispatch(&mut state, &zoom)
        );
        assert_eq!(0, state.zoom_speed);
        Ok(())
    }

    #[tokio::test]
    async fn zoom_speed_clamped() -> Result {
        let (a, mut b) = duplex(64);
        let mut controller = CameraController::new(ViscaChannel::new(a));
        let mut camera = ViscaChannel::new(&mut b);
        let mut state = CameraState::default();

        for (zoom_speed, expected_body, expected_speed) in [
            (0, "01040721", -1),
            (9, "01040727", -7),
            (u8::MAX, "01040727", -7),
        ] {
            let mut input = ControlInput {
                zoom_speed,
                zoom_direction: ZoomDirection::Tele,
                ..Default::default()
            };
            controller.send_control(&mut input).await?;

            let zoom = camera.recv([0u8; 16]).await?;
            assert_eq!(hex::decode(expected_body)?, zoom.body());
            assert_eq!(
                DispatchOutcome::Applied(CommandKind::Zoom),
                dispatch(&mut state, &zoom)
            );
            assert_eq!(expected_speed, state.zoom_speed);

            let pan_tilt = camera.recv([0u8; 16]).await?;
            assert_eq!(
                DispatchOutcome::Applied(CommandKind::PanTilt),
                dispatch(&mut state, &pan_tilt)
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn memory_commands() -> Result {
        let (a, mut b) = duplex(64);
        let mut controller = CameraController::new(ViscaChannel::new(a));

        controller.set_position(1).await?;
        controller.reset_position(0).await?;
        controller.stop_zoom().await?;
        let expected = hex::decode("8101043f0101ff8101043f0000ff8101040700ff")?;
        assert_eq!(expected, read_wire(&mut b, expected.len()).await?);

        // Invalid commands are rejected before anything is sent.
        assert!(matches!(
            controller.recall_position(6).await,
            Err(Error::Protocol(ProtocolError::ParameterOutOfRange))
        ));
        assert!(matches!(
            controller
                .pan_tilt_drive(25, PanDirection::Left, 1, TiltDirection::Up)
                .await,
            Err(Error::Protocol(ProtocolError::ParameterOutOfRange))
        ));

        controller.recall_position(5).await?;
        let expected = hex::decode("8101043f0205ff")?;
        assert_eq!(expected, read_wire(&mut b, expected.len()).await?);
        Ok(())
    }
}
