use clap::{Parser, Subcommand};
use ptzcam::{
    protocol::{MemoryAction, PanDirection, TiltDirection, ZoomDirection},
    CameraController, CameraServer, ControlInput, MemoryRequest, Result, StateUpdate,
    ViscaChannel,
};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncRead, BufReader},
    net::TcpListener,
    sync::broadcast::error::RecvError,
};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// Simulated VISCA camera, and a one-shot controller to drive it.
#[derive(Debug, Parser)]
#[clap(verbatim_doc_comment)]
struct CliParser {
    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Runs a simulated camera, logging every change to its state.
    Serve {
        /// Address to listen on.
        #[clap(short, long, default_value = "127.0.0.1:5678")]
        listen: SocketAddr,

        /// Listen on a serial port (eg: `/dev/ttyUSB0`) instead of TCP.
        #[clap(long, conflicts_with = "listen")]
        serial: Option<String>,

        /// Serial port speed.
        #[clap(long, default_value_t = 9600)]
        baud_rate: u32,

        /// How long it takes to move to a recalled position, in milliseconds.
        #[clap(long, default_value_t = 500)]
        recall_ms: u64,
    },

    /// Sends one snapshot of control inputs to a camera.
    Send {
        /// Address of the camera.
        #[clap(short, long, default_value = "127.0.0.1:5678")]
        camera: SocketAddr,

        /// Send to a camera on a serial port (eg: `/dev/ttyUSB0`) instead of
        /// TCP.
        #[clap(long, conflicts_with = "camera")]
        serial: Option<String>,

        /// Serial port speed.
        #[clap(long, default_value_t = 9600)]
        baud_rate: u32,

        #[clap(long, default_value_t = 1)]
        pan_speed: u8,
        #[clap(long, value_enum, default_value_t = PanDirection::None)]
        pan_direction: PanDirection,

        #[clap(long, default_value_t = 1)]
        tilt_speed: u8,
        #[clap(long, value_enum, default_value_t = TiltDirection::None)]
        tilt_direction: TiltDirection,

        #[clap(long, default_value_t = 1)]
        zoom_speed: u8,
        #[clap(long, value_enum, default_value_t = ZoomDirection::None)]
        zoom_direction: ZoomDirection,

        /// Recall a memory position before moving.
        #[clap(long, conflicts_with = "store")]
        recall: Option<u8>,

        /// Store the current position in memory before moving.
        #[clap(long)]
        store: Option<u8>,
    },
}

async fn serve(listen: SocketAddr, recall_time: Duration) -> Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!("Simulated camera listening on {listen}");

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Controller connected from {peer}");
        let (reader, _writer) = stream.into_split();
        serve_camera(reader, recall_time).await;
        info!("Controller {peer} disconnected");
    }
}

async fn serve_serial(path: &str, baud_rate: u32, recall_time: Duration) -> Result<()> {
    let port = ViscaChannel::open_serial(path, baud_rate)?.take_inner()?;
    serve_camera(port, recall_time).await;
    info!("Serial port {path} closed");
    Ok(())
}

/// Runs a simulated camera until `reader` is closed.
async fn serve_camera<R>(reader: R, recall_time: Duration)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut server = CameraServer::new(BufReader::new(reader));

    let mut events = server.state_update_events();
    let busy = server.busy_flag();
    let watcher = tokio::task::spawn(async move {
        loop {
            let (state, update) = match events.recv().await {
                Ok(e) => e,
                Err(RecvError::Lagged(n)) => {
                    warn!("missed {n} state updates");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if update.contains(StateUpdate::PAN_TILT_SPEED) {
                info!(
                    "Pan {:+.1} deg/s, tilt {:+.1} deg/s",
                    state.pan_speed, state.tilt_speed
                );
            }

            if update.contains(StateUpdate::ZOOM_SPEED) {
                info!("Zoom speed: {:+}", state.zoom_speed);
            }

            if update.contains(StateUpdate::MEMORY_SET) {
                info!("Stored memory position");
            }

            if update.contains(StateUpdate::MEMORY_RESET) {
                info!("Reset memory positions");
            }

            if update.contains(StateUpdate::MEMORY_RECALL) {
                info!(
                    "Recalling memory position {:?}...",
                    state.recalled_position()
                );
                tokio::time::sleep(recall_time).await;
                busy.clear();
                info!("Recall complete");
            }
        }
    });

    if let Err(e) = server.run().await {
        warn!("camera server stopped: {e}");
    }
    watcher.abort();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .compact()
        .init();
    let opts = CliParser::parse();

    match opts.mode {
        Mode::Serve {
            listen,
            serial,
            baud_rate,
            recall_ms,
        } => {
            let recall_time = Duration::from_millis(recall_ms);
            match serial {
                Some(path) => serve_serial(&path, baud_rate, recall_time).await,
                None => serve(listen, recall_time).await,
            }
        }

        Mode::Send {
            camera,
            serial,
            baud_rate,
            pan_speed,
            pan_direction,
            tilt_speed,
            tilt_direction,
            zoom_speed,
            zoom_direction,
            recall,
            store,
        } => {
            let memory = match (recall, store) {
                (Some(position_index), _) => Some(MemoryRequest {
                    action: MemoryAction::Recall,
                    position_index,
                }),
                (None, Some(position_index)) => Some(MemoryRequest {
                    action: MemoryAction::Set,
                    position_index,
                }),
                (None, None) => None,
            };

            let mut input = ControlInput {
                pan_speed,
                pan_direction,
                tilt_speed,
                tilt_direction,
                zoom_speed,
                zoom_direction,
                memory,
            };

            match serial {
                Some(path) => {
                    let mut controller =
                        CameraController::new(ViscaChannel::open_serial(&path, baud_rate)?);
                    controller.send_control(&mut input).await?;
                }
                None => {
                    let mut controller =
                        CameraController::new(ViscaChannel::connect(camera).await?);
                    controller.send_control(&mut input).await?;
                }
            }
            info!("Sent {input:?}");
            Ok(())
        }
    }
}
