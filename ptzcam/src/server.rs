use crate::{
    channel::ViscaChannel,
    protocol::{dispatch, DispatchOutcome, Error as ProtocolError, ViscaPacket},
    state::{BusyFlag, CameraState, StateUpdate},
    Error, Result,
};
use concread::cowcell::asynch::{CowCell, CowCellReadTxn};
use futures::{pin_mut, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::AsyncRead,
    sync::{
        broadcast::{self, Receiver},
        mpsc::{self, error::TryRecvError},
    },
    task::JoinHandle,
    time::interval,
};
use tokio_stream::wrappers::IntervalStream;

/// Storage for a single received packet.
type PacketStorage = [u8; CameraServer::PACKET_BUFFER_SIZE];

/// Result of [`CameraServer::process_incoming_packet()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The camera is busy; no packet was taken from the queue.
    Busy,
    /// No packets were waiting.
    Idle,
    /// A packet was taken from the queue and dispatched.
    Dispatched(DispatchOutcome),
}

#[allow(rustdoc::private_intra_doc_links)]
/// [CameraServer] is the camera end of a VISCA link: it receives packets
/// from a controller, and applies them to a [CameraState].
///
/// ## General design
///
/// * `recv_task`: [receive_packets] reads packets from the stream, and queues
///   them. The queue holds up to [QUEUE_DEPTH][Self::QUEUE_DEPTH] packets;
///   when it is full, the task stops reading from the stream until there is
///   space.
///
/// * [`process_incoming_packet()`][Self::process_incoming_packet] takes one
///   packet from the queue (unless the camera is [busy][BusyFlag]), applies it
///   to the state, and broadcasts the changes to
///   [subscribers][Self::state_update_events].
///
/// * [`run()`][Self::run] processes packets every
///   [POLL_INTERVAL][Self::POLL_INTERVAL].
///
/// The camera becomes busy when it recalls a memory position. Whatever
/// actuates the camera is expected to [clear][BusyFlag::clear] the flag once
/// it has arrived; until then, incoming packets wait in the queue.
pub struct CameraServer {
    packet_rx: mpsc::Receiver<ViscaPacket<PacketStorage>>,
    recv_task: Option<JoinHandle<Result>>,

    busy: BusyFlag,
    state: Arc<CowCell<CameraState>>,
    state_tx: broadcast::Sender<(CowCellReadTxn<CameraState>, StateUpdate)>,
    state_rx: Receiver<(CowCellReadTxn<CameraState>, StateUpdate)>,
}

impl CameraServer {
    /// Maximum number of received packets waiting to be processed.
    pub const QUEUE_DEPTH: usize = 2;
    /// Capacity of each received packet, including header and terminator.
    pub const PACKET_BUFFER_SIZE: usize = 16;
    /// Delay between polls of the packet queue in [`run()`][Self::run].
    pub const POLL_INTERVAL: Duration = Duration::from_millis(10);
    const STATE_CHANNEL_SIZE: usize = 16;

    /// Starts receiving packets from `reader`.
    ///
    /// This must be called from within a tokio runtime.
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (packet_tx, packet_rx) = mpsc::channel(Self::QUEUE_DEPTH);
        let (state_tx, state_rx) = broadcast::channel(Self::STATE_CHANNEL_SIZE);
        let state = CameraState::default();
        let busy = state.busy_flag();

        debug!("Spawning receiver task...");
        let recv_task = tokio::task::spawn(receive_packets(ViscaChannel::new(reader), packet_tx));

        Self {
            packet_rx,
            recv_task: Some(recv_task),
            busy,
            state: Arc::new(CowCell::new(state)),
            state_tx,
            state_rx,
        }
    }

    /// Processes at most one queued packet.
    ///
    /// ## Errors
    ///
    /// * [`Error::Disconnected`] when the stream has closed, and every packet
    ///   received from it has been processed.
    pub async fn process_incoming_packet(&mut self) -> Result<PollOutcome> {
        if self.busy.is_set() {
            return Ok(PollOutcome::Busy);
        }

        let packet = match self.packet_rx.try_recv() {
            Ok(packet) => packet,
            Err(TryRecvError::Empty) => return Ok(PollOutcome::Idle),
            Err(TryRecvError::Disconnected) => return Err(Error::Disconnected),
        };

        let mut w = self.state.write().await;
        let outcome = dispatch(&mut *w, &packet);
        let updated_fields = w.take_updates();
        if !updated_fields.is_empty() {
            w.commit().await;

            // It doesn't matter whether this actually succeeds
            let _ = self
                .state_tx
                .send((self.state.read().await, updated_fields));
        }

        Ok(PollOutcome::Dispatched(outcome))
    }

    /// Processes packets until the stream closes.
    ///
    /// Returns the receiver task's error if it stopped for any reason other
    /// than the stream closing.
    pub async fn run(&mut self) -> Result {
        let ticks = IntervalStream::new(interval(Self::POLL_INTERVAL));
        pin_mut!(ticks);

        while ticks.next().await.is_some() {
            loop {
                match self.process_incoming_packet().await {
                    Ok(PollOutcome::Dispatched(_)) => continue,
                    Ok(PollOutcome::Busy | PollOutcome::Idle) => break,
                    Err(Error::Disconnected) => {
                        info!("camera link closed");
                        return self.join_receiver().await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(())
    }

    async fn join_receiver(&mut self) -> Result {
        let Some(recv_task) = self.recv_task.take() else {
            return Ok(());
        };

        match recv_task.await {
            Err(join_error) => {
                error!("recv_task failed: {join_error}");
                Err(Error::Internal)
            }
            Ok(Err(e)) => {
                error!("recv_task reported error: {e:?}");
                Err(e)
            }
            Ok(Ok(())) => Ok(()),
        }
    }

    pub async fn get_state(&self) -> impl std::ops::Deref<Target = CameraState> {
        self.state.read().await
    }

    pub fn state_update_events(&self) -> Receiver<(CowCellReadTxn<CameraState>, StateUpdate)> {
        self.state_rx.resubscribe()
    }

    /// Gets a handle to the camera's busy flag.
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }
}

impl Drop for CameraServer {
    fn drop(&mut self) {
        if let Some(recv_task) = self.recv_task.take() {
            recv_task.abort();
        }
    }
}

/// Reads packets from `channel`, and forwards them to `tx`.
///
/// Oversized packets are dropped. Returns when the stream closes, or the
/// [CameraServer] is dropped.
async fn receive_packets<R>(
    mut channel: ViscaChannel<R>,
    tx: mpsc::Sender<ViscaPacket<PacketStorage>>,
) -> Result
where
    R: AsyncRead + Unpin,
{
    loop {
        let packet = match channel.recv([0u8; CameraServer::PACKET_BUFFER_SIZE]).await {
            Ok(packet) => packet,
            Err(Error::Protocol(ProtocolError::BufferTooSmall)) => continue,
            Err(Error::Protocol(ProtocolError::StreamClosed)) => {
                debug!("stream closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if tx.send(packet).await.is_err() {
            debug!("packet queue closed");
            return Ok(());
        }
    }
}
