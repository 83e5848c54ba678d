//! Transport event pump
//!
//! A single task drains the transport's event channel and feeds each event to
//! the session manager in arrival order. Stopping the pump hands the receiver
//! back so the node can be restarted.

use std::sync::Arc;

use peerlink_core::{SessionManager, TransportEvent, TransportEventReceiver};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub(crate) struct EventPump {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<TransportEventReceiver>,
}

impl EventPump {
    pub(crate) fn spawn(sessions: Arc<SessionManager>, receiver: TransportEventReceiver) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(sessions, receiver, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Stop the pump and recover the event receiver. `None` if the task
    /// panicked, in which case the receiver is gone with it.
    pub(crate) async fn stop(self) -> Option<TransportEventReceiver> {
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(receiver) => Some(receiver),
            Err(e) => {
                error!("Transport event pump failed: {}", e);
                None
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub(crate) fn abort(&self) {
        self.handle.abort();
    }
}

async fn run(
    sessions: Arc<SessionManager>,
    mut receiver: TransportEventReceiver,
    mut shutdown: oneshot::Receiver<()>,
) -> TransportEventReceiver {
    info!("Transport event pump starting");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Transport event pump shutdown requested");
                break;
            }
            event = receiver.recv() => match event {
                Some(event) => apply(&sessions, event),
                None => {
                    debug!("Transport event channel closed");
                    break;
                }
            }
        }
    }

    info!("Transport event pump stopped");
    receiver
}

/// Route one transport event to the session manager
pub(crate) fn apply(sessions: &Arc<SessionManager>, event: TransportEvent) {
    match event {
        TransportEvent::PeerFound(identity) => {
            let outcome = sessions.on_peer_found(&identity);
            debug!("Discovery of {} -> {:?}", identity, outcome);
        }
        TransportEvent::PeerLost(identity) => sessions.on_peer_lost(&identity),
        TransportEvent::InvitationReceived { from, invitation } => {
            sessions.accept_invitation(&from, invitation);
        }
        TransportEvent::SessionStateChanged { peer, state } => {
            sessions.on_transport_state_changed(&peer, &state);
        }
        TransportEvent::DataReceived { from, payload } => {
            sessions.on_data_received(&from, &payload);
        }
    }
}
