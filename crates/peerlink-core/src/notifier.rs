//! Event fan-out to application observers
//!
//! Every subscriber owns an unbounded channel, so publishing never blocks the
//! session manager and each subscriber sees events in publish order.

use std::sync::{Arc, Mutex};

use smallvec::SmallVec;
use tokio::sync::mpsc;
use tracing::trace;

use crate::codec::Message;
use crate::device::{ConnectionState, Device};

/// Notifications delivered to subscribers
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A device's connection state was (re)reported
    DeviceStateChanged {
        device: Arc<Device>,
        /// State at the moment of the change
        state: ConnectionState,
    },
    /// A message from a peer was decoded
    MessageReceived {
        message: Message,
        from: Arc<Device>,
    },
}

impl PeerEvent {
    pub fn device(&self) -> &Arc<Device> {
        match self {
            PeerEvent::DeviceStateChanged { device, .. } => device,
            PeerEvent::MessageReceived { from, .. } => from,
        }
    }
}

/// Receiving side of a subscription
#[derive(Debug)]
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<PeerEvent>,
}

impl EventSubscription {
    /// Wait for the next event; `None` once the notifier is gone
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.receiver.recv().await
    }

    /// Take an already-queued event without waiting
    pub fn try_recv(&mut self) -> Option<PeerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything queued so far
    pub fn drain(&mut self) -> Vec<PeerEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[derive(Debug, Default)]
pub struct EventNotifier {
    subscribers: Mutex<SmallVec<[mpsc::UnboundedSender<PeerEvent>; 4]>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sender);
        EventSubscription { receiver }
    }

    /// Deliver `event` to every live subscriber, dropping closed ones
    pub fn publish(&self, event: PeerEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
        trace!("Published event to {} subscribers", subscribers.len());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|subscriber| !subscriber.is_closed())
            .count()
    }
}
