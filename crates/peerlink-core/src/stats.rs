//! Session statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters updated by the session manager
#[derive(Debug, Default)]
pub struct SessionStats {
    invitations_sent: AtomicU64,
    invitations_accepted: AtomicU64,
    invitations_declined: AtomicU64,
    connect_timeouts: AtomicU64,
    connect_failures: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    decode_failures: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatsSnapshot {
    pub invitations_sent: u64,
    pub invitations_accepted: u64,
    pub invitations_declined: u64,
    pub connect_timeouts: u64,
    pub connect_failures: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub decode_failures: u64,
}

macro_rules! counter {
    ($name:ident, $field:ident) => {
        pub(crate) fn $name(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl SessionStats {
    counter!(record_invitation_sent, invitations_sent);
    counter!(record_invitation_accepted, invitations_accepted);
    counter!(record_invitation_declined, invitations_declined);
    counter!(record_connect_timeout, connect_timeouts);
    counter!(record_connect_failure, connect_failures);
    counter!(record_message_sent, messages_sent);
    counter!(record_message_received, messages_received);
    counter!(record_decode_failure, decode_failures);

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            invitations_sent: self.invitations_sent.load(Ordering::Relaxed),
            invitations_accepted: self.invitations_accepted.load(Ordering::Relaxed),
            invitations_declined: self.invitations_declined.load(Ordering::Relaxed),
            connect_timeouts: self.connect_timeouts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}
