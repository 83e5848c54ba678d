//! PeerLink Core
//!
//! Discovery bookkeeping, the per-peer session state machine and text
//! messaging for ad-hoc local peer-to-peer sessions. The radio/network link
//! itself is supplied by an implementation of [`Transport`]; this crate decides
//! when to invite, accept, disconnect and what bytes to send.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod codec;
pub mod config;
pub mod device;
pub mod errors;
pub mod identity;
pub mod notifier;
pub mod registry;
pub mod session;
pub mod stats;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use codec::{decode, encode, Message, MAX_MESSAGE_SIZE};
pub use config::{SessionConfig, DEFAULT_CONNECT_TIMEOUT};
pub use device::{ConnectionState, Device};
pub use errors::{CodecError, PeerLinkError, PeerLinkResult, TransportError};
pub use identity::{EphemeralIdentity, IdentityProvider, StaticIdentity};
pub use notifier::{EventNotifier, EventSubscription, PeerEvent};
pub use registry::DeviceRegistry;
pub use session::{ConnectOutcome, SessionManager};
pub use stats::{SessionStats, SessionStatsSnapshot};
pub use transport::{
    transport_event_channel, LinkState, Transport, TransportEvent, TransportEventReceiver,
    TransportEventSender,
};
pub use types::{InvitationContext, PeerId, PeerIdentity, SessionHandle};
