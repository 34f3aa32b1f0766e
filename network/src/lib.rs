//! Publish/subscribe relay for the miner tracker.
//!
//! One [`Router`] is shared by an in-process broker ([`EmbeddedBroker`]) and
//! a network-facing WebSocket broker ([`WsBroker`]). Both admit subscribers
//! only after the [`AuthGate`] accepts their signed challenge. Outbound
//! subscriptions to peer relays are kept alive by the [`PeerLinkManager`].
//!
//! The HTTP clients for a peer's sync endpoints ([`MinerLogSource`]) and for
//! the chain account service ([`ChainAccounts`]) live here too.

pub mod auth;
pub mod chain;
pub mod embedded;
pub mod error;
pub mod message;
pub mod peer_link;
pub mod remote;
pub mod router;
pub mod ws_broker;
pub mod ws_client;

pub use auth::AuthGate;
pub use chain::{ChainAccounts, EosAccountClient};
pub use embedded::{EmbeddedBroker, EmbeddedClient};
pub use error::NetworkError;
pub use message::{Handshake, HandshakeReply, Message, MessageKind};
pub use peer_link::{PeerHandler, PeerLinkManager};
pub use remote::{HttpSyncClient, MinerLogSource};
pub use router::{Router, SubscriberId, Subscription};
pub use ws_broker::{WsBroker, WsBrokerConfig};
pub use ws_client::{RunExit, WsClient, WsClientConfig};

/// Fire-and-forget publication on a topic.
pub trait Publisher {
    /// Returns `false` when the message could not be queued.
    fn publish(&self, topic: &str, content: Vec<u8>) -> bool;
}
