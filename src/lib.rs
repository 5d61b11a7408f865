//! Rendezvous and relay broker for peer devices that cannot accept inbound
//! connections directly.
//!
//! Peers open persistent TCP sessions to the broker (see [`session`]). The
//! broker maintains a [`directory::Directory`] of peers and the services
//! they expose, delivers discovery notifications as peers come and go, and
//! on demand splices two peer-originated sessions into one bidirectional
//! byte pipe (see [`splice`]).
//!
//! ```no_run
//! use rendezvous_broker::{Broker, BrokerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let broker = Broker::bind(BrokerConfig::new()).await?;
//!     broker.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod connid;
mod directory;
mod error;
mod framer;
mod halfopen;
mod listener;
mod session;
mod splice;
mod stats;

pub use config::BrokerConfig;
pub use error::SessionError;
pub use listener::Broker;
