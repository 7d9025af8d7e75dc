// lavascope-api: Async Rust client for the Vultr v2 firewall API

pub mod client;
pub mod error;
pub mod public_ip;
pub mod transport;
pub mod types;

pub use client::VultrClient;
pub use error::Error;
pub use public_ip::{EndpointFailure, ResolvedAddress};
pub use transport::TransportConfig;
