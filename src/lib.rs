pub mod cli;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod parse;
pub mod reconcile;
pub mod render;
pub mod resp;
pub mod tunnel;
pub mod types;
pub mod version;

// Re-export common types
pub use collector::{Collector, CollectorSettings, NodeSnapshot, QueryResult};
pub use config::InspectConfig;
pub use error::{InspectError, QueryError, TunnelError};
pub use inventory::Inventory;
pub use reconcile::{reconcile, Topology};
pub use tunnel::{Forwarder, TcpForwarder, Tunnel, TunnelLog, TunnelSettings};
pub use version::VersionInfo;
