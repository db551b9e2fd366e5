//! Real-time edge of the relay: tenant-scoped WebSocket gateway, the wire
//! protocol, per-connection handling and the process-local registry.

pub mod gateway;
pub mod handler;
pub mod protocol;
pub mod registry;

pub use gateway::{admit, chat_socket};
pub use handler::ConnectionHandler;
pub use protocol::ClientEvent;
pub use registry::InMemoryConnectionRegistry;
