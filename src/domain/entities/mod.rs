pub mod agent;
pub mod conversation;
pub mod message;
pub mod tenant;
pub mod tenant_config;

pub use agent::*;
pub use conversation::*;
pub use message::*;
pub use tenant::*;
pub use tenant_config::*;
