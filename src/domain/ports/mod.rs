pub mod agent_repository;
pub mod connection_registry;
pub mod conversation_repository;
pub mod message_repository;
pub mod tenant_repository;
