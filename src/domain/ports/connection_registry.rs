use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

use crate::domain::entities::TenantId;
use crate::domain::events::ChatEvent;

/// Process-unique handle of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broadcast target. Both variants embed the tenant, so a scope can only
/// ever address connections of a single tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelScope {
    /// Everyone listening to one end-user session.
    Session { tenant_id: TenantId, session_id: String },
    /// Every agent connected for the tenant.
    Agents { tenant_id: TenantId },
}

impl ChannelScope {
    pub fn session(tenant_id: TenantId, session_id: impl Into<String>) -> Self {
        ChannelScope::Session {
            tenant_id,
            session_id: session_id.into(),
        }
    }

    pub fn agents(tenant_id: TenantId) -> Self {
        ChannelScope::Agents { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            ChannelScope::Session { tenant_id, .. } | ChannelScope::Agents { tenant_id } => {
                *tenant_id
            }
        }
    }
}

impl fmt::Display for ChannelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelScope::Session {
                tenant_id,
                session_id,
            } => write!(f, "{}:session:{}", tenant_id.namespace(), session_id),
            ChannelScope::Agents { tenant_id } => write!(f, "{}:agents", tenant_id.namespace()),
        }
    }
}

/// Lookup table from channel scopes to live connections.
///
/// The in-process implementation is rebuilt empty on restart and is not
/// shared between server instances; a shared backplane can implement this
/// trait without touching callers.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Subscribe a connection to a scope.
    async fn register(
        &self,
        scope: ChannelScope,
        connection_id: ConnectionId,
        sender: Sender<ChatEvent>,
    );

    /// Drop a connection from every scope it joined.
    async fn remove(&self, connection_id: ConnectionId);

    /// Connections currently subscribed to a scope.
    async fn lookup(&self, scope: &ChannelScope) -> Vec<ConnectionId>;

    /// Deliver an event to every subscriber of a scope, in subscription
    /// order. Returns how many connections accepted it.
    async fn broadcast(&self, scope: &ChannelScope, event: ChatEvent) -> usize;
}
