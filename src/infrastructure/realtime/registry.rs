use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc::Sender, Mutex};

use crate::domain::events::ChatEvent;
use crate::domain::ports::connection_registry::{ChannelScope, ConnectionId, ConnectionRegistry};

/// How long a broadcast waits on a full connection queue before skipping it.
const SLOW_CONSUMER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RegistryState {
    // Vec keeps subscription order stable for deterministic fan-out
    scopes: HashMap<ChannelScope, Vec<(ConnectionId, Sender<ChatEvent>)>>,
    memberships: HashMap<ConnectionId, HashSet<ChannelScope>>,
}

impl RegistryState {
    fn detach(&mut self, connection_id: ConnectionId) {
        let Some(scopes) = self.memberships.remove(&connection_id) else {
            return;
        };

        for scope in scopes {
            if let Some(subscribers) = self.scopes.get_mut(&scope) {
                subscribers.retain(|(id, _)| *id != connection_id);
                if subscribers.is_empty() {
                    self.scopes.remove(&scope);
                }
            }
        }
    }
}

/// Single-process registry. Rebuilt empty on restart, never shared
/// between instances.
pub struct InMemoryConnectionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Number of distinct live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.memberships.len()
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(
        &self,
        scope: ChannelScope,
        connection_id: ConnectionId,
        sender: Sender<ChatEvent>,
    ) {
        let mut state = self.state.lock().await;

        let subscribers = state.scopes.entry(scope.clone()).or_default();
        match subscribers.iter_mut().find(|(id, _)| *id == connection_id) {
            Some(entry) => entry.1 = sender,
            None => subscribers.push((connection_id, sender)),
        }

        state
            .memberships
            .entry(connection_id)
            .or_default()
            .insert(scope.clone());

        tracing::debug!("Connection {} joined {}", connection_id, scope);
    }

    async fn remove(&self, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;
        state.detach(connection_id);
        tracing::debug!("Connection {} removed from registry", connection_id);
    }

    async fn lookup(&self, scope: &ChannelScope) -> Vec<ConnectionId> {
        let state = self.state.lock().await;
        state
            .scopes
            .get(scope)
            .map(|subscribers| subscribers.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }

    async fn broadcast(&self, scope: &ChannelScope, event: ChatEvent) -> usize {
        // Never await a connection queue while holding the registry lock
        let targets: Vec<(ConnectionId, Sender<ChatEvent>)> = {
            let state = self.state.lock().await;
            state.scopes.get(scope).cloned().unwrap_or_default()
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        for (connection_id, sender) in targets {
            match tokio::time::timeout(SLOW_CONSUMER_TIMEOUT, sender.send(event.clone())).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(_)) => closed.push(connection_id),
                Err(_) => tracing::warn!(
                    "Dropped {} for slow connection {} on {}",
                    event.name(),
                    connection_id,
                    scope
                ),
            }
        }

        if !closed.is_empty() {
            let mut state = self.state.lock().await;
            for connection_id in closed {
                state.detach(connection_id);
            }
        }

        tracing::trace!("Broadcast {} to {} connection(s) on {}", event.name(), delivered, scope);
        delivered
    }
}
