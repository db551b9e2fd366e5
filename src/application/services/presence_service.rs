use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::entities::{Conversation, SenderType, TenantId};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::events::ChatEvent;
use crate::domain::ports::connection_registry::{ChannelScope, ConnectionId, ConnectionRegistry};
use crate::domain::ports::conversation_repository::ConversationRepository;

/// Who is typing, and where the signal should go.
#[derive(Debug, Clone)]
pub enum TypingActor {
    User {
        session_id: String,
        conversation_id: Option<i64>,
    },
    Agent {
        agent_id: i64,
        session_id: Option<String>,
        conversation_id: Option<i64>,
    },
}

#[derive(Default)]
struct PresenceState {
    agent_connections: HashMap<(TenantId, i64), HashSet<ConnectionId>>,
    watchers: HashMap<i64, HashSet<ConnectionId>>,
    watching: HashMap<ConnectionId, HashSet<i64>>,
}

/// Ephemeral signals: typing, agent online status and live watching.
/// Nothing here is persisted.
#[derive(Clone)]
pub struct PresenceService {
    conversation_repo: Arc<dyn ConversationRepository>,
    registry: Arc<dyn ConnectionRegistry>,
    state: Arc<Mutex<PresenceState>>,
}

impl PresenceService {
    pub fn new(
        conversation_repo: Arc<dyn ConversationRepository>,
        registry: Arc<dyn ConnectionRegistry>,
    ) -> Self {
        Self {
            conversation_repo,
            registry,
            state: Arc::new(Mutex::new(PresenceState::default())),
        }
    }

    /// Users' typing goes to the tenant's agents, agents' typing goes to
    /// the one session they are talking to.
    pub async fn set_typing(
        &self,
        tenant_id: TenantId,
        actor: TypingActor,
        is_typing: bool,
    ) -> ChatResult<usize> {
        let (scope, event) = match actor {
            TypingActor::User {
                session_id,
                conversation_id,
            } => {
                // Users may only signal on their own session's conversations
                if let Some(id) = conversation_id {
                    let conversation = self.conversation_in_tenant(tenant_id, id).await?;
                    if conversation.session_id != session_id {
                        return Err(ChatError::not_found(format!(
                            "Conversation {} not found",
                            id
                        )));
                    }
                }

                (
                    ChannelScope::agents(tenant_id),
                    ChatEvent::TypingUpdate {
                        conversation_id,
                        session_id,
                        sender_type: SenderType::User,
                        agent_id: None,
                        is_typing,
                    },
                )
            }
            TypingActor::Agent {
                agent_id,
                session_id,
                conversation_id,
            } => {
                let session_id = match conversation_id {
                    Some(id) => self.conversation_in_tenant(tenant_id, id).await?.session_id,
                    None => session_id.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
                        ChatError::validation("conversation_id or session_id is required")
                    })?,
                };

                (
                    ChannelScope::session(tenant_id, session_id.clone()),
                    ChatEvent::TypingUpdate {
                        conversation_id,
                        session_id,
                        sender_type: SenderType::Agent,
                        agent_id: Some(agent_id),
                        is_typing,
                    },
                )
            }
        };

        Ok(self.registry.broadcast(&scope, event).await)
    }

    /// Track an agent connection. The first one announces the agent online.
    pub async fn agent_connected(
        &self,
        tenant_id: TenantId,
        agent_id: i64,
        connection_id: ConnectionId,
    ) -> bool {
        let first = {
            let mut state = self.state.lock().await;
            let connections = state
                .agent_connections
                .entry((tenant_id, agent_id))
                .or_default();
            connections.insert(connection_id);
            connections.len() == 1
        };

        if first {
            tracing::info!("Agent {} online for tenant {}", agent_id, tenant_id);
            self.registry
                .broadcast(
                    &ChannelScope::agents(tenant_id),
                    ChatEvent::AgentStatus {
                        agent_id,
                        online: true,
                    },
                )
                .await;
        }

        first
    }

    /// Forget an agent connection. The last one announces the agent offline.
    pub async fn agent_disconnected(
        &self,
        tenant_id: TenantId,
        agent_id: i64,
        connection_id: ConnectionId,
    ) -> bool {
        let last = {
            let mut state = self.state.lock().await;
            match state.agent_connections.get_mut(&(tenant_id, agent_id)) {
                Some(connections) => {
                    connections.remove(&connection_id);
                    if connections.is_empty() {
                        state.agent_connections.remove(&(tenant_id, agent_id));
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if last {
            tracing::info!("Agent {} offline for tenant {}", agent_id, tenant_id);
            self.registry
                .broadcast(
                    &ChannelScope::agents(tenant_id),
                    ChatEvent::AgentStatus {
                        agent_id,
                        online: false,
                    },
                )
                .await;
        }

        last
    }

    pub async fn online_agents(&self, tenant_id: TenantId) -> Vec<i64> {
        let state = self.state.lock().await;
        let mut agents: Vec<i64> = state
            .agent_connections
            .keys()
            .filter(|(tenant, _)| *tenant == tenant_id)
            .map(|(_, agent_id)| *agent_id)
            .collect();
        agents.sort_unstable();
        agents
    }

    pub async fn watch(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
        connection_id: ConnectionId,
    ) -> ChatResult<()> {
        self.conversation_in_tenant(tenant_id, conversation_id).await?;

        let mut state = self.state.lock().await;
        state
            .watchers
            .entry(conversation_id)
            .or_default()
            .insert(connection_id);
        state
            .watching
            .entry(connection_id)
            .or_default()
            .insert(conversation_id);

        tracing::debug!("Connection {} watching conversation {}", connection_id, conversation_id);
        Ok(())
    }

    pub async fn unwatch(&self, conversation_id: i64, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;
        Self::drop_watch(&mut state, conversation_id, connection_id);
        if let Some(watched) = state.watching.get_mut(&connection_id) {
            watched.remove(&conversation_id);
            if watched.is_empty() {
                state.watching.remove(&connection_id);
            }
        }
    }

    /// True while at least one agent connection has the conversation open.
    pub async fn is_watched(&self, conversation_id: i64) -> bool {
        let state = self.state.lock().await;
        state
            .watchers
            .get(&conversation_id)
            .map(|watchers| !watchers.is_empty())
            .unwrap_or(false)
    }

    /// Drop every watch held by a connection.
    pub async fn clear_connection(&self, connection_id: ConnectionId) {
        let mut state = self.state.lock().await;
        if let Some(watched) = state.watching.remove(&connection_id) {
            for conversation_id in watched {
                Self::drop_watch(&mut state, conversation_id, connection_id);
            }
        }
    }

    fn drop_watch(state: &mut PresenceState, conversation_id: i64, connection_id: ConnectionId) {
        if let Some(watchers) = state.watchers.get_mut(&conversation_id) {
            watchers.remove(&connection_id);
            if watchers.is_empty() {
                state.watchers.remove(&conversation_id);
            }
        }
    }

    async fn conversation_in_tenant(
        &self,
        tenant_id: TenantId,
        conversation_id: i64,
    ) -> ChatResult<Conversation> {
        self.conversation_repo
            .get_conversation(conversation_id)
            .await?
            .filter(|conv| conv.belongs_to(tenant_id))
            .ok_or_else(|| {
                ChatError::not_found(format!("Conversation {} not found", conversation_id))
            })
    }
}
