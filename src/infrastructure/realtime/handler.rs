use chrono::Utc;
use metrics::counter;
use tokio::sync::mpsc::Sender;

use crate::application::services::{
    ensure_can_reply, ChatServices, MessageSender, SendMessage, TypingActor,
};
use crate::domain::entities::{
    Agent, AgentIdentity, AgentProfile, Conversation, Participant, ReaderType, TenantChatConfig,
    TenantId,
};
use crate::domain::errors::{ChatError, ChatResult};
use crate::domain::events::ChatEvent;
use crate::domain::ports::connection_registry::{ChannelScope, ConnectionId};
use crate::infrastructure::realtime::protocol::{
    AgentMessage, ClientEvent, IdentifyAgent, IdentifyUser, MarkRead, TypingSignal, UserMessage,
};
use crate::shared::metrics::EVENT_ERRORS;

/// Who the connection turned out to be after its identify event.
#[derive(Debug, Clone)]
enum Identity {
    User {
        session_id: String,
        participant: Participant,
    },
    Agent(Agent),
}

/// State machine of one client connection, already admitted to a tenant.
///
/// Events are handled strictly in arrival order. Every failure is reported
/// to this connection as an `error` event and never escapes.
pub struct ConnectionHandler {
    connection_id: ConnectionId,
    tenant_id: TenantId,
    config: TenantChatConfig,
    outbound: Sender<ChatEvent>,
    services: ChatServices,
    identity: Option<Identity>,
    typing: Option<TypingActor>,
}

impl ConnectionHandler {
    pub fn new(
        connection_id: ConnectionId,
        config: TenantChatConfig,
        outbound: Sender<ChatEvent>,
        services: ChatServices,
    ) -> Self {
        Self {
            connection_id,
            tenant_id: config.tenant_id,
            config,
            outbound,
            services,
            identity: None,
            typing: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Decode and handle one text frame.
    pub async fn handle_frame(&mut self, frame: &str) {
        match ClientEvent::parse(frame) {
            Ok(event) => self.handle(event).await,
            Err(err) => self.reject("frame", &err).await,
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) {
        let name = event.name();
        if let Err(err) = self.dispatch(event).await {
            self.reject(name, &err).await;
        }
    }

    /// Report a failure to this connection only.
    pub async fn reject(&self, event_name: &str, err: &ChatError) {
        counter!(EVENT_ERRORS, "kind" => err.code()).increment(1);

        match err {
            ChatError::Persistence(_) => tracing::error!(
                "{} failed on connection {}: {}",
                event_name,
                self.connection_id,
                err
            ),
            _ => tracing::warn!(
                "{} rejected on connection {}: {}",
                event_name,
                self.connection_id,
                err
            ),
        }

        self.send(ChatEvent::error(err)).await;
    }

    /// Tear down everything this connection registered.
    pub async fn disconnect(mut self) {
        if let Some(actor) = self.typing.take() {
            if let Err(e) = self
                .services
                .presence
                .set_typing(self.tenant_id, actor, false)
                .await
            {
                tracing::debug!("Could not clear typing on disconnect: {}", e);
            }
        }

        self.services.registry.remove(self.connection_id).await;
        self.services.presence.clear_connection(self.connection_id).await;

        if let Some(Identity::Agent(agent)) = &self.identity {
            self.services
                .presence
                .agent_disconnected(self.tenant_id, agent.id, self.connection_id)
                .await;
        }

        tracing::info!(
            "Connection {} closed for tenant {}",
            self.connection_id,
            self.tenant_id
        );
    }

    async fn dispatch(&mut self, event: ClientEvent) -> ChatResult<()> {
        tracing::debug!("{} on connection {}", event.name(), self.connection_id);

        match event {
            ClientEvent::IdentifyUser(payload) => self.identify_user(payload).await,
            ClientEvent::IdentifyAgent(payload) => self.identify_agent(payload).await,
            ClientEvent::UserMessage(payload) => self.user_message(payload).await,
            ClientEvent::AgentMessage(payload) => self.agent_message(payload).await,
            ClientEvent::MarkRead(payload) => self.mark_read(payload).await,
            ClientEvent::TakeConversation(payload) => {
                let agent = self.agent()?.clone();
                self.services
                    .conversations
                    .take_conversation(self.tenant_id, payload.conversation_id, &agent)
                    .await?;
                Ok(())
            }
            ClientEvent::CloseConversation(payload) => {
                let agent = self.agent()?.clone();
                self.services
                    .conversations
                    .close_conversation(self.tenant_id, payload.conversation_id, &agent)
                    .await?;
                Ok(())
            }
            ClientEvent::Typing(signal) => self.typing(signal, true).await,
            ClientEvent::StoppedTyping(signal) => self.typing(signal, false).await,
            ClientEvent::WatchConversation(payload) => {
                self.agent()?;
                self.services
                    .presence
                    .watch(self.tenant_id, payload.conversation_id, self.connection_id)
                    .await
            }
            ClientEvent::UnwatchConversation(payload) => {
                self.agent()?;
                self.services
                    .presence
                    .unwatch(payload.conversation_id, self.connection_id)
                    .await;
                Ok(())
            }
            ClientEvent::LoadHistory(payload) => {
                let session_filter = match self.identity()? {
                    Identity::User { session_id, .. } => Some(session_id.clone()),
                    Identity::Agent(_) => None,
                };
                let messages = self
                    .services
                    .conversations
                    .history(
                        self.tenant_id,
                        payload.conversation_id,
                        session_filter.as_deref(),
                    )
                    .await?;
                self.send(ChatEvent::ConversationHistory {
                    conversation_id: payload.conversation_id,
                    messages,
                })
                .await;
                Ok(())
            }
        }
    }

    async fn identify_user(&mut self, payload: IdentifyUser) -> ChatResult<()> {
        let session_id = payload.session_id.trim().to_string();
        if session_id.is_empty() {
            return Err(ChatError::validation("session_id is required"));
        }

        match &self.identity {
            Some(Identity::Agent(_)) => {
                return Err(ChatError::validation(
                    "Connection is already identified as an agent",
                ))
            }
            Some(Identity::User { session_id: current, .. }) if *current != session_id => {
                return Err(ChatError::validation(
                    "Connection is already bound to another session",
                ))
            }
            _ => {}
        }

        let participant = Participant::from_ids(payload.user_id, payload.guest_id)?;

        // Join before the conversation exists so nothing fanned out after creation is missed
        self.services
            .registry
            .register(
                ChannelScope::session(self.tenant_id, session_id.clone()),
                self.connection_id,
                self.outbound.clone(),
            )
            .await;

        let (conversation, created) = match self
            .services
            .conversations
            .find_or_create_conversation(self.tenant_id, &session_id, participant.clone())
            .await
        {
            Ok(found) => found,
            Err(e) => {
                // An unidentified connection holds no other scope
                if self.identity.is_none() {
                    self.services.registry.remove(self.connection_id).await;
                }
                return Err(e);
            }
        };

        self.identity = Some(Identity::User {
            session_id,
            participant,
        });

        self.announce_conversation(&conversation, created).await;
        Ok(())
    }

    async fn identify_agent(&mut self, payload: IdentifyAgent) -> ChatResult<()> {
        let identity = match (payload.agent_id, payload.agent_email) {
            (Some(id), _) => AgentIdentity::Id(id),
            (None, Some(email)) if !email.trim().is_empty() => AgentIdentity::Email(email),
            _ => return Err(ChatError::validation("agent_id or agent_email is required")),
        };

        let agent = self
            .services
            .agents
            .identify_agent(self.tenant_id, identity)
            .await?;

        match &self.identity {
            Some(Identity::User { .. }) => {
                return Err(ChatError::validation(
                    "Connection is already identified as a user",
                ))
            }
            Some(Identity::Agent(current)) if current.id != agent.id => {
                return Err(ChatError::validation(
                    "Connection is already identified as another agent",
                ))
            }
            _ => {}
        }

        if let Some(name) = payload.agent_name.as_deref() {
            if name != agent.name {
                tracing::debug!("Agent {} connected as '{}', stored name wins", agent.id, name);
            }
        }

        self.services
            .registry
            .register(
                ChannelScope::agents(self.tenant_id),
                self.connection_id,
                self.outbound.clone(),
            )
            .await;
        self.services
            .presence
            .agent_connected(self.tenant_id, agent.id, self.connection_id)
            .await;

        let conversations = self.services.conversations.list_active(self.tenant_id).await?;
        let online_agents = self.services.presence.online_agents(self.tenant_id).await;

        self.send(ChatEvent::AgentRegistered {
            agent: AgentProfile::from(&agent),
            tenant_id: self.tenant_id,
            conversations,
            online_agents,
        })
        .await;

        self.identity = Some(Identity::Agent(agent));
        Ok(())
    }

    async fn user_message(&mut self, payload: UserMessage) -> ChatResult<()> {
        let (session_id, participant) = match self.identity()? {
            Identity::User {
                session_id,
                participant,
            } => (session_id.clone(), participant.clone()),
            Identity::Agent(_) => {
                return Err(ChatError::unauthorized("Agents must use agent-message"))
            }
        };

        if payload.session_id.trim() != session_id {
            return Err(ChatError::unauthorized(
                "Messages can only be sent for the connection's own session",
            ));
        }

        let resolved = self
            .services
            .conversations
            .resolve_for_user_message(
                self.tenant_id,
                &session_id,
                payload.conversation_id,
                participant,
            )
            .await?;

        if resolved.rolled_over {
            self.announce_conversation(&resolved.conversation, resolved.created)
                .await;
        }

        self.services
            .messages
            .send_message(SendMessage {
                tenant_id: self.tenant_id,
                conversation_id: resolved.conversation.id,
                sender: MessageSender::User,
                text: payload.message,
            })
            .await?;

        self.typing = None;
        Ok(())
    }

    async fn agent_message(&mut self, payload: AgentMessage) -> ChatResult<()> {
        let agent = self.agent()?.clone();
        ensure_can_reply(&agent)?;

        if payload.agent_id.is_some_and(|id| id != agent.id) {
            return Err(ChatError::unauthorized(
                "agent_id does not match the identified agent",
            ));
        }

        self.services
            .messages
            .send_message(SendMessage {
                tenant_id: self.tenant_id,
                conversation_id: payload.conversation_id,
                sender: MessageSender::Agent(agent.id),
                text: payload.message,
            })
            .await?;

        self.typing = None;
        Ok(())
    }

    async fn mark_read(&mut self, payload: MarkRead) -> ChatResult<()> {
        let session_filter = match (self.identity()?, payload.reader_type) {
            (Identity::User { session_id, .. }, ReaderType::User) => Some(session_id.clone()),
            (Identity::Agent(_), ReaderType::Agent) => None,
            _ => {
                return Err(ChatError::unauthorized(
                    "reader_type does not match the connection",
                ))
            }
        };

        if let (Some(own), Some(claimed)) = (&session_filter, payload.session_id.as_deref()) {
            if own != claimed.trim() {
                return Err(ChatError::unauthorized(
                    "Messages can only be marked read for the connection's own session",
                ));
            }
        }

        self.services
            .read_receipts
            .mark_read(
                self.tenant_id,
                payload.conversation_id,
                payload.reader_type,
                session_filter.as_deref(),
            )
            .await?;
        Ok(())
    }

    async fn typing(&mut self, signal: TypingSignal, is_typing: bool) -> ChatResult<()> {
        let actor = match self.identity()? {
            Identity::User { session_id, .. } => TypingActor::User {
                session_id: session_id.clone(),
                conversation_id: signal.conversation_id,
            },
            Identity::Agent(agent) => TypingActor::Agent {
                agent_id: agent.id,
                session_id: signal.session_id,
                conversation_id: signal.conversation_id,
            },
        };

        self.services
            .presence
            .set_typing(self.tenant_id, actor.clone(), is_typing)
            .await?;

        self.typing = if is_typing { Some(actor) } else { None };
        Ok(())
    }

    /// `conversation-ready` to this connection, then the greeting for new
    /// conversations.
    async fn announce_conversation(&self, conversation: &Conversation, created: bool) {
        let now = Utc::now();

        self.send(ChatEvent::ConversationReady {
            conversation_id: conversation.id,
            session_id: conversation.session_id.clone(),
            status: conversation.status,
            is_new: created,
            within_business_hours: self.config.is_within_business_hours(now),
        })
        .await;

        if created {
            // The conversation stays usable without its greeting
            if let Err(e) = self
                .services
                .conversations
                .greet(&self.config, conversation, now)
                .await
            {
                tracing::warn!(
                    "Auto-response failed for conversation {}: {}",
                    conversation.id,
                    e
                );
            }
        }
    }

    fn identity(&self) -> ChatResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| ChatError::unauthorized("Identify the connection first"))
    }

    fn agent(&self) -> ChatResult<&Agent> {
        match self.identity()? {
            Identity::Agent(agent) => Ok(agent),
            Identity::User { .. } => Err(ChatError::unauthorized(
                "Only agents can perform this action",
            )),
        }
    }

    async fn send(&self, event: ChatEvent) {
        if self.outbound.send(event).await.is_err() {
            tracing::debug!("Connection {} outbound queue closed", self.connection_id);
        }
    }
}
