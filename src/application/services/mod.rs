pub mod agent_service;
pub mod conversation_locks;
pub mod conversation_service;
pub mod message_service;
pub mod presence_service;
pub mod read_receipt_service;
pub mod tenant_service;

pub use agent_service::AgentService;
pub use conversation_locks::{ConversationGuard, ConversationLocks};
pub use conversation_service::{ensure_can_reply, ConversationService, ResolvedConversation};
pub use message_service::{MessageSender, MessageService, SendMessage};
pub use presence_service::{PresenceService, TypingActor};
pub use read_receipt_service::ReadReceiptService;
pub use tenant_service::TenantService;

use std::sync::Arc;

use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::ports::connection_registry::ConnectionRegistry;
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::message_repository::MessageRepository;
use crate::domain::ports::tenant_repository::TenantRepository;

/// Every service a connection handler needs, wired over the same
/// repositories, registry and conversation locks.
#[derive(Clone)]
pub struct ChatServices {
    pub tenants: TenantService,
    pub agents: AgentService,
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub presence: PresenceService,
    pub read_receipts: ReadReceiptService,
    pub registry: Arc<dyn ConnectionRegistry>,
}

impl ChatServices {
    pub fn new(
        tenant_repo: Arc<dyn TenantRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        message_repo: Arc<dyn MessageRepository>,
        registry: Arc<dyn ConnectionRegistry>,
        invite_ttl: chrono::Duration,
    ) -> Self {
        let locks = ConversationLocks::new();
        let presence = PresenceService::new(conversation_repo.clone(), registry.clone());
        let messages = MessageService::new(
            message_repo.clone(),
            conversation_repo.clone(),
            registry.clone(),
            presence.clone(),
            locks.clone(),
        );

        Self {
            tenants: TenantService::new(tenant_repo),
            agents: AgentService::new(agent_repo, invite_ttl),
            conversations: ConversationService::new(
                conversation_repo.clone(),
                message_repo.clone(),
                messages.clone(),
                registry.clone(),
                locks.clone(),
            ),
            read_receipts: ReadReceiptService::new(
                message_repo,
                conversation_repo,
                registry.clone(),
                locks,
            ),
            messages,
            presence,
            registry,
        }
    }
}
