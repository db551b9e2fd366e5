use std::sync::Arc;

use crate::application::services::ChatServices;
use crate::config::Config;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::ports::connection_registry::ConnectionRegistry;
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::message_repository::MessageRepository;
use crate::domain::ports::tenant_repository::TenantRepository;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::realtime::InMemoryConnectionRegistry;

/// Wire every service over one database and one process-local registry.
pub fn build_services(db: &Database, config: &Config) -> ChatServices {
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());

    ChatServices::new(
        Arc::new(db.clone()) as Arc<dyn TenantRepository>,
        Arc::new(db.clone()) as Arc<dyn AgentRepository>,
        Arc::new(db.clone()) as Arc<dyn ConversationRepository>,
        Arc::new(db.clone()) as Arc<dyn MessageRepository>,
        registry,
        config.invite_ttl(),
    )
}

pub fn build_app_state(db: Database, config: &Config) -> AppState {
    let services = build_services(&db, config);
    tracing::info!(
        "Chat services initialized (channel capacity {}, invite ttl {}h)",
        config.channel_capacity,
        config.invite_ttl_hours
    );

    AppState {
        services,
        channel_capacity: config.channel_capacity,
    }
}
