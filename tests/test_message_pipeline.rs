use async_trait::async_trait;
use relaydesk::application::services::{MessageSender, SendMessage};
use relaydesk::domain::entities::{
    Message, NewMessage, Participant, SenderType, TenantId, MAX_MESSAGE_CHARS,
};
use relaydesk::domain::errors::{ChatError, ChatResult};
use relaydesk::domain::events::ChatEvent;
use relaydesk::domain::ports::connection_registry::{ChannelScope, ConnectionId, ConnectionRegistry};
use relaydesk::domain::ports::message_repository::MessageRepository;
use relaydesk::infrastructure::persistence::Database;
use std::sync::Arc;
use tokio::sync::mpsc;

mod helpers;
use helpers::*;

async fn subscribe(chat: &TestChat, scope: ChannelScope) -> mpsc::Receiver<ChatEvent> {
    let (tx, rx) = mpsc::channel(64);
    chat.registry.register(scope, ConnectionId::new(), tx).await;
    rx
}

async fn open_conversation(chat: &TestChat, tenant_id: TenantId, session_id: &str) -> i64 {
    let (conversation, _) = chat
        .services
        .conversations
        .find_or_create_conversation(tenant_id, session_id, Participant::Anonymous)
        .await
        .unwrap();
    conversation.id
}

/// Message store whose writes always fail.
struct BrokenWrites {
    db: Database,
}

#[async_trait]
impl MessageRepository for BrokenWrites {
    async fn append_message(
        &self,
        _message: &NewMessage,
        _unread_increment: i64,
        _claim_agent: Option<i64>,
    ) -> ChatResult<Message> {
        Err(ChatError::Persistence("disk I/O error".to_string()))
    }

    async fn list_messages(&self, conversation_id: i64) -> ChatResult<Vec<Message>> {
        self.db.list_messages(conversation_id).await
    }

    async fn mark_messages_read(
        &self,
        conversation_id: i64,
        sender_type: SenderType,
        reset_unread: bool,
    ) -> ChatResult<u64> {
        self.db
            .mark_messages_read(conversation_id, sender_type, reset_unread)
            .await
    }
}

async fn setup_broken_chat() -> TestChat {
    setup_chat_with_messages(|db| Arc::new(BrokenWrites { db }) as Arc<dyn MessageRepository>).await
}

fn send(tenant_id: TenantId, conversation_id: i64, sender: MessageSender, text: &str) -> SendMessage {
    SendMessage {
        tenant_id,
        conversation_id,
        sender,
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_messages_are_replayed_in_send_order() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let agent_id = create_active_agent(&db, tenant, "Alice").await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    let script = [
        (MessageSender::User, "Hi"),
        (MessageSender::Agent(agent_id), "Hello, how can I help?"),
        (MessageSender::User, "My order is late"),
        (MessageSender::User, "Order 1234"),
    ];
    for (sender, text) in script {
        chat.services
            .messages
            .send_message(send(tenant, conversation_id, sender, text))
            .await
            .unwrap();
    }

    let history = chat
        .services
        .conversations
        .history(tenant, conversation_id, None)
        .await
        .unwrap();

    let bodies: Vec<&str> = history.iter().map(|m| m.message.as_str()).collect();
    assert_eq!(bodies, vec!["Hi", "Hello, how can I help?", "My order is late", "Order 1234"]);
    assert!(history.windows(2).all(|pair| pair[0].id < pair[1].id));

    let conversation = chat
        .services
        .conversations
        .get_for_tenant(tenant, conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.last_message.as_deref(), Some("Order 1234"));
    assert_eq!(conversation.last_message_time.as_deref(), Some(history[3].created_at.as_str()));
}

#[tokio::test]
async fn test_only_user_messages_count_as_unread() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let agent_id = create_active_agent(&db, tenant, "Alice").await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    for text in ["one", "two", "three"] {
        chat.services
            .messages
            .send_message(send(tenant, conversation_id, MessageSender::User, text))
            .await
            .unwrap();
    }
    chat.services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::Agent(agent_id), "reply"))
        .await
        .unwrap();
    chat.services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::System, "notice"))
        .await
        .unwrap();

    assert_eq!(unread_count(&db, conversation_id).await, 3);
}

#[tokio::test]
async fn test_concurrent_user_messages_keep_unread_exact() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let messages = chat.services.messages.clone();
        handles.push(tokio::spawn(async move {
            messages
                .send_message(send(
                    tenant,
                    conversation_id,
                    MessageSender::User,
                    &format!("message {}", i),
                ))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(message_count(&db, conversation_id).await, 20);
    assert_eq!(unread_count(&db, conversation_id).await, 20);
}

#[tokio::test]
async fn test_long_message_is_truncated_and_blank_is_rejected() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    let stored = chat
        .services
        .messages
        .send_message(send(
            tenant,
            conversation_id,
            MessageSender::User,
            &"a".repeat(MAX_MESSAGE_CHARS + 500),
        ))
        .await
        .unwrap();
    assert_eq!(stored.message.chars().count(), MAX_MESSAGE_CHARS);

    let result = chat
        .services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::User, "   \n "))
        .await;
    assert!(matches!(result, Err(ChatError::Validation(_))));
    assert_eq!(message_count(&db, conversation_id).await, 1);
    assert_eq!(unread_count(&db, conversation_id).await, 1);
}

#[tokio::test]
async fn test_message_to_other_tenants_conversation_is_not_found() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant_a = create_tenant(&db, 1, "A", true).await;
    let tenant_b = create_tenant(&db, 2, "B", true).await;
    let conversation_id = open_conversation(&chat, tenant_a, "s1").await;

    let mut agents_b = subscribe(&chat, ChannelScope::agents(tenant_b)).await;

    let result = chat
        .services
        .messages
        .send_message(send(tenant_b, conversation_id, MessageSender::User, "sneaky"))
        .await;

    assert!(matches!(result, Err(ChatError::NotFound(_))));
    assert_eq!(message_count(&db, conversation_id).await, 0);
    assert!(agents_b.try_recv().is_err());
}

#[tokio::test]
async fn test_closed_conversation_rejects_messages_without_broadcast() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let agent_id = create_active_agent(&db, tenant, "Alice").await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    let agent = {
        use relaydesk::domain::ports::agent_repository::AgentRepository;
        db.get_agent(tenant, agent_id).await.unwrap().unwrap()
    };
    chat.services
        .conversations
        .close_conversation(tenant, conversation_id, &agent)
        .await
        .unwrap();
    let before = message_count(&db, conversation_id).await;

    let mut session = subscribe(&chat, ChannelScope::session(tenant, "s1")).await;
    let mut agents = subscribe(&chat, ChannelScope::agents(tenant)).await;

    let result = chat
        .services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::User, "anyone?"))
        .await;

    assert!(matches!(result, Err(ChatError::Validation(_))));
    assert_eq!(message_count(&db, conversation_id).await, before);
    assert!(session.try_recv().is_err());
    assert!(agents.try_recv().is_err());
}

#[tokio::test]
async fn test_fan_out_targets_by_sender() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let agent_id = create_active_agent(&db, tenant, "Alice").await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    let mut session = subscribe(&chat, ChannelScope::session(tenant, "s1")).await;
    let mut other_session = subscribe(&chat, ChannelScope::session(tenant, "s2")).await;
    let mut agents = subscribe(&chat, ChannelScope::agents(tenant)).await;

    chat.services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::User, "Hi"))
        .await
        .unwrap();
    chat.services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::Agent(agent_id), "Hello"))
        .await
        .unwrap();

    match session.try_recv().unwrap() {
        ChatEvent::NewMessage(payload) => {
            assert_eq!(payload.sender_type, SenderType::User);
            assert_eq!(payload.session_id, "s1");
            assert_eq!(payload.sender_id.as_deref(), Some("s1"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    match session.try_recv().unwrap() {
        ChatEvent::NewMessage(payload) => {
            assert_eq!(payload.sender_type, SenderType::Agent);
            assert_eq!(payload.sender_id, Some(agent_id.to_string()));
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert_eq!(agents.try_recv().unwrap().name(), "new-user-message");
    assert_eq!(agents.try_recv().unwrap().name(), "new-agent-message");

    assert!(other_session.try_recv().is_err());
}

#[tokio::test]
async fn test_watched_conversation_reads_user_messages_live() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;
    let watcher = ConnectionId::new();

    chat.services
        .presence
        .watch(tenant, conversation_id, watcher)
        .await
        .unwrap();

    let live = chat
        .services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::User, "seen"))
        .await
        .unwrap();
    assert!(live.is_read);
    assert_eq!(unread_count(&db, conversation_id).await, 0);

    chat.services.presence.unwatch(conversation_id, watcher).await;

    let unseen = chat
        .services
        .messages
        .send_message(send(tenant, conversation_id, MessageSender::User, "unseen"))
        .await
        .unwrap();
    assert!(!unseen.is_read);
    assert_eq!(unread_count(&db, conversation_id).await, 1);
}

#[tokio::test]
async fn test_watch_requires_same_tenant() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant_a = create_tenant(&db, 1, "A", true).await;
    let tenant_b = create_tenant(&db, 2, "B", true).await;
    let conversation_id = open_conversation(&chat, tenant_a, "s1").await;

    let result = chat
        .services
        .presence
        .watch(tenant_b, conversation_id, ConnectionId::new())
        .await;

    assert!(matches!(result, Err(ChatError::NotFound(_))));
    assert!(!chat.services.presence.is_watched(conversation_id).await);
}

#[tokio::test]
async fn test_guest_sender_id_is_recorded() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let (conversation, _) = chat
        .services
        .conversations
        .find_or_create_conversation(tenant, "s1", Participant::Guest("guest-77".into()))
        .await
        .unwrap();

    let user = chat
        .services
        .messages
        .send_message(send(tenant, conversation.id, MessageSender::User, "hey"))
        .await
        .unwrap();
    let system = chat
        .services
        .messages
        .send_message(send(tenant, conversation.id, MessageSender::System, "note"))
        .await
        .unwrap();

    assert_eq!(user.sender_id.as_deref(), Some("guest-77"));
    assert_eq!(system.sender_id, None);
    assert_eq!(system.sender_type, SenderType::System);
}

#[tokio::test]
async fn test_failed_persist_broadcasts_nothing() {
    let chat = setup_broken_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let agent_id = create_active_agent(&db, tenant, "Alice").await;
    let conversation_id = open_conversation(&chat, tenant, "s1").await;

    let mut session_rx = subscribe(&chat, ChannelScope::session(tenant, "s1")).await;
    let mut agents_rx = subscribe(&chat, ChannelScope::agents(tenant)).await;

    for sender in [MessageSender::User, MessageSender::Agent(agent_id)] {
        let result = chat
            .services
            .messages
            .send_message(send(tenant, conversation_id, sender, "Hello"))
            .await;
        assert!(matches!(result, Err(ChatError::Persistence(_))));
    }

    assert!(session_rx.try_recv().is_err());
    assert!(agents_rx.try_recv().is_err());
    assert_eq!(message_count(&db, conversation_id).await, 0);
    assert_eq!(unread_count(&db, conversation_id).await, 0);

    let conversation = chat
        .services
        .conversations
        .get_for_tenant(tenant, conversation_id)
        .await
        .unwrap();
    assert_eq!(conversation.agent_id, None);
}

#[tokio::test]
async fn test_failed_persist_reports_generic_error_to_sender() {
    let chat = setup_broken_chat().await;
    let db = chat.db();
    let tenant = create_tenant(&db, 5, "Acme", true).await;
    let alice = create_active_agent(&db, tenant, "Alice").await;

    let mut user = TestClient::connect(&chat, tenant).await;
    let conversation_id = user.identify_user("s1").await;
    let mut agent = TestClient::connect(&chat, tenant).await;
    agent.identify_agent(alice).await;
    user.drain();
    agent.drain();

    user.user_message(conversation_id, "s1", "Is anyone there?").await;

    match user.recv().await {
        ChatEvent::Error { code, message } => {
            assert_eq!(code, "persistence_error");
            assert_eq!(message, "Something went wrong, please try again");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(user.drain().is_empty());
    assert!(agent.drain().is_empty());
}
