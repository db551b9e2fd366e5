use relaydesk::application::services::ChatServices;
use relaydesk::domain::entities::TenantId;
use relaydesk::domain::events::ChatEvent;
use relaydesk::domain::ports::connection_registry::{ConnectionId, ConnectionRegistry};
use relaydesk::domain::ports::message_repository::MessageRepository;
use relaydesk::infrastructure::persistence::Database;
use relaydesk::infrastructure::realtime::{admit, ConnectionHandler, InMemoryConnectionRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::test_db::{setup_test_db, TestDatabase};

pub struct TestChat {
    pub test_db: TestDatabase,
    pub services: ChatServices,
    pub registry: Arc<InMemoryConnectionRegistry>,
}

impl TestChat {
    pub fn db(&self) -> Database {
        self.test_db.db()
    }
}

pub async fn setup_chat() -> TestChat {
    setup_chat_with_invite_ttl(chrono::Duration::hours(72)).await
}

pub async fn setup_chat_with_invite_ttl(invite_ttl: chrono::Duration) -> TestChat {
    let test_db = setup_test_db().await;
    let message_repo = Arc::new(test_db.db());
    build_chat(test_db, message_repo, invite_ttl)
}

/// Chat services whose message store is swapped for `wrap(db)`.
pub async fn setup_chat_with_messages<F>(wrap: F) -> TestChat
where
    F: FnOnce(Database) -> Arc<dyn MessageRepository>,
{
    let test_db = setup_test_db().await;
    let message_repo = wrap(test_db.db());
    build_chat(test_db, message_repo, chrono::Duration::hours(72))
}

fn build_chat(
    test_db: TestDatabase,
    message_repo: Arc<dyn MessageRepository>,
    invite_ttl: chrono::Duration,
) -> TestChat {
    let db = test_db.db();
    let registry = Arc::new(InMemoryConnectionRegistry::new());

    let services = ChatServices::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        message_repo,
        registry.clone() as Arc<dyn ConnectionRegistry>,
        invite_ttl,
    );

    TestChat {
        test_db,
        services,
        registry,
    }
}

/// A connection driven directly through its handler, without a socket.
pub struct TestClient {
    handler: ConnectionHandler,
    rx: mpsc::Receiver<ChatEvent>,
}

impl TestClient {
    pub async fn connect(chat: &TestChat, tenant_id: TenantId) -> TestClient {
        let config = admit(&chat.services, &tenant_id.namespace())
            .await
            .expect("Tenant should be admitted");
        let (tx, rx) = mpsc::channel(64);
        let handler = ConnectionHandler::new(ConnectionId::new(), config, tx, chat.services.clone());

        TestClient { handler, rx }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handler.connection_id()
    }

    pub async fn send(&mut self, frame: Value) {
        self.handler.handle_frame(&frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, frame: &str) {
        self.handler.handle_frame(frame).await;
    }

    pub async fn recv(&mut self) -> ChatEvent {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("Timed out waiting for an event")
            .expect("Connection channel closed")
    }

    /// Next event with the given wire name, skipping others.
    pub async fn recv_named(&mut self, name: &str) -> ChatEvent {
        loop {
            let event = self.recv().await;
            if event.name() == name {
                return event;
            }
        }
    }

    /// Everything queued so far.
    pub fn drain(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn drain_names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(|e| e.name()).collect()
    }

    /// Identify as an end user and return the conversation id.
    pub async fn identify_user(&mut self, session_id: &str) -> i64 {
        self.send(json!({
            "event": "identify-user",
            "data": { "session_id": session_id }
        }))
        .await;

        match self.recv_named("conversation-ready").await {
            ChatEvent::ConversationReady {
                conversation_id, ..
            } => conversation_id,
            other => panic!("Unexpected event {:?}", other),
        }
    }

    pub async fn identify_agent(&mut self, agent_id: i64) -> ChatEvent {
        self.send(json!({
            "event": "identify-agent",
            "data": { "agent_id": agent_id }
        }))
        .await;

        self.recv_named("agent-registered").await
    }

    pub async fn user_message(&mut self, conversation_id: i64, session_id: &str, text: &str) {
        self.send(json!({
            "event": "user-message",
            "data": {
                "conversation_id": conversation_id,
                "session_id": session_id,
                "message": text
            }
        }))
        .await;
    }

    pub async fn agent_message(&mut self, conversation_id: i64, text: &str) {
        self.send(json!({
            "event": "agent-message",
            "data": { "conversation_id": conversation_id, "message": text }
        }))
        .await;
    }

    pub async fn disconnect(self) {
        self.handler.disconnect().await;
    }
}

pub fn error_code(event: &ChatEvent) -> &str {
    match event {
        ChatEvent::Error { code, .. } => code,
        other => panic!("Expected an error event, got {:?}", other),
    }
}
