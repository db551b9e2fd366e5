use relaydesk::domain::entities::{AgentIdentity, AgentRole, AgentStatus};
use relaydesk::domain::errors::ChatError;

mod helpers;
use helpers::*;

#[tokio::test]
async fn test_invite_then_accept_activates_agent() {
    let chat = setup_chat().await;
    let tenant = create_tenant(&chat.db(), 5, "Acme", true).await;

    let invited = chat
        .services
        .agents
        .invite_agent(tenant, "  Dana ", "Dana@Acme.io", AgentRole::Agent, None)
        .await
        .unwrap();

    assert_eq!(invited.name, "Dana");
    assert_eq!(invited.email, "dana@acme.io");
    assert_eq!(invited.status, AgentStatus::Invited);
    assert_eq!(invited.max_concurrent_chats, 5);
    let token = invited.invite_token.clone().unwrap();
    assert_eq!(token.len(), 64);

    // Invited agents cannot connect yet
    let result = chat
        .services
        .agents
        .identify_agent(tenant, AgentIdentity::Id(invited.id))
        .await;
    assert!(matches!(result, Err(ChatError::Authorization(_))));

    let accepted = chat.services.agents.accept_invite(&token).await.unwrap();
    assert_eq!(accepted.id, invited.id);
    assert_eq!(accepted.status, AgentStatus::Active);
    assert_eq!(accepted.invite_token, None);

    // Tokens are single use
    assert!(matches!(
        chat.services.agents.accept_invite(&token).await,
        Err(ChatError::NotFound(_))
    ));

    let identified = chat
        .services
        .agents
        .identify_agent(tenant, AgentIdentity::Email("DANA@acme.io".into()))
        .await
        .unwrap();
    assert_eq!(identified.id, invited.id);
    assert!(identified.last_seen_at.is_some());
}

#[tokio::test]
async fn test_expired_invite_is_rejected() {
    let chat = setup_chat_with_invite_ttl(chrono::Duration::hours(-1)).await;
    let tenant = create_tenant(&chat.db(), 5, "Acme", true).await;

    let invited = chat
        .services
        .agents
        .invite_agent(tenant, "Eve", "eve@acme.io", AgentRole::Agent, Some(3))
        .await
        .unwrap();
    let token = invited.invite_token.unwrap();

    let result = chat.services.agents.accept_invite(&token).await;
    assert!(matches!(result, Err(ChatError::Validation(_))));

    let result = chat
        .services
        .agents
        .identify_agent(tenant, AgentIdentity::Id(invited.id))
        .await;
    assert!(matches!(result, Err(ChatError::Authorization(_))));
}

#[tokio::test]
async fn test_invite_validation() {
    let chat = setup_chat().await;
    let tenant = create_tenant(&chat.db(), 5, "Acme", true).await;
    let agents = &chat.services.agents;

    assert!(matches!(
        agents
            .invite_agent(tenant, "", "x@acme.io", AgentRole::Agent, None)
            .await,
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        agents
            .invite_agent(tenant, "X", "not-an-email", AgentRole::Agent, None)
            .await,
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        agents
            .invite_agent(tenant, "X", "x@acme.io", AgentRole::Agent, Some(0))
            .await,
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        agents.accept_invite("   ").await,
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        agents.accept_invite("no-such-token").await,
        Err(ChatError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_email_conflicts_within_tenant_only() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant_a = create_tenant(&db, 1, "A", true).await;
    let tenant_b = create_tenant(&db, 2, "B", true).await;
    let agents = &chat.services.agents;

    agents
        .invite_agent(tenant_a, "Sam", "sam@shared.io", AgentRole::Owner, None)
        .await
        .unwrap();

    assert!(matches!(
        agents
            .invite_agent(tenant_a, "Sam Again", "SAM@shared.io", AgentRole::Agent, None)
            .await,
        Err(ChatError::Conflict(_))
    ));

    let other = agents
        .invite_agent(tenant_b, "Sam", "sam@shared.io", AgentRole::Agent, None)
        .await
        .unwrap();
    assert_eq!(other.tenant_id, tenant_b);
}

#[tokio::test]
async fn test_identify_is_scoped_to_tenant_and_status() {
    let chat = setup_chat().await;
    let db = chat.db();
    let tenant_a = create_tenant(&db, 1, "A", true).await;
    let tenant_b = create_tenant(&db, 2, "B", true).await;
    let alice = create_active_agent(&db, tenant_a, "Alice").await;
    let retired = create_agent(
        &db,
        tenant_a,
        "Retired",
        "retired@example.com",
        AgentRole::Agent,
        "inactive",
        5,
    )
    .await;
    let agents = &chat.services.agents;

    assert!(agents
        .identify_agent(tenant_a, AgentIdentity::Id(alice))
        .await
        .is_ok());
    assert!(matches!(
        agents.identify_agent(tenant_b, AgentIdentity::Id(alice)).await,
        Err(ChatError::Authorization(_))
    ));
    assert!(matches!(
        agents
            .identify_agent(tenant_b, AgentIdentity::Email("alice@tenant1.example.com".into()))
            .await,
        Err(ChatError::Authorization(_))
    ));
    assert!(matches!(
        agents.identify_agent(tenant_a, AgentIdentity::Id(retired)).await,
        Err(ChatError::Authorization(_))
    ));
    assert!(matches!(
        agents.identify_agent(tenant_a, AgentIdentity::Id(9999)).await,
        Err(ChatError::Authorization(_))
    ));
}

#[tokio::test]
async fn test_back_to_back_invites_are_all_readable() {
    let chat = setup_chat().await;
    let tenant = create_tenant(&chat.db(), 5, "Acme", true).await;

    let mut ids = Vec::new();
    for n in 0..20 {
        let invited = chat
            .services
            .agents
            .invite_agent(
                tenant,
                &format!("Agent {}", n),
                &format!("agent{}@acme.io", n),
                AgentRole::Agent,
                None,
            )
            .await
            .unwrap();
        assert_eq!(invited.email, format!("agent{}@acme.io", n));
        assert_eq!(invited.status, AgentStatus::Invited);
        assert!(invited.invite_token.is_some());
        ids.push(invited.id);
    }

    ids.dedup();
    assert_eq!(ids.len(), 20);
}
