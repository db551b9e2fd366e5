use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{AgentProfile, AgentStatus, TenantId};
use crate::infrastructure::http::middleware::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptInviteResponse {
    pub tenant_id: TenantId,
    pub status: AgentStatus,
    pub agent: AgentProfile,
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Json(request): Json<AcceptInviteRequest>,
) -> ApiResult<Json<AcceptInviteResponse>> {
    let agent = state.services.agents.accept_invite(&request.token).await?;

    Ok(Json(AcceptInviteResponse {
        tenant_id: agent.tenant_id,
        status: agent.status,
        agent: AgentProfile::from(&agent),
    }))
}
