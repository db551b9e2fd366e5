use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::domain::entities::{BusinessHours, TenantId};
use crate::infrastructure::http::middleware::{ApiResult, AppState};

/// Public configuration the chat widget loads before connecting.
#[derive(Debug, Serialize)]
pub struct WidgetConfigResponse {
    pub tenant_id: TenantId,
    pub namespace: String,
    pub widget_color: String,
    pub widget_position: String,
    pub welcome_message: Option<String>,
    pub capture_leads: bool,
    pub business_hours: BusinessHours,
    pub timezone: String,
    pub within_business_hours: bool,
}

pub async fn get_widget_config(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> ApiResult<Json<WidgetConfigResponse>> {
    let tenant_id = TenantId::new(tenant_id)?;
    let config = state.services.tenants.load_active_config(tenant_id).await?;

    Ok(Json(WidgetConfigResponse {
        tenant_id,
        namespace: tenant_id.namespace(),
        within_business_hours: config.is_within_business_hours(Utc::now()),
        widget_color: config.widget_color,
        widget_position: config.widget_position,
        welcome_message: config.welcome_message,
        capture_leads: config.capture_leads,
        business_hours: config.business_hours,
        timezone: config.timezone,
    }))
}
