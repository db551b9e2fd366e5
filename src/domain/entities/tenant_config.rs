use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

/// Opening window for a single weekday, times as `HH:MM` in the tenant zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub enabled: bool,
    pub open: String,
    pub close: String,
}

impl DayHours {
    fn working(open: &str, close: &str) -> Self {
        Self {
            enabled: true,
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    fn closed() -> Self {
        Self {
            enabled: false,
            open: "09:00".to_string(),
            close: "17:00".to_string(),
        }
    }

    /// `open <= time < close`. A window whose close is not after its open
    /// never matches, and unparsable times never match.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }

        let (Ok(open), Ok(close)) = (
            NaiveTime::parse_from_str(&self.open, "%H:%M"),
            NaiveTime::parse_from_str(&self.close, "%H:%M"),
        ) else {
            return false;
        };

        open < close && time >= open && time < close
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub monday: DayHours,
    pub tuesday: DayHours,
    pub wednesday: DayHours,
    pub thursday: DayHours,
    pub friday: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
}

impl BusinessHours {
    pub fn for_weekday(&self, weekday: Weekday) -> &DayHours {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            monday: DayHours::working("09:00", "17:00"),
            tuesday: DayHours::working("09:00", "17:00"),
            wednesday: DayHours::working("09:00", "17:00"),
            thursday: DayHours::working("09:00", "17:00"),
            friday: DayHours::working("09:00", "17:00"),
            saturday: DayHours::closed(),
            sunday: DayHours::closed(),
        }
    }
}

/// Per-tenant widget and chat behaviour. One row per tenant, created with
/// defaults the first time anything asks for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantChatConfig {
    pub tenant_id: TenantId,
    pub widget_color: String,
    pub widget_position: String,
    pub welcome_message: Option<String>,
    pub business_hours: BusinessHours,
    pub timezone: String,
    pub auto_response_enabled: bool,
    pub capture_leads: bool,
    pub allowed_domains: Vec<String>,
    pub max_agents: i64,
    pub integration_type: String,
}

pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi there! How can we help you today?";
pub const OFFLINE_MESSAGE: &str =
    "We're currently offline. Leave a message and we'll get back to you as soon as possible.";

impl TenantChatConfig {
    pub fn with_defaults(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            widget_color: "#2563eb".to_string(),
            widget_position: "bottom-right".to_string(),
            welcome_message: Some(DEFAULT_WELCOME_MESSAGE.to_string()),
            business_hours: BusinessHours::default(),
            timezone: "UTC".to_string(),
            auto_response_enabled: false,
            capture_leads: false,
            allowed_domains: Vec::new(),
            max_agents: 5,
            integration_type: "widget".to_string(),
        }
    }

    /// Tenant zone, falling back to UTC when the stored name is unknown.
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(
                "Unknown timezone '{}' for tenant {}, using UTC",
                self.timezone,
                self.tenant_id
            );
            Tz::UTC
        })
    }

    pub fn is_within_business_hours(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz());
        self.business_hours
            .for_weekday(local.weekday())
            .contains(local.time())
    }

    /// Text of the automatic greeting for a new conversation.
    pub fn auto_response(&self, now: DateTime<Utc>) -> String {
        if self.is_within_business_hours(now) {
            self.welcome_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string())
        } else {
            OFFLINE_MESSAGE.to_string()
        }
    }
}
