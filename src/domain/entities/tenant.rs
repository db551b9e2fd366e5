use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{ChatError, ChatResult};

/// Fixed prefix of every tenant channel namespace (`tenant-<id>`).
pub const NAMESPACE_PREFIX: &str = "tenant-";

/// Numeric identifier of a tenant account.
///
/// Channel scopes can only be built from a `TenantId`, so every broadcast
/// target is derived from server-side state rather than client payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i64);

impl TenantId {
    pub fn new(id: i64) -> ChatResult<Self> {
        if id <= 0 {
            return Err(ChatError::validation(format!("Invalid tenant id: {}", id)));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    /// Channel namespace owned by this tenant.
    pub fn namespace(self) -> String {
        format!("{}{}", NAMESPACE_PREFIX, self.0)
    }

    /// Parse a namespace of the form `tenant-<id>`, with or without a
    /// leading slash. Anything else is rejected before a handler runs.
    pub fn from_namespace(namespace: &str) -> ChatResult<Self> {
        let trimmed = namespace.strip_prefix('/').unwrap_or(namespace);
        let digits = trimmed.strip_prefix(NAMESPACE_PREFIX).ok_or_else(|| {
            ChatError::validation(format!("Malformed channel namespace: {}", namespace))
        })?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ChatError::validation(format!(
                "Malformed channel namespace: {}",
                namespace
            )));
        }

        let id: i64 = digits.parse().map_err(|_| {
            ChatError::validation(format!("Malformed channel namespace: {}", namespace))
        })?;

        Self::new(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant row as seen by the relay. Owned by the billing side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub is_active: bool,
}
