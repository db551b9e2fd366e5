pub mod error;

pub use error::{ApiError, ApiResult};

use crate::application::services::ChatServices;

/// State shared by every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub services: ChatServices,
    /// Outbound queue size of each WebSocket connection.
    pub channel_capacity: usize,
}
