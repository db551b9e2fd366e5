pub mod email_validator;
pub mod time;
pub mod tokens;

pub use email_validator::validate_and_normalize_email;
pub use time::{format_timestamp, now_timestamp, parse_timestamp};
pub use tokens::generate_invite_token;
