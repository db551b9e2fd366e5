use crate::domain::errors::{ChatError, ChatResult};

pub fn validate_and_normalize_email(email: &str) -> ChatResult<String> {
    let trimmed = email.trim();

    if !email_address::EmailAddress::is_valid(trimmed) {
        return Err(ChatError::validation(
            "Invalid email format. Must be in format user@domain.tld",
        ));
    }

    // Require a TLD (dot after @)
    if let Some((_, domain_part)) = trimmed.split_once('@') {
        if !domain_part.contains('.') {
            return Err(ChatError::validation(
                "Invalid email format. Domain must include a TLD (e.g., .com, .org)",
            ));
        }
    }

    Ok(trimmed.to_lowercase())
}
