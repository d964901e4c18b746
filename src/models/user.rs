//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// Registered user stored in Firestore.
///
/// Created by the registration route after the SPA completes the Fitbit
/// OAuth flow. Read-only to the sync engine.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Fitbit encoded user ID (also used as document ID)
    pub user_id: String,
    /// Fitbit access token for this user
    pub access_token: String,
    /// When the user registered (ISO 8601)
    #[serde(default)]
    pub registered_at: String,
}

impl User {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            registered_at: String::new(),
        }
    }
}

// Tokens must never reach the logs.
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let user = User::new("ABC123", "secret-token-value");
        let rendered = format!("{:?}", user);
        assert!(rendered.contains("ABC123"));
        assert!(!rendered.contains("secret-token-value"));
    }
}
