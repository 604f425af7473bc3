//! Authenticated user identity.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Profile fields the client keeps for the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UserProfile {
    /// "First Last" for greetings.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The identity half of a session: who is logged in.
///
/// This is the value persisted under the `auth_user` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: UserId,
    pub profile: UserProfile,
}
