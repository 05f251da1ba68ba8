use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Prospective tenant asking to visit a listing.
    #[default]
    Requester,
    /// Listing owner receiving visit requests.
    Owner,
}

impl UserRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "requester" | "client" | "tenant" | "locataire" => Some(UserRole::Requester),
            "owner" | "proprietaire" | "propriétaire" | "landlord" => Some(UserRole::Owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            auth_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn is_owner(&self) -> bool {
        self.role == UserRole::Owner
    }
}
