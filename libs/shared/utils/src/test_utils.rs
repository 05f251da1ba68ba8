use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::session::{SessionContext, UserRole};

pub struct TestConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub user_id: String,
    pub user_role: UserRole,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            api_token: Some("test-token".to_string()),
            user_id: Uuid::new_v4().to_string(),
            user_role: UserRole::Requester,
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock server (e.g. `MockServer::uri()`).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn owner(mut self) -> Self {
        self.user_role = UserRole::Owner;
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            api_base_url: self.api_base_url.clone(),
            api_token: self.api_token.clone(),
            user_id: self.user_id.clone(),
            user_role: self.user_role,
            request_timeout_secs: 2,
            visit_cache_ttl_secs: 30,
            display_utc_offset_minutes: 0,
        }
    }

    pub fn to_session(&self) -> SessionContext {
        self.to_app_config().session()
    }
}

pub struct TestSession;

impl TestSession {
    pub fn requester() -> SessionContext {
        SessionContext::new("requester-1", UserRole::Requester).with_token("test-token")
    }

    pub fn owner() -> SessionContext {
        SessionContext::new("owner-1", UserRole::Owner).with_token("test-token")
    }
}

pub struct MockApiResponses;

impl MockApiResponses {
    pub fn visit_response(id: &str, status: &str) -> Value {
        json!({
            "_id": id,
            "logementId": "logement-42",
            "logementTitle": "Chambre lumineuse proche campus",
            "clientUsername": "amine",
            "dateVisite": "2030-05-10T14:00:00.000Z",
            "status": status,
            "notes": "Je peux venir avec un ami",
            "contactPhone": "+216 22 333 444"
        })
    }

    pub fn visit_without_status(id: &str) -> Value {
        json!({
            "_id": id,
            "logementId": "logement-42",
            "dateVisite": "2030-05-10T14:00:00.000Z"
        })
    }

    pub fn completed_visit_with_review(id: &str, review_id: &str) -> Value {
        let mut visit = Self::visit_response(id, "completed");
        visit["reviewId"] = json!(review_id);
        visit
    }

    pub fn review_response(id: &str, visit_id: &str, rating: u8) -> Value {
        json!({
            "_id": id,
            "visiteId": visit_id,
            "rating": rating,
            "comment": "Propriétaire accueillant",
            "createdAt": "2030-05-11T09:00:00.000Z"
        })
    }

    pub fn message_response(id: &str, visit_id: &str, sender: &str, text: &str, created_at: &str) -> Value {
        json!({
            "_id": id,
            "visiteId": visit_id,
            "sender": sender,
            "text": text,
            "images": [],
            "createdAt": created_at,
            "read": false
        })
    }

    pub fn error_response(message: &str) -> Value {
        json!({ "message": message })
    }
}
