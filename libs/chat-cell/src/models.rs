// libs/chat-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use shared_models::{AppError, AppResult};
use shared_utils::datetime::wire_serde;

pub const MAX_IMAGES_PER_MESSAGE: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// How far the server clock may lag behind the client when matching a sent
/// message to its stored form.
const ECHO_CLOCK_SKEW_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub visite_id: String,
    /// User id of the author.
    #[serde(default, alias = "senderId")]
    pub sender: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(with = "wire_serde", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl ChatMessage {
    /// Ordering key: creation time, then id for equal timestamps.
    pub fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }

    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender == user_id
    }

    /// Whether this server message is the stored form of `local`, a copy
    /// built on the client before the server reported an id.
    pub fn echoes(&self, local: &ChatMessage) -> bool {
        self.sender == local.sender
            && self.text == local.text
            && self.images.len() == local.images.len()
            && self.created_at + Duration::minutes(ECHO_CLOCK_SKEW_MINUTES) >= local.created_at
    }
}

/// An image picked for upload, already read into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    fn validate(&self) -> AppResult<()> {
        if !self.content_type.starts_with("image/") {
            return Err(AppError::ValidationError(format!(
                "{} n'est pas une image",
                self.file_name
            )));
        }
        if self.bytes.is_empty() {
            return Err(AppError::ValidationError(format!("{} est vide", self.file_name)));
        }
        if self.bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::ValidationError(format!(
                "{} dépasse la taille maximale de 5 Mo",
                self.file_name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendMessageRequest {
    pub visite_id: String,
    pub text: Option<String>,
    pub images: Vec<ImageAttachment>,
}

impl SendMessageRequest {
    pub fn new(visite_id: impl Into<String>, text: Option<String>, images: Vec<ImageAttachment>) -> Self {
        Self {
            visite_id: visite_id.into(),
            text: text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            images,
        }
    }

    /// A message needs text or at least one image.
    pub fn validate(&self) -> AppResult<()> {
        if self.text.is_none() && self.images.is_empty() {
            return Err(AppError::ValidationError(
                "Le message doit contenir du texte ou une image".to_string(),
            ));
        }
        if self.images.len() > MAX_IMAGES_PER_MESSAGE {
            return Err(AppError::ValidationError(format!(
                "{} images au maximum par message",
                MAX_IMAGES_PER_MESSAGE
            )));
        }
        self.images.iter().try_for_each(ImageAttachment::validate)
    }

    pub fn is_multipart(&self) -> bool {
        !self.images.is_empty()
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "visiteId": self.visite_id,
            "text": self.text_or_empty(),
        })
    }
}
