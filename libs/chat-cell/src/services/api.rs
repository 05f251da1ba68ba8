use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_api::{MultipartPart, RestClient};
use shared_config::AppConfig;
use shared_models::AppResult;

use crate::models::{ChatMessage, SendMessageRequest};

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_messages(&self, visit_id: &str) -> AppResult<Vec<ChatMessage>>;

    /// Returns the stored message when the server echoes it back.
    async fn send_message(&self, request: &SendMessageRequest) -> AppResult<Option<ChatMessage>>;

    async fn mark_as_read(&self, visit_id: &str) -> AppResult<()>;
}

pub struct HttpChatApi {
    rest: RestClient,
}

impl HttpChatApi {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }

    pub fn with_client(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_messages(&self, visit_id: &str) -> AppResult<Vec<ChatMessage>> {
        let messages: Vec<ChatMessage> = self
            .rest
            .get_with_query("/messages", &[("visiteId", visit_id)])
            .await?;
        debug!("Fetched {} messages for visit {}", messages.len(), visit_id);
        Ok(messages)
    }

    async fn send_message(&self, request: &SendMessageRequest) -> AppResult<Option<ChatMessage>> {
        let echoed = if request.is_multipart() {
            let fields = vec![
                ("visiteId".to_string(), request.visite_id.clone()),
                ("text".to_string(), request.text_or_empty().to_string()),
            ];
            let files = request
                .images
                .iter()
                .map(|image| MultipartPart {
                    field: "images".to_string(),
                    file_name: image.file_name.clone(),
                    content_type: image.content_type.clone(),
                    bytes: image.bytes.clone(),
                })
                .collect();
            self.rest
                .post_multipart::<ChatMessage>("/messages", fields, files)
                .await?
        } else {
            self.rest
                .request_optional::<ChatMessage>(Method::POST, "/messages", Some(request.to_json()))
                .await?
        };

        info!(
            "Message sent on visit {} ({} image(s))",
            request.visite_id,
            request.images.len()
        );
        Ok(echoed.filter(|message| !message.id.is_empty()))
    }

    async fn mark_as_read(&self, visit_id: &str) -> AppResult<()> {
        self.rest
            .request_optional::<Value>(Method::POST, "/messages/read", Some(json!({ "visiteId": visit_id })))
            .await?;
        Ok(())
    }
}
