// libs/chat-cell/src/services/gateway.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_models::{AppError, AppResult, SessionContext};
use visit_cell::{LogicalStatus, VisitRequest};

use crate::models::{ChatMessage, ImageAttachment, SendMessageRequest};
use crate::services::api::ChatApi;

pub type MessageSnapshot = Arc<Vec<ChatMessage>>;

/// Conversation attached to one accepted visit.
///
/// Messages are kept sorted by `(created_at, id)`. A message keeps the sort
/// key it had when first seen, so later fetches never move messages that
/// were already delivered.
pub struct ChatGateway {
    api: Arc<dyn ChatApi>,
    session: SessionContext,
    visit_id: String,
    state: RwLock<ChatState>,
}

#[derive(Default)]
struct ChatState {
    messages: MessageSnapshot,
    /// Ids of local copies still waiting for their server counterpart.
    unconfirmed: Vec<String>,
}

impl ChatGateway {
    pub fn open(visit: &VisitRequest, api: Arc<dyn ChatApi>, session: SessionContext) -> AppResult<Self> {
        let visit_id = visit
            .id
            .clone()
            .ok_or_else(|| AppError::ChatUnavailable("Visit has no id yet".to_string()))?;

        if visit.status != LogicalStatus::Accepted {
            return Err(AppError::ChatUnavailable(format!(
                "Visit {} is {}, chat opens once it is accepted",
                visit_id, visit.status
            )));
        }

        debug!("Opening chat for visit {}", visit_id);
        Ok(Self {
            api,
            session,
            visit_id,
            state: RwLock::new(ChatState::default()),
        })
    }

    pub fn visit_id(&self) -> &str {
        &self.visit_id
    }

    pub async fn messages(&self) -> MessageSnapshot {
        Arc::clone(&self.state.read().await.messages)
    }

    pub async fn unread_count(&self) -> usize {
        self.messages()
            .await
            .iter()
            .filter(|m| !m.read && !m.is_from(&self.session.user_id))
            .count()
    }

    pub async fn refresh(&self) -> AppResult<MessageSnapshot> {
        let fetched = self.api.list_messages(&self.visit_id).await.map_err(|e| {
            error!("Failed to fetch messages for visit {}: {}", self.visit_id, e);
            e
        })?;

        let fetched: Vec<ChatMessage> = fetched
            .into_iter()
            .filter(|m| m.visite_id.is_empty() || m.visite_id == self.visit_id)
            .collect();

        Ok(self.merge(fetched, false).await)
    }

    pub async fn send(&self, text: Option<String>, images: Vec<ImageAttachment>) -> AppResult<ChatMessage> {
        let request = SendMessageRequest::new(self.visit_id.clone(), text, images);
        request.validate()?;

        let echoed = self.api.send_message(&request).await.map_err(|e| {
            error!("Failed to send message on visit {}: {}", self.visit_id, e);
            e
        })?;

        let (message, unconfirmed) = match echoed {
            Some(message) => (message, false),
            None => (self.local_message(&request), true),
        };
        self.merge(vec![message.clone()], unconfirmed).await;

        info!("Message {} added to visit {}", message.id, self.visit_id);
        Ok(message)
    }

    /// Marks every message from the other participant as read.
    pub async fn mark_as_read(&self) -> AppResult<usize> {
        let unread = self.unread_count().await;
        if unread == 0 {
            return Ok(0);
        }

        self.api.mark_as_read(&self.visit_id).await?;

        let mut state = self.state.write().await;
        let mut next = state.messages.as_ref().clone();
        for message in next.iter_mut() {
            if !message.is_from(&self.session.user_id) {
                message.read = true;
            }
        }
        state.messages = Arc::new(next);

        debug!("Marked {} message(s) read on visit {}", unread, self.visit_id);
        Ok(unread)
    }

    /// Stand-in for a send the server acknowledged without echoing the message.
    /// It is swapped for the stored message by the next `refresh`.
    fn local_message(&self, request: &SendMessageRequest) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            visite_id: self.visit_id.clone(),
            sender: self.session.user_id.clone(),
            text: request.text_or_empty().to_string(),
            images: request.images.iter().map(|i| i.file_name.clone()).collect(),
            created_at: Utc::now(),
            read: false,
        }
    }

    /// Folds `incoming` into the list. A known id is updated in place; a
    /// server message matching an unconfirmed local copy takes that copy's
    /// place. Either way the message keeps its first-seen sort key.
    async fn merge(&self, incoming: Vec<ChatMessage>, unconfirmed: bool) -> MessageSnapshot {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut next = state.messages.as_ref().clone();

        for message in incoming {
            let slot = next.iter().position(|m| m.id == message.id).or_else(|| {
                next.iter()
                    .position(|m| state.unconfirmed.contains(&m.id) && message.echoes(m))
            });

            match slot {
                Some(index) => {
                    let previous = &mut next[index];
                    if previous.id != message.id {
                        debug!("Message {} confirms local copy {}", message.id, previous.id);
                        state.unconfirmed.retain(|id| *id != previous.id);
                    }
                    let created_at = previous.created_at;
                    *previous = message;
                    previous.created_at = created_at;
                }
                None => {
                    if unconfirmed {
                        state.unconfirmed.push(message.id.clone());
                    }
                    next.push(message);
                }
            }
        }
        next.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let snapshot = Arc::new(next);
        state.messages = Arc::clone(&snapshot);
        snapshot
    }
}
