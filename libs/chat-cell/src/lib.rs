//! # Chat Cell
//!
//! Per-visit conversation between the requester and the listing owner. A
//! gateway can only be opened for an accepted visit.

pub mod models;
pub mod services;

pub use models::{
    ChatMessage, ImageAttachment, SendMessageRequest, MAX_IMAGES_PER_MESSAGE, MAX_IMAGE_BYTES,
};
pub use services::{ChatApi, ChatGateway, HttpChatApi, MessageSnapshot};
