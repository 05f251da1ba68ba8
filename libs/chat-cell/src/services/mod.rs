pub mod api;
pub mod gateway;

pub use api::{ChatApi, HttpChatApi};
pub use gateway::{ChatGateway, MessageSnapshot};
