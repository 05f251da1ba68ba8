pub mod rest;

pub use rest::{MultipartPart, RestClient};
