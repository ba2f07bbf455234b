pub mod api;
pub mod ollama;
pub mod redis;
