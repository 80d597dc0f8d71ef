pub mod attachment;
pub mod chat_service;
pub mod gateway;
pub mod history_window;
pub mod request;
