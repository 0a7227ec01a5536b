pub mod config;
pub mod engine;
pub mod handlers;
pub mod json;
pub mod response;
pub mod retry;
pub mod worker;
