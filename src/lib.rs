pub mod config;
pub mod logging;
pub mod mailbox;
pub mod message;
pub mod repository;
pub mod store;
