pub mod chat;
pub mod init;
pub mod models;
pub mod serve;
pub mod setup;
