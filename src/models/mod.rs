pub mod chat;
pub mod thread;
