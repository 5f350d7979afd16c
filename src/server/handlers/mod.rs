pub mod chat;
pub mod documents;
pub mod progress;
pub mod quiz;
pub mod speech;
pub mod study;
