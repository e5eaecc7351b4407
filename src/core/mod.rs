pub mod completion;
pub mod config;
pub mod conversation;
pub mod image;
pub mod message;
pub mod profile;
pub mod reveal;
pub mod storage;
pub mod study_room;
