pub mod chat;
pub mod prompt;
pub mod providers;
pub mod sessions;
pub mod storage;

pub use prompt::PromptStore;
pub use sessions::SessionRegistry;
pub use storage::{ImageStore, LocalStorage, S3Storage, Storage};
