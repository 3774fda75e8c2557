pub mod config;
pub mod content;
pub mod extractor;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod scheduler;
pub mod scraper;
pub mod store;
pub mod tracker;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
