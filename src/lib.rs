pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod storage;
pub mod ui;

// Re-export commonly used items
pub use api::{ApiClient, AuthAttachment, CategoryService, EntityService, ExpenseService};
pub use config::Settings;
pub use error::{ApiError, StorageError};
pub use models::{category::Category, expense::Expense};
pub use ui::app::App;
