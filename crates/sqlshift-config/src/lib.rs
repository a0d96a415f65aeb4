pub mod loader;
pub mod model;
pub mod watcher;

pub use loader::ConfigLoader;
pub use model::{AppConfig, LogConfig};
pub use watcher::MigrationsWatcher;
