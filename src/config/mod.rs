pub mod loader;
pub mod wiring;

// Re-export commonly used types
pub use loader::{ConfigLoader, CONFIG_FILE_NAME, LOG_ENV_VAR};
pub use wiring::{ContextEntry, LoggingSection, ServiceEntry, WiringConfig};
