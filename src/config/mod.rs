pub mod loader;
pub mod types;

pub use loader::{load_config, parse_config, DEFAULT_CONFIG_FILE};
pub use types::{Settings, TagsyncConfig};
