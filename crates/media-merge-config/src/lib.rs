pub mod config;
pub mod paths;

pub use config::{Config, ConfigError, MergeOptions, ServerConfig};
pub use paths::{base_path_override, PathManager};
