//! Configuration loading

pub mod env;
pub mod parser;

pub use env::EnvManager;
pub use parser::{display_config_summary, load_config, ConfigParser, LoadedConfig};

pub use crate::models::Config;
