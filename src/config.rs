//! Application configuration
//!
//! Runtime capacities, the completion backend and the agent roster, loaded from
//! YAML with built-in defaults for anything left out.

pub mod settings;

pub use settings::{
    AgentConfig, AppConfig, CompletionBackend, CompletionConfig, RuntimeConfig, get_config_file_path, load_config,
    save_config
};
