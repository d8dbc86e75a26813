pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, resolve, ConfigError, DEFAULT_CONFIG_FILE};
pub use schema::{
    ContextConfig, ExportsConfig, FormattingConfig, GenerationConfig, ProcessingConfig,
    ValidationError, ValidationIssue,
};
