pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ChatProviderConfig, ClassifierConfig, ComplianceConfig, Config, LogFormat, StorageConfig,
    TimeoutConfig, TranscriptionConfig,
};
