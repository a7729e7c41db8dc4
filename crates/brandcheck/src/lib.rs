pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod stages;
pub mod storage;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{BrandcheckError, ConfigError, Result, StorageError, WorkerError};
pub use pipeline::{Pipeline, PipelineConfig, PipelineServices, RunOutcome};
pub use report::{aggregate, ComplianceReport};
pub use secrets::{resolve_secret, SecretError, SecretSource};
pub use worker::{AssetQueue, EnqueueRequest, WorkerPool};
