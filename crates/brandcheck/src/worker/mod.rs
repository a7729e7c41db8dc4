pub mod job;
pub mod pool;
pub mod queue;

pub use job::{AssetJob, AssetJobResult, EnqueueRequest, JobOrigin};
pub use pool::WorkerPool;
pub use queue::AssetQueue;
