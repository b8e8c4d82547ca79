pub mod error;
pub mod graph;
pub mod jobs;
pub mod runner;
pub mod state;
pub mod storage;
#[cfg(feature = "redis")]
pub mod storage_redis;
pub mod task;

// Re-export commonly used types
pub use error::{FlowError, Result};
pub use graph::{ExecutionResult, ExecutionStatus, Graph, GraphBuilder};
pub use jobs::{DetachedJob, JobPermit, JobTracker, Launch};
pub use runner::FlowRunner;
pub use state::{FlowState, Session};
pub use storage::{DEFAULT_SESSION_TTL, InMemorySessionStorage, SWEEP_EVERY_WRITES, SessionStorage};
#[cfg(feature = "redis")]
pub use storage_redis::RedisSessionStorage;
pub use task::{Choice, NextAction, Reply, Task, TaskResult, TextFormat};
