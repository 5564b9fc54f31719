mod actor;
mod context;
mod store;

mod domain;
pub use domain::{config, number};

pub mod dirs;

pub use actor::{
  message::PipelineEvent,
  pipeline::{FlusherStats, PipelineConfig, PipelineError, PipelineResult, RetryConfig, RouterStats},
};
pub use context::primality::{DEFAULT_ROUNDS, PrimalityTest};
pub use store::{DIRECTORY_FILE, ShardStore, ShardSummary, StoreError};

mod generator;
pub use generator::{GenerationReport, Generator, GeneratorError, RuntimeConfig};
