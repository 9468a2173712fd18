//! Clients for the external services the controller drives.
//!
//! The pipeline runner owns execution history, the training backend runs
//! training jobs and hosts endpoints, and the notifier feeds the approval
//! channel. Each has a trait here plus an HTTP implementation.

mod http;
mod notifier;
mod pipeline_runner;
mod training;
mod types;

pub use notifier::HttpNotifier;
pub use pipeline_runner::HttpPipelineRunner;
pub use training::HttpTrainingBackend;
pub use types::*;
