//! Typed inbound events and payload parsing.
//!
//! Three external signals drive the controller: an object landing in storage,
//! the build stage finishing an image, and the training backend reporting a
//! job status change.

mod storage;
mod types;

pub use storage::parse_storage_notification;
pub use types::{
    BuildCompletedEvent, EventError, ObjectCreatedEvent, TrainingState, TrainingStatusEvent,
};
