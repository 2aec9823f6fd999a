//! Petition generation
//!
//! Renders the prompt from a draft, calls the generative client under a
//! `RetryPolicy`, and persists the result as a `PetitionRecord`.

mod error;
mod export;
mod retry;
mod service;

pub use error::GenerationError;
pub use export::{EXPORT_FILE_NAME, export_text};
pub use retry::RetryPolicy;
pub use service::{
    Generated, GenerationService, GenerationState, STATUS_GENERATED, STATUS_GENERATING, STATUS_REVIEW_REQUESTED,
    failure_message,
};
