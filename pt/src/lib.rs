//! Petitioner - social-security petition drafting
//!
//! Petitioner turns a structured case draft (plaintiff, defendant, lawyer,
//! facts and attached documents) into the full text of a Brazilian
//! social-security petition using a generative-text API, and keeps a
//! per-account history of everything it generated.
//!
//! # Core Concepts
//!
//! - **One request at a time**: a generation service never has two calls in flight
//! - **Retry only on rate limits**: 429s back off exponentially, everything else is final
//! - **Records are owned**: history is scoped to the application id and the signed-in account
//! - **Live history**: subscribers receive the full listing again after every create
//!
//! # Modules
//!
//! - [`domain`] - Drafts, petition records, accounts and profiles
//! - [`state`] - Store actor and change events
//! - [`llm`] - Generative client trait and Gemini implementation
//! - [`prompts`] - Petition prompt template and rendering
//! - [`generation`] - Submission, retry policy and plain-text export
//! - [`session`] - Identity providers and the signed-in session
//! - [`history`] - Live petition listings
//! - [`runtime`] - Process-wide wiring
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod generation;
pub mod history;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use config::{Config, IdentityConfig, LlmConfig, RetryConfig};
pub use domain::{CaseType, Draft, PetitionRecord, PetitionStatus, Profile, UserAccount};
pub use generation::{Generated, GenerationError, GenerationService, GenerationState, RetryPolicy};
pub use history::{HistoryFeed, HistorySubscription};
pub use llm::{GeminiClient, GenerativeClient, LlmError, create_client};
pub use prompts::{PromptContext, PromptLoader};
pub use runtime::{Runtime, ServiceConfig, StartupConfig};
pub use session::{AuthError, Identity, IdentityProvider, SessionManager};
pub use state::{StateError, StateEvent, StateManager};
