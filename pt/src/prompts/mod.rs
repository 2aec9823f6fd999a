//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files.
//!
//! Template loading chain:
//! 1. `.petitioner/prompts/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution, with HTML
//! escaping turned off so field values are embedded verbatim.

pub mod embedded;
mod loader;

pub use loader::{PromptContext, PromptLoader};
