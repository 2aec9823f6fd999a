//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;
use crate::domain::Draft;

/// Name of the petition template
pub const PETITION_TEMPLATE: &str = "petition";

/// Separator for attachment names in the prompt
const ATTACHMENT_SEPARATOR: &str = ", ";

/// Flattened draft fields for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    /// Case type label, empty when unset
    pub case_type: String,
    pub court: String,
    pub plaintiff_name: String,
    pub plaintiff_national_id: String,
    pub plaintiff_address: String,
    pub plaintiff_occupation: String,
    pub defendant_name: String,
    pub defendant_address: String,
    pub lawyer_name: String,
    pub lawyer_bar_number: String,
    pub facts_narrative: String,
    /// Attachment names joined with ", "
    pub attached_files: String,
}

impl From<&Draft> for PromptContext {
    fn from(draft: &Draft) -> Self {
        Self {
            case_type: draft.case_type.map(|c| c.label().to_string()).unwrap_or_default(),
            court: draft.court.clone(),
            plaintiff_name: draft.plaintiff.name.clone(),
            plaintiff_national_id: draft.plaintiff.national_id.clone(),
            plaintiff_address: draft.plaintiff.address.clone(),
            plaintiff_occupation: draft.plaintiff.occupation.clone(),
            defendant_name: draft.defendant.name.clone(),
            defendant_address: draft.defendant.address.clone(),
            lawyer_name: draft.lawyer.name.clone(),
            lawyer_bar_number: draft.lawyer.bar_number.clone(),
            facts_narrative: draft.facts_narrative.clone(),
            attached_files: draft.attached_file_names.join(ATTACHMENT_SEPARATOR),
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.petitioner/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader rooted at `base` (usually the working directory)
    pub fn new(base: &Path) -> Self {
        debug!(?base, "PromptLoader::new: called");
        let user_dir = base.join(".petitioner/prompts");
        let user_dir_exists = user_dir.exists();
        debug!(?user_dir, %user_dir_exists, "PromptLoader::new: checking user override directory");

        Self {
            hbs: Self::engine(),
            user_dir: if user_dir_exists { Some(user_dir) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks the user override directory first, then the embedded set.
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in user override");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Build the generation prompt for `draft`
    ///
    /// Pure: the same draft always renders the same prompt.
    pub fn petition_prompt(&self, draft: &Draft) -> Result<String> {
        debug!("PromptLoader::petition_prompt: called");
        let prompt = self.render(PETITION_TEMPLATE, &PromptContext::from(draft))?;
        info!(prompt_len = prompt.len(), "Rendered petition prompt");
        Ok(prompt)
    }
}
