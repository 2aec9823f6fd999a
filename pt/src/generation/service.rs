//! GenerationService - one submission at a time
//!
//! `Idle -> Generating -> {Generated, Failed}`. A settled service accepts a
//! new submission; a submission while `Generating` is rejected with `Busy`
//! before anything is sent.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{EXPORT_FILE_NAME, GenerationError, RetryPolicy, export};
use crate::domain::{Draft, PetitionRecord};
use crate::llm::GenerativeClient;
use crate::prompts::PromptLoader;
use crate::session::Identity;
use crate::state::StateManager;

pub const STATUS_GENERATING: &str = "A gerar a petição, por favor, aguarde...";
pub const STATUS_GENERATED: &str = "Petição gerada com sucesso!";
pub const STATUS_REVIEW_REQUESTED: &str =
    "A sua petição foi submetida para revisão. Receberá a resposta em até 24 horas.";

/// Failure status shown to the user
pub fn failure_message(error: &GenerationError) -> String {
    format!("Ocorreu um erro: {}. Por favor, tente novamente.", error)
}

/// Lifecycle of the current submission
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
    Generated {
        text: String,
        /// Id of the persisted record, if persistence happened
        record_id: Option<String>,
    },
    Failed {
        error: String,
    },
}

impl GenerationState {
    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generating)
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub record_id: Option<String>,
}

pub struct GenerationService {
    client: Arc<dyn GenerativeClient>,
    prompts: Arc<PromptLoader>,
    retry: RetryPolicy,
    /// Persistence target; generation still works without it
    state: Option<StateManager>,
    app_id: String,
    export_file_name: String,
    state_tx: watch::Sender<GenerationState>,
    status: Mutex<Option<String>>,
}

impl GenerationService {
    pub fn new(client: Arc<dyn GenerativeClient>, prompts: Arc<PromptLoader>, retry: RetryPolicy) -> Self {
        let (state_tx, _) = watch::channel(GenerationState::Idle);
        Self {
            client,
            prompts,
            retry,
            state: None,
            app_id: String::new(),
            export_file_name: EXPORT_FILE_NAME.to_string(),
            state_tx,
            status: Mutex::new(None),
        }
    }

    /// Persist successful generations to `state` under `app_id`
    pub fn with_store(mut self, state: StateManager, app_id: impl Into<String>) -> Self {
        self.state = Some(state);
        self.app_id = app_id.into();
        self
    }

    pub fn with_export_file_name(mut self, name: impl Into<String>) -> Self {
        self.export_file_name = name.into();
        self
    }

    pub fn state(&self) -> GenerationState {
        self.state_tx.borrow().clone()
    }

    /// Observe state transitions
    pub fn watch(&self) -> watch::Receiver<GenerationState> {
        self.state_tx.subscribe()
    }

    /// Current user-facing status message, if any
    pub fn status_message(&self) -> Option<String> {
        self.status.lock().ok().and_then(|s| s.clone())
    }

    fn set_status(&self, message: impl Into<String>) {
        if let Ok(mut status) = self.status.lock() {
            *status = Some(message.into());
        }
    }

    /// Move to `Generating` unless a submission is already in flight
    fn try_begin(&self) -> bool {
        let mut began = false;
        self.state_tx.send_if_modified(|state| {
            if state.is_generating() {
                false
            } else {
                *state = GenerationState::Generating;
                began = true;
                true
            }
        });
        began
    }

    /// Generate a petition for `draft`
    ///
    /// On success the record is persisted for `owner` when both an owner and
    /// a store are present. Persistence failures are logged, never returned.
    pub async fn submit(&self, draft: &Draft, owner: Option<&Identity>) -> Result<Generated, GenerationError> {
        debug!(has_owner = owner.is_some(), "submit: called");
        if !self.try_begin() {
            debug!("submit: rejected, generation in flight");
            return Err(GenerationError::Busy);
        }
        self.set_status(STATUS_GENERATING);

        match self.generate(draft).await {
            Ok(text) => {
                let record_id = self.persist(draft, &text, owner).await;
                info!(text_len = text.len(), ?record_id, "Petition generated");
                self.state_tx.send_replace(GenerationState::Generated {
                    text: text.clone(),
                    record_id: record_id.clone(),
                });
                self.set_status(STATUS_GENERATED);
                Ok(Generated { text, record_id })
            }
            Err(e) => {
                warn!(error = %e, "Petition generation failed");
                self.set_status(failure_message(&e));
                self.state_tx.send_replace(GenerationState::Failed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn generate(&self, draft: &Draft) -> Result<String, GenerationError> {
        let prompt = self
            .prompts
            .petition_prompt(draft)
            .map_err(|e| GenerationError::Prompt(e.to_string()))?;
        let client = &self.client;
        let prompt = prompt.as_str();
        self.retry
            .run(move |attempt| {
                debug!(attempt, "generate: sending attempt");
                client.generate(prompt)
            })
            .await
    }

    async fn persist(&self, draft: &Draft, text: &str, owner: Option<&Identity>) -> Option<String> {
        let (Some(state), Some(owner)) = (&self.state, owner) else {
            debug!("persist: no store or no identity, skipping");
            return None;
        };
        let record = PetitionRecord::new(self.app_id.clone(), owner.uid.clone(), draft.clone(), text);
        match state.create_petition(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to persist petition; keeping generated text");
                None
            }
        }
    }

    fn generated_text(&self) -> Result<String, GenerationError> {
        match &*self.state_tx.borrow() {
            GenerationState::Generated { text, .. } => Ok(text.clone()),
            _ => Err(GenerationError::NotGenerated),
        }
    }

    /// Write the generated text to `dir`; no state change
    pub fn export_text(&self, dir: &Path) -> Result<PathBuf, GenerationError> {
        debug!(?dir, "export_text: called");
        let text = self.generated_text()?;
        Ok(export::export_text(dir, &self.export_file_name, &text)?)
    }

    /// Mark the generated petition as sent for review
    ///
    /// Only the status message changes; nothing is persisted.
    pub fn request_review(&self) -> Result<(), GenerationError> {
        debug!("request_review: called");
        self.generated_text()?;
        self.set_status(STATUS_REVIEW_REQUESTED);
        Ok(())
    }
}
