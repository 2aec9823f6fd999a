//! Integration tests for the generation flow
//!
//! These tests drive a full Runtime against a temporary store with a
//! scripted generative client in place of the network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serial_test::serial;
use tempfile::TempDir;

use petitioner::config::Config;
use petitioner::domain::{CaseType, Draft, PetitionStatus};
use petitioner::generation::{GenerationError, GenerationState, STATUS_GENERATED};
use petitioner::llm::{GenerativeClient, LlmError};
use petitioner::runtime::{Runtime, StartupConfig};

// =============================================================================
// Helpers
// =============================================================================

/// Replies with the queued results in order, then with an error
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies.lock().unwrap().pop_front().unwrap_or(Err(LlmError::EmptyResult))
    }
}

fn set_api_key() {
    unsafe {
        std::env::set_var("GEMINI_API_KEY", "test-key");
    }
}

fn config_in(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.store_dir = temp.path().to_path_buf();
    config.llm.retry.base_delay_ms = 1;
    config.llm.retry.max_jitter_ms = 1;
    config
}

async fn runtime_with(temp: &TempDir, client: Arc<ScriptedClient>) -> Runtime {
    set_api_key();
    Runtime::init_with_client(config_in(temp), StartupConfig::default(), client)
        .await
        .expect("Failed to init runtime")
}

fn ana_draft() -> Draft {
    let mut draft = Draft::new();
    draft.set_case_type(CaseType::AgeRetirement);
    draft.set_court("Juizado Especial Federal de Campinas");
    draft.set_plaintiff_name("Ana");
    draft.set_plaintiff_national_id("123.456.789-00");
    draft.set_plaintiff_address("Rua das Flores, 10, Campinas/SP");
    draft.set_plaintiff_occupation("Agricultora");
    draft.set_defendant_name("INSS");
    draft.set_defendant_address("Av. Brasil, 1000, Brasília/DF");
    draft.set_lawyer_name("Dr. Carlos");
    draft.set_lawyer_bar_number("OAB/SP 12345");
    draft.set_facts_narrative("A autora trabalhou no campo por 30 anos e teve o benefício negado.");
    draft.select_attachments(&["docs/cnis.pdf", "docs/rg.pdf"]);
    draft
}

// =============================================================================
// Generation Tests
// =============================================================================

#[tokio::test]
#[serial]
async fn test_signed_in_generation_lands_in_history() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![Ok("EXCELENTÍSSIMO SENHOR JUIZ...".to_string())]);
    let runtime = runtime_with(&temp, client.clone()).await;

    let ana = runtime.session.sign_up("ana@example.com", "segredo123").await.unwrap();
    let generated = runtime.generation.submit(&ana_draft(), Some(&ana)).await.unwrap();

    assert_eq!(generated.text, "EXCELENTÍSSIMO SENHOR JUIZ...");
    assert!(generated.record_id.is_some());
    assert_eq!(runtime.generation.status_message().as_deref(), Some(STATUS_GENERATED));

    let records = runtime.history.snapshot(&ana).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(Some(&record.id), generated.record_id.as_ref());
    assert_eq!(record.owner_id, ana.uid);
    assert_eq!(record.app_id, runtime.app_id);
    assert_eq!(record.status, PetitionStatus::Generated);
    assert_eq!(record.generated_text, generated.text);
    assert_eq!(record.draft, ana_draft());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_prompt_carries_draft_fields() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![Ok("texto".to_string())]);
    let runtime = runtime_with(&temp, client.clone()).await;

    runtime.generation.submit(&ana_draft(), None).await.unwrap();

    let prompts = client.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("Tipo de Petição: Concessão de Aposentadoria por Idade"));
    assert!(prompt.contains("Ana"));
    assert!(prompt.contains("INSS"));
    assert!(prompt.contains("cnis.pdf, rg.pdf"));
    assert!(!prompt.contains("docs/"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_generation_without_identity_saves_nothing() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![Ok("texto".to_string())]);
    let runtime = runtime_with(&temp, client).await;

    let generated = runtime.generation.submit(&ana_draft(), None).await.unwrap();
    assert_eq!(generated.text, "texto");
    assert!(generated.record_id.is_none());

    let ana = runtime.session.sign_up("ana@example.com", "segredo123").await.unwrap();
    assert!(runtime.history.snapshot(&ana).await.unwrap().is_empty());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_rate_limits_are_retried_until_success() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![
        Err(LlmError::RateLimited),
        Err(LlmError::RateLimited),
        Ok("terceira tentativa".to_string()),
    ]);
    let runtime = runtime_with(&temp, client.clone()).await;

    let generated = runtime.generation.submit(&ana_draft(), None).await.unwrap();
    assert_eq!(generated.text, "terceira tentativa");
    assert_eq!(client.prompts().len(), 3);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_api_error_fails_without_retry() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![Err(LlmError::ApiError {
        status: 500,
        message: "boom".to_string(),
    })]);
    let runtime = runtime_with(&temp, client.clone()).await;

    let ana = runtime.session.sign_up("ana@example.com", "segredo123").await.unwrap();
    let err = runtime.generation.submit(&ana_draft(), Some(&ana)).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(client.prompts().len(), 1);
    assert!(matches!(runtime.generation.state(), GenerationState::Failed { .. }));
    let status = runtime.generation.status_message().unwrap();
    assert!(status.starts_with("Ocorreu um erro:"));
    assert!(status.contains("500"));
    assert!(runtime.history.snapshot(&ana).await.unwrap().is_empty());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_export_writes_generated_text() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let out = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![Ok("PETIÇÃO INICIAL".to_string())]);
    let runtime = runtime_with(&temp, client).await;

    assert!(matches!(
        runtime.generation.export_text(out.path()),
        Err(GenerationError::NotGenerated)
    ));

    runtime.generation.submit(&ana_draft(), None).await.unwrap();
    let path = runtime.generation.export_text(out.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), "peticao_previdenciaria.txt");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "PETIÇÃO INICIAL");

    runtime.shutdown().await.unwrap();
}

// =============================================================================
// Session and History Tests
// =============================================================================

#[tokio::test]
#[serial]
async fn test_session_survives_restart() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let runtime = runtime_with(&temp, ScriptedClient::new(vec![Ok("texto".to_string())])).await;
    let ana = runtime.session.sign_up("ana@example.com", "segredo123").await.unwrap();
    runtime.generation.submit(&ana_draft(), Some(&ana)).await.unwrap();
    runtime.shutdown().await.unwrap();

    let runtime = runtime_with(&temp, ScriptedClient::new(vec![])).await;
    assert_eq!(runtime.session.current(), Some(ana.clone()));
    assert_eq!(runtime.history.snapshot(&ana).await.unwrap().len(), 1);

    runtime.session.sign_out().await.unwrap();
    runtime.shutdown().await.unwrap();

    let runtime = runtime_with(&temp, ScriptedClient::new(vec![])).await;
    assert!(runtime.session.current().is_none());
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_initial_token_signs_in_once() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let runtime = runtime_with(&temp, ScriptedClient::new(vec![])).await;
    let ana = runtime.session.sign_up("ana@example.com", "segredo123").await.unwrap();
    runtime.session.sign_out().await.unwrap();
    let token = runtime
        .local_identity
        .as_ref()
        .unwrap()
        .mint_custom_token("ana@example.com")
        .await
        .unwrap();
    runtime.shutdown().await.unwrap();

    set_api_key();
    let startup = StartupConfig {
        initial_auth_token: Some(token),
        ..StartupConfig::default()
    };
    let runtime = Runtime::init_with_client(config_in(&temp), startup.clone(), ScriptedClient::new(vec![]))
        .await
        .unwrap();
    assert_eq!(runtime.session.current().map(|i| i.uid), Some(ana.uid.clone()));
    runtime.session.sign_out().await.unwrap();
    runtime.shutdown().await.unwrap();

    // The token was consumed by the first redemption
    let runtime = Runtime::init_with_client(config_in(&temp), startup, ScriptedClient::new(vec![]))
        .await
        .unwrap();
    assert!(runtime.session.current().is_none());
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_history_is_scoped_to_owner_and_live() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let client = ScriptedClient::new(vec![Ok("de ana".to_string()), Ok("de bia".to_string())]);
    let runtime = runtime_with(&temp, client).await;

    let ana = runtime.session.sign_up("ana@example.com", "segredo123").await.unwrap();
    let bia = runtime.session.sign_up("bia@example.com", "segredo456").await.unwrap();

    let mut feed = runtime.history.subscribe(&ana);
    let first = tokio::time::timeout(Duration::from_secs(2), feed.next()).await.unwrap().unwrap();
    assert!(first.is_empty());

    runtime.generation.submit(&ana_draft(), Some(&ana)).await.unwrap();
    let listing = tokio::time::timeout(Duration::from_secs(2), feed.next()).await.unwrap().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].generated_text, "de ana");

    runtime.generation.submit(&ana_draft(), Some(&bia)).await.unwrap();
    assert!(tokio::time::timeout(Duration::from_millis(200), feed.next()).await.is_err());
    assert_eq!(runtime.history.snapshot(&bia).await.unwrap()[0].generated_text, "de bia");

    feed.cancel();
    runtime.shutdown().await.unwrap();
}
