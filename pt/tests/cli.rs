//! Command-line tests for the `pt` binary
//!
//! Every command runs with its home, config and data directories inside a
//! temporary directory so nothing leaks between tests or onto the host.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use petitioner::domain::{CaseType, Draft};

// =============================================================================
// Helpers
// =============================================================================

fn pt(temp: &TempDir) -> Command {
    let store = temp.path().join("store");
    let mut cmd = Command::cargo_bin("pt").expect("binary builds");
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env("XDG_DATA_HOME", temp.path().join("data"))
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("NO_COLOR", "1")
        .env("GEMINI_API_KEY", "dummy-key")
        .env(
            "PETITIONER_SERVICE_CONFIG",
            format!(r#"{{"storeDir": {:?}}}"#, store.display().to_string()),
        )
        .env_remove("PETITIONER_APP_ID")
        .env_remove("PETITIONER_INITIAL_AUTH_TOKEN")
        .env_remove("PETITIONER_PASSWORD");
    cmd
}

fn complete_draft() -> Draft {
    let mut draft = Draft::new();
    draft.set_case_type(CaseType::MaternityPay);
    draft.set_court("Vara Federal de Londrina");
    draft.set_plaintiff_name("Joana Lima");
    draft.set_plaintiff_national_id("987.654.321-00");
    draft.set_plaintiff_address("Rua Sergipe, 55, Londrina/PR");
    draft.set_plaintiff_occupation("Costureira");
    draft.set_defendant_name("INSS");
    draft.set_defendant_address("Av. Brasil, 1000, Brasília/DF");
    draft.set_lawyer_name("Dra. Paula");
    draft.set_lawyer_bar_number("OAB/PR 4321");
    draft.set_facts_narrative("A autora teve o salário maternidade indeferido.");
    draft
}

fn write_draft(dir: &Path, name: &str, draft: &Draft) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, draft.to_yaml().unwrap()).unwrap();
    path
}

/// Answer one generateContent request with `text`, returning the base URL
fn serve_generation_once(text: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let request = String::from_utf8_lossy(&raw).to_string();
            if let Some(head_end) = request.find("\r\n\r\n") {
                let content_length = request[..head_end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if raw.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        })
        .to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).unwrap();
        String::from_utf8_lossy(&raw).to_string()
    });
    (format!("http://{}", addr), handle)
}

// =============================================================================
// Offline Commands
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    pt(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("signup"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("petitioner.log"));
}

#[test]
fn test_draft_template_lists_case_types() {
    let temp = TempDir::new().unwrap();
    pt(&temp)
        .args(["draft", "template", "-t", "sickness-aid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Benefício Assistencial (LOAS)"))
        .stdout(predicate::str::contains("case_type:"))
        .stdout(predicate::str::contains("Auxílio Doença"))
        .stdout(predicate::str::contains("facts_narrative"));
}

#[test]
fn test_draft_template_output_parses_back() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("novo.yml");
    pt(&temp)
        .args(["draft", "template", "--output"])
        .arg(&out)
        .assert()
        .success();

    let draft = Draft::from_yaml(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(draft, Draft::new());
}

#[test]
fn test_draft_check_reports_missing_fields() {
    let temp = TempDir::new().unwrap();
    let mut draft = complete_draft();
    draft.set_plaintiff_name("");
    draft.set_court("   ");
    let path = write_draft(temp.path(), "draft.yml", &draft);

    pt(&temp)
        .args(["draft", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("plaintiff.name"))
        .stdout(predicate::str::contains("court"))
        .stdout(predicate::str::contains("defendant.name").not());
}

#[test]
fn test_draft_check_accepts_complete_draft() {
    let temp = TempDir::new().unwrap();
    let path = write_draft(temp.path(), "draft.yml", &complete_draft());

    pt(&temp)
        .args(["draft", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Draft is complete"));
}

#[test]
fn test_prompt_renders_draft_and_attachments() {
    let temp = TempDir::new().unwrap();
    let path = write_draft(temp.path(), "draft.yml", &complete_draft());

    pt(&temp)
        .arg("prompt")
        .arg(&path)
        .args(["-a", "anexos/certidao.pdf", "--attach", "anexos/cnis.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tipo de Petição: Salário Maternidade"))
        .stdout(predicate::str::contains("Joana Lima"))
        .stdout(predicate::str::contains("certidao.pdf, cnis.pdf"));
}

#[test]
fn test_generate_refuses_incomplete_draft() {
    let temp = TempDir::new().unwrap();
    let path = write_draft(temp.path(), "draft.yml", &Draft::new());

    pt(&temp)
        .arg("generate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Draft is incomplete"));
}

// =============================================================================
// Session Commands
// =============================================================================

#[test]
fn test_commands_fail_without_api_key() {
    let temp = TempDir::new().unwrap();
    pt(&temp)
        .env_remove("GEMINI_API_KEY")
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn test_signup_whoami_signout() {
    let temp = TempDir::new().unwrap();

    pt(&temp)
        .args(["whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));

    pt(&temp)
        .args(["signup", "--email", "joana@example.com", "--password", "segredo123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed up as joana@example.com"));

    pt(&temp)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("joana@example.com"));

    pt(&temp).arg("signout").assert().success();

    pt(&temp)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));

    pt(&temp)
        .args(["signin", "--email", "joana@example.com"])
        .env("PETITIONER_PASSWORD", "errada")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Falha no login"));
}

#[test]
fn test_signup_rejects_short_password() {
    let temp = TempDir::new().unwrap();
    pt(&temp)
        .args(["signup", "--email", "joana@example.com", "--password", "123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pelo menos 6 caracteres"));

    pt(&temp)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}

#[test]
fn test_history_requires_sign_in() {
    let temp = TempDir::new().unwrap();
    pt(&temp)
        .arg("history")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_generate_saves_and_exports() {
    let temp = TempDir::new().unwrap();
    let draft_path = write_draft(temp.path(), "draft.yml", &complete_draft());
    let (base_url, server) = serve_generation_once("EXCELENTÍSSIMO SENHOR JUIZ FEDERAL");
    std::fs::write(
        temp.path().join(".petitioner.yml"),
        format!("llm:\n  base-url: {}\n", base_url),
    )
    .unwrap();

    pt(&temp)
        .args(["signup", "--email", "joana@example.com", "--password", "segredo123"])
        .assert()
        .success();

    let out = temp.path().join("out");
    std::fs::create_dir_all(&out).unwrap();
    pt(&temp)
        .arg("generate")
        .arg(&draft_path)
        .arg("--export")
        .arg(&out)
        .arg("--review")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXCELENTÍSSIMO SENHOR JUIZ FEDERAL"))
        .stdout(predicate::str::contains("Petição gerada com sucesso!"))
        .stdout(predicate::str::contains("submetida para revisão"));

    let request = server.join().unwrap();
    assert!(request.contains("POST /v1beta/models/"));
    assert!(request.to_ascii_lowercase().contains("x-goog-api-key: dummy-key"));
    assert!(!request.contains("key=dummy-key"));
    assert!(request.contains("Joana Lima"));
    assert_eq!(
        std::fs::read_to_string(out.join("peticao_previdenciaria.txt")).unwrap(),
        "EXCELENTÍSSIMO SENHOR JUIZ FEDERAL"
    );

    pt(&temp)
        .args(["history", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("EXCELENTÍSSIMO SENHOR JUIZ FEDERAL"))
        .stdout(predicate::str::contains("Joana Lima"));
}
