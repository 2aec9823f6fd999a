//! Petitioner - social-security petition drafting
//!
//! CLI entry point.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use futures::StreamExt;
use tracing::{debug, info};

use petitioner::cli::{AdminCommand, Cli, Command, DraftCommand, OutputFormat, generate_after_help, get_log_path};
use petitioner::config::Config;
use petitioner::domain::{CaseType, Draft, PetitionRecord};
use petitioner::generation::{Generated, STATUS_GENERATING, failure_message};
use petitioner::prompts::PromptLoader;
use petitioner::runtime::{Runtime, StartupConfig};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Signup { email, password } => cmd_signup(config, &email, &password).await,
        Command::Signin { email, password } => cmd_signin(config, &email, &password).await,
        Command::Signout => cmd_signout(config).await,
        Command::Whoami => cmd_whoami(config).await,
        Command::Draft { command } => match command {
            DraftCommand::Template { output, case_type } => cmd_draft_template(output.as_deref(), case_type),
            DraftCommand::Check { draft } => cmd_draft_check(&draft),
        },
        Command::Prompt { draft, attachments } => cmd_prompt(&draft, &attachments),
        Command::Generate {
            draft,
            attachments,
            export,
            review,
        } => cmd_generate(config, &draft, &attachments, export.as_deref(), review).await,
        Command::History { follow, format } => cmd_history(config, follow, format).await,
        Command::Admin { command } => match command {
            AdminCommand::MintToken { email } => cmd_mint_token(config, &email).await,
        },
    }
}

async fn start(config: Config) -> Result<Runtime> {
    Runtime::init(config, StartupConfig::from_env()).await
}

/// Read a draft file, replacing its attachments when any were given
fn load_draft(path: &Path, attachments: &[PathBuf]) -> Result<Draft> {
    debug!(?path, attachment_count = attachments.len(), "load_draft: called");
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read draft {}", path.display()))?;
    let mut draft = Draft::from_yaml(&content).with_context(|| format!("Failed to parse draft {}", path.display()))?;
    if !attachments.is_empty() {
        draft.select_attachments(attachments);
    }
    Ok(draft)
}

fn print_record(record: &PetitionRecord) {
    println!(
        "{}  {}  {}  {}",
        record.created_at_utc().format("%Y-%m-%d %H:%M"),
        record.id.dimmed(),
        record.title().bold(),
        record.draft.plaintiff.name
    );
}

fn print_listing(records: &[PetitionRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No petitions yet.");
            }
            for record in records {
                print_record(record);
            }
        }
    }
    Ok(())
}

async fn cmd_signup(config: Config, email: &str, password: &str) -> Result<()> {
    debug!(%email, "cmd_signup: called");
    let runtime = start(config).await?;
    let result = runtime.session.sign_up(email, password).await;
    runtime.shutdown().await?;
    match result {
        Ok(identity) => {
            println!("{} Signed up as {}", "\u{2713}".green(), identity.email.bold());
            Ok(())
        }
        Err(e) => Err(eyre!(e.user_message())),
    }
}

async fn cmd_signin(config: Config, email: &str, password: &str) -> Result<()> {
    debug!(%email, "cmd_signin: called");
    let runtime = start(config).await?;
    let result = runtime.session.sign_in(email, password).await;
    runtime.shutdown().await?;
    match result {
        Ok(identity) => {
            println!("{} Signed in as {}", "\u{2713}".green(), identity.email.bold());
            Ok(())
        }
        Err(e) => Err(eyre!(e.user_message())),
    }
}

async fn cmd_signout(config: Config) -> Result<()> {
    debug!("cmd_signout: called");
    let runtime = start(config).await?;
    let result = runtime.session.sign_out().await;
    runtime.shutdown().await?;
    result.map_err(|_| eyre!("Erro ao sair. Por favor, tente novamente."))?;
    println!("Signed out.");
    Ok(())
}

async fn cmd_whoami(config: Config) -> Result<()> {
    debug!("cmd_whoami: called");
    let runtime = start(config).await?;
    match runtime.session.current() {
        Some(identity) => println!("{} ({})", identity.email.bold(), identity.uid.dimmed()),
        None => println!("Not signed in."),
    }
    runtime.shutdown().await
}

fn cmd_draft_template(output: Option<&Path>, case_type: Option<CaseType>) -> Result<()> {
    debug!(?output, ?case_type, "cmd_draft_template: called");
    let mut draft = Draft::new();
    if let Some(case_type) = case_type {
        draft.set_case_type(case_type);
    }
    let yaml = draft.to_yaml()?;
    let choices: Vec<String> = CaseType::ALL.iter().map(|c| format!("#   {}", c.label())).collect();
    let content = format!("# case_type is one of:\n{}\n{}", choices.join("\n"), yaml);

    match output {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Draft template written to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn cmd_draft_check(path: &Path) -> Result<()> {
    debug!(?path, "cmd_draft_check: called");
    let draft = load_draft(path, &[])?;
    let missing = draft.missing_fields();
    if missing.is_empty() {
        println!("{} Draft is complete", "\u{2713}".green());
        return Ok(());
    }
    for field in &missing {
        println!("{} {}", "missing:".red(), field);
    }
    Err(eyre!("Draft has {} missing field(s)", missing.len()))
}

fn cmd_prompt(path: &Path, attachments: &[PathBuf]) -> Result<()> {
    debug!(?path, "cmd_prompt: called");
    let draft = load_draft(path, attachments)?;
    let cwd = std::env::current_dir()?;
    println!("{}", PromptLoader::new(&cwd).petition_prompt(&draft)?);
    Ok(())
}

async fn cmd_generate(
    config: Config,
    path: &Path,
    attachments: &[PathBuf],
    export: Option<&Path>,
    review: bool,
) -> Result<()> {
    debug!(?path, ?export, review, "cmd_generate: called");
    let draft = load_draft(path, attachments)?;
    let missing = draft.missing_fields();
    if !missing.is_empty() {
        return Err(eyre!("Draft is incomplete, missing: {}", missing.join(", ")));
    }

    let runtime = start(config).await?;
    let identity = runtime.session.current();
    if identity.is_none() {
        println!("{}", "Not signed in: the petition will not be saved to history.".yellow());
    }

    eprintln!("{}", STATUS_GENERATING.dimmed());
    let result = runtime.generation.submit(&draft, identity.as_ref()).await;

    let outcome = match result {
        Ok(generated) => report_generated(&runtime, &generated, export, review),
        Err(e) => Err(eyre!(failure_message(&e))),
    };

    runtime.shutdown().await?;
    outcome
}

fn report_generated(runtime: &Runtime, generated: &Generated, export: Option<&Path>, review: bool) -> Result<()> {
    println!("{}", generated.text);
    println!();
    if let Some(message) = runtime.generation.status_message() {
        println!("{}", message.green());
    }
    if let Some(id) = &generated.record_id {
        println!("Saved as {}", id.dimmed());
    }
    if let Some(dir) = export {
        let path = runtime.generation.export_text(dir)?;
        println!("Exported to {}", path.display());
    }
    if review {
        runtime.generation.request_review()?;
        if let Some(message) = runtime.generation.status_message() {
            println!("{}", message.cyan());
        }
    }
    Ok(())
}

async fn cmd_history(config: Config, follow: bool, format: OutputFormat) -> Result<()> {
    debug!(follow, ?format, "cmd_history: called");
    let runtime = start(config).await?;
    let Some(identity) = runtime.session.current() else {
        runtime.shutdown().await?;
        return Err(eyre!("Not signed in. Run `pt signin` first."));
    };

    if !follow {
        let records = runtime.history.snapshot(&identity).await?;
        print_listing(&records, format)?;
        return runtime.shutdown().await;
    }

    let mut listings = Box::pin(runtime.history.follow(&runtime.session).into_stream());
    loop {
        tokio::select! {
            listing = listings.next() => match listing {
                Some(records) => {
                    println!("{}", format!("-- {} petition(s) --", records.len()).dimmed());
                    print_listing(&records, format)?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("cmd_history: interrupted");
                break;
            }
        }
    }

    drop(listings);
    runtime.shutdown().await
}

async fn cmd_mint_token(config: Config, email: &str) -> Result<()> {
    debug!(%email, "cmd_mint_token: called");
    let runtime = start(config).await?;
    let result = match &runtime.local_identity {
        Some(local) => local.mint_custom_token(email).await.map_err(|e| eyre!("{}", e)),
        None => Err(eyre!("Custom tokens can only be minted with the local identity provider")),
    };
    runtime.shutdown().await?;

    let token = result?;
    println!("{}", token);
    eprintln!("Use it with: PETITIONER_INITIAL_AUTH_TOKEN={} pt whoami", token);
    Ok(())
}
