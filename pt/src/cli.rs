//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::CaseType;
use crate::runtime::{ENV_APP_ID, ENV_INITIAL_AUTH_TOKEN, ENV_SERVICE_CONFIG};

/// Petitioner - social-security petition drafting
#[derive(Parser)]
#[command(
    name = "pt",
    about = "Drafts Brazilian social-security petitions with a generative-text API",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "PETITIONER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign in with email and password
    Signin {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "PETITIONER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the saved session
    Signout,

    /// Show the signed-in identity
    Whoami,

    /// Work with draft files
    Draft {
        #[command(subcommand)]
        command: DraftCommand,
    },

    /// Print the prompt a draft would be sent with
    Prompt {
        /// Draft YAML file
        draft: PathBuf,

        /// Attached document (repeatable); replaces the draft's list
        #[arg(short = 'a', long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// Generate a petition from a draft
    Generate {
        /// Draft YAML file
        draft: PathBuf,

        /// Attached document (repeatable); replaces the draft's list
        #[arg(short = 'a', long = "attach")]
        attachments: Vec<PathBuf>,

        /// Write the petition as plain text into this directory
        #[arg(short = 'o', long)]
        export: Option<PathBuf>,

        /// Submit the generated petition for review
        #[arg(long)]
        review: bool,
    },

    /// List generated petitions, newest first
    History {
        /// Keep listening and reprint on every new petition
        #[arg(short, long)]
        follow: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Administrative tasks for the local identity provider
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

/// Draft file subcommands
#[derive(Debug, Subcommand)]
pub enum DraftCommand {
    /// Write an empty draft template
    Template {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Preselect the case type (key or label)
        #[arg(short = 't', long)]
        case_type: Option<CaseType>,
    },

    /// Report required fields that are still empty
    Check {
        /// Draft YAML file
        draft: PathBuf,
    },
}

/// Admin subcommands
#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Issue a single-use sign-in token for an account
    MintToken {
        #[arg(short, long)]
        email: String,
    },
}

/// Output format for listings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format '{}'. Expected: text, json", s)),
        }
    }
}

/// Result of checking an environment variable
pub struct EnvCheck {
    pub name: &'static str,
    pub set: bool,
}

impl EnvCheck {
    pub fn check(name: &'static str) -> Self {
        let set = std::env::var(name).map(|v| !v.trim().is_empty()).unwrap_or(false);
        debug!(name, set, "EnvCheck::check: called");
        Self { name, set }
    }
}

/// Check the environment variables petitioner reads
pub fn check_environment() -> Vec<EnvCheck> {
    vec![
        EnvCheck::check("GEMINI_API_KEY"),
        EnvCheck::check(ENV_SERVICE_CONFIG),
        EnvCheck::check(ENV_APP_ID),
        EnvCheck::check(ENV_INITIAL_AUTH_TOKEN),
    ]
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("petitioner")
        .join("logs")
        .join("petitioner.log")
}

/// Generate the after_help text with environment checks
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Environment:\n");
    for check in check_environment() {
        let icon = if check.set { "\u{2705}" } else { "\u{274C}" };
        let status = if check.set { "set" } else { "not set" };
        help.push_str(&format!("  {} {:<32} {}\n", icon, check.name, status));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("PLAIN".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_parse_generate_with_attachments() {
        let cli = Cli::try_parse_from([
            "pt",
            "generate",
            "draft.yml",
            "-a",
            "laudo.pdf",
            "--attach",
            "cnis.pdf",
            "--export",
            "out",
        ])
        .unwrap();
        match cli.command {
            Command::Generate {
                draft,
                attachments,
                export,
                review,
            } => {
                assert_eq!(draft, PathBuf::from("draft.yml"));
                assert_eq!(attachments, vec![PathBuf::from("laudo.pdf"), PathBuf::from("cnis.pdf")]);
                assert_eq!(export, Some(PathBuf::from("out")));
                assert!(!review);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_template_case_type() {
        let cli = Cli::try_parse_from(["pt", "draft", "template", "-t", "maternity-pay"]).unwrap();
        match cli.command {
            Command::Draft {
                command: DraftCommand::Template { case_type, output },
            } => {
                assert_eq!(case_type, Some(CaseType::MaternityPay));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_after_help_mentions_log_path() {
        let help = generate_after_help();
        assert!(help.contains("GEMINI_API_KEY"));
        assert!(help.contains("petitioner.log"));
    }
}
