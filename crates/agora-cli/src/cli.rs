//! Argument parsing and command dispatch.

use std::path::PathBuf;

use agora_config::ForumConfig;
use agora_core::DEFAULT_LANGUAGE;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands::config::handle_config_show;
use crate::commands::theme::{handle_theme_check, handle_theme_item, handle_theme_list};
use crate::error::{CliError, CliResult};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = load_config(ForumConfig::from_env);
    match cli.command {
        Command::Theme(theme) => match theme {
            ThemeCommand::Check(args) => handle_theme_check(&args, cli.output),
            ThemeCommand::Item(args) => handle_theme_item(&config?, &args, cli.output).await,
            ThemeCommand::List => handle_theme_list(&config?, cli.output),
        },
        Command::Config(ConfigCommand::Show) => handle_config_show(&config?),
    }
}

fn load_config<F>(load: F) -> CliResult<ForumConfig>
where
    F: FnOnce() -> agora_config::ConfigResult<ForumConfig>,
{
    load().map_err(|err| {
        let detail = match &err {
            agora_config::ConfigError::InvalidField {
                value: Some(value),
                reason,
                ..
            } => format!(" ({reason}: {value})"),
            agora_config::ConfigError::InvalidField { reason, .. } => format!(" ({reason})"),
            agora_config::ConfigError::MissingField { .. } => String::new(),
        };
        CliError::validation(format!("{err}: {}{detail}", err.field()))
    })
}

#[derive(Parser)]
#[command(name = "agora", about = "Operator CLI for Agora forum themes and configuration")]
pub(crate) struct Cli {
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Inspect theme files.
    #[command(subcommand)]
    Theme(ThemeCommand),
    /// Inspect host configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
pub(crate) enum ThemeCommand {
    /// Validate a theme file name and parse the document.
    Check(ThemeCheckArgs),
    /// Resolve one theme item offline.
    Item(ThemeItemArgs),
    /// List valid theme files in the configured theme directory.
    List,
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommand {
    /// Print the resolved configuration as JSON.
    Show,
}

#[derive(Args)]
pub(crate) struct ThemeCheckArgs {
    /// Path to the theme `.xml` file.
    pub(crate) file: PathBuf,
}

#[derive(Args)]
pub(crate) struct ThemeItemArgs {
    /// Path to the theme `.xml` file.
    pub(crate) file: PathBuf,
    /// Page name, case-insensitive.
    pub(crate) page: String,
    /// Resource tag, case-insensitive.
    pub(crate) tag: String,
    /// Language code used for the lookup.
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    pub(crate) language: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
