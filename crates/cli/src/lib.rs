pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use lynco_core::config::{ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "lynco",
    about = "Lynco operator CLI",
    long_about = "Apply Lynco database migrations and check runtime readiness.",
    after_help = "Examples:\n  lynco migrate\n  lynco --config deploy/lynco.toml doctor --json"
)]
pub struct Cli {
    #[command(flatten)]
    source: ConfigSource,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConfigSource {
    #[arg(long, global = true, help = "Read configuration from this TOML file (must exist)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url for this invocation")]
    database_url: Option<String>,
}

impl ConfigSource {
    fn into_load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                database_url: self.database_url,
                ..ConfigOverrides::default()
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and print a JSON status line")]
    Migrate,
    #[command(about = "Check configuration, database connectivity, and schema version")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.source.into_load_options();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
