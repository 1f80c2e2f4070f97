pub mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "backoffice-api")]
#[command(about = "Back-office API server and maintenance commands")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Print command output as JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Write default menu, configuration and role data")]
    Seed,

    #[command(about = "Issue a bearer token for the /system endpoints")]
    Token(commands::token::TokenArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`. JSON lines when configured.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.api.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::config().clone();

    match cli.command {
        Commands::Serve(args) => commands::serve::handle(args, config).await,
        Commands::Migrate => commands::migrate::handle(config).await,
        Commands::Seed => commands::seed::handle(config, output_format).await,
        Commands::Token(args) => commands::token::handle(args, config, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from(["backoffice-api", "serve", "--memory", "--seed"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert!(args.memory);
                assert!(args.seed);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_token_roles() {
        let cli = Cli::try_parse_from([
            "backoffice-api",
            "--json",
            "token",
            "--user-id",
            "1",
            "--name",
            "Admin",
            "--role",
            "Super Admin",
            "--role",
            "Admin",
        ])
        .unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Token(args) => {
                assert_eq!(args.user_id, 1);
                assert_eq!(args.roles, vec!["Super Admin", "Admin"]);
            }
            _ => panic!("expected token"),
        }
    }
}
