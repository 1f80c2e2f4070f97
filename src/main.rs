use clap::Parser;

use backoffice_api::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, SECURITY_JWT_SECRET etc. are picked up
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    cli::init_tracing(backoffice_api::config::config());

    if let Err(e) = cli::run(cli).await {
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
            _ => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
