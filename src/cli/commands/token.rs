use clap::Args;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "User id recorded in audit entries")]
    pub user_id: i64,

    #[arg(long, help = "Display name recorded in audit entries")]
    pub name: String,

    #[arg(long = "role", help = "Role name (repeatable)")]
    pub roles: Vec<String>,
}

pub fn handle(args: TokenArgs, config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let expiry_hours = config.security.jwt_expiry_hours;
    let claims = Claims::new(args.user_id, args.name, args.roles, expiry_hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "token": token,
                "expires_in": expiry_hours * 3600,
                "user": { "id": claims.sub, "name": claims.name, "roles": claims.roles },
            })
        ),
        OutputFormat::Text => println!("{}", token),
    }
    Ok(())
}
