use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Point the CLI at a server")]
    Set {
        #[arg(help = "Server URL, e.g. http://localhost:8080")]
        url: String,
    },

    #[command(about = "Show the configured server")]
    Show,

    #[command(about = "Check server health status from API /health endpoint")]
    Health,

    #[command(about = "Show server information from API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Set { url } => {
            let parsed = url::Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;
            let mut env_config = load_environment_config()?;
            let normalized = parsed.as_str().trim_end_matches('/').to_string();

            if env_config.server_url != normalized {
                // A token from another server is useless here.
                env_config.clear_session();
            }
            env_config.server_url = normalized.clone();
            env_config.update_ping(ServerStatus::Unknown);
            save_environment_config(&env_config)?;

            output_success(
                &output_format,
                &format!("Using server {}", normalized),
                Some(json!({ "server_url": normalized })),
            )
        }
        ServerCommands::Show => {
            let env_config = load_environment_config()?;
            let details = json!({
                "server_url": env_config.server_url,
                "status": env_config.status,
                "last_ping": env_config.last_ping,
                "logged_in_as": env_config.email,
            });
            output_value(&output_format, &details)
        }
        ServerCommands::Health => {
            let mut env_config = load_environment_config()?;
            let status = ping_server(&env_config.server_url).await;
            env_config.update_ping(status);
            save_environment_config(&env_config)?;

            match status {
                ServerStatus::Up => {
                    let health = ApiClient::new(&env_config).get("/health").await?;
                    output_value(&output_format, &health)
                }
                _ => Err(anyhow::anyhow!("Server {} is not responding", env_config.server_url)),
            }
        }
        ServerCommands::Info => {
            let env_config = load_environment_config()?;
            let info = ApiClient::new(&env_config).get("/").await?;
            output_value(&output_format, &info)
        }
    }
}
