use clap::Subcommand;
use reqwest::Method;
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Create a new account")]
    Signup {
        #[arg(help = "Email")]
        email: String,
        #[arg(help = "Display name")]
        name: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Forget the stored token")]
    Logout,

    #[command(about = "Show your status line")]
    Status,

    #[command(about = "Change your status line")]
    SetStatus {
        #[arg(help = "New status")]
        status: String,
    },

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Signup { email, name, password } => {
            let password = prompt_secret("Password", password)?;
            let env_config = load_environment_config()?;
            let body = json!({ "email": email, "name": name, "password": password });

            let response = ApiClient::new(&env_config)
                .json(Method::PUT, "/auth/signup", &body)
                .await?;
            output_success(
                &output_format,
                &format!("Created account for {}", email),
                Some(json!({ "userId": response["userId"] })),
            )
        }
        AuthCommands::Login { email, password } => {
            let password = prompt_secret("Password", password)?;
            let mut env_config = load_environment_config()?;
            let body = json!({ "email": email, "password": password });

            let response = ApiClient::new(&env_config)
                .json(Method::POST, "/auth/login", &body)
                .await?;
            let token = response
                .get("token")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Login response did not include a token"))?;
            let user_id = response.get("userId").and_then(Value::as_str).unwrap_or_default();

            env_config.set_session(token.to_string(), user_id.to_string(), email.clone());
            save_environment_config(&env_config)?;

            output_success(
                &output_format,
                &format!("Logged in as {}", email),
                Some(json!({ "userId": user_id })),
            )
        }
        AuthCommands::Logout => {
            let mut env_config = load_environment_config()?;
            env_config.clear_session();
            save_environment_config(&env_config)?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let env_config = load_environment_config()?;
            let client = ApiClient::new(&env_config);
            client.require_token()?;
            let response = client.get("/auth/status").await?;
            output_value(&output_format, &response)
        }
        AuthCommands::SetStatus { status } => {
            let env_config = load_environment_config()?;
            let client = ApiClient::new(&env_config);
            client.require_token()?;
            let response = client
                .json(Method::PATCH, "/auth/status", &json!({ "status": status }))
                .await?;
            let message = response.get("message").and_then(Value::as_str).unwrap_or("User updated.");
            output_success(&output_format, message, Some(json!({ "status": status })))
        }
        AuthCommands::Whoami => {
            let env_config = load_environment_config()?;
            let client = ApiClient::new(&env_config);
            client.require_token()?;
            let response = client.get("/auth/user").await?;
            output_value(&output_format, &response)
        }
    }
}
