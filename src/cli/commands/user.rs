use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use super::persistent_store;
use crate::auth::{Role, TokenService};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::services::AuthService;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create an account, regardless of open registration")]
    Create {
        #[arg(long, help = "Login name")]
        username: String,

        #[arg(long, help = "Plain-text password; stored as an Argon2 hash")]
        password: String,

        #[arg(long, default_value = "user", help = "admin or user")]
        role: Role,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            username,
            password,
            role,
        } => {
            let store = persistent_store().await?;
            let tokens = TokenService::from_config(&config().security).context("invalid JWT configuration")?;
            let auth = AuthService::new(store.clone(), Arc::new(tokens), false);

            let result = auth.create_user(&username, &password, role).await;
            store.close().await;
            let user = result.map_err(|e| anyhow::anyhow!("{}", e))?;

            output_success(
                &output_format,
                &format!("Created {} account '{}'", user.role, user.username),
                Some(json!({ "user": user })),
            )
        }
    }
}
