use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use server::{
    auth::{mint_token, AuthConfig},
    config::{load_settings, prepare_database_url, MAX_TOKEN_TTL_SECONDS},
};
use shared::{domain::{Role, UserId}, projection};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Operator utilities for a care-connect database.
#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the database url from server.toml and the environment.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        name: String,
        email: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Prints a bearer token for an existing user, signed with the configured secret.
    MintToken {
        user_id: i64,
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS))]
        ttl_seconds: Option<i64>,
    },
    ListConnections {
        user_id: i64,
    },
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let settings = load_settings();
    let database_url =
        prepare_database_url(cli.database_url.as_deref().unwrap_or(&settings.database_url))?;
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open {database_url}"))?;

    match cli.command {
        Command::CreateUser { name, email, role } => {
            let actor = storage.create_user(&name, &email, role).await?;
            info!(user_id = %actor.id, %role, "user created");
            println!("created user_id={} role={}", actor.id, actor.role);
        }
        Command::MintToken {
            user_id,
            ttl_seconds,
        } => {
            let actor = storage
                .actor_by_id(UserId(user_id))
                .await?
                .ok_or_else(|| anyhow!("no user with id {user_id}"))?;
            let cfg = AuthConfig {
                secret: settings.jwt_secret,
                ttl_seconds: ttl_seconds.unwrap_or(settings.token_ttl_seconds),
            };
            println!("{}", mint_token(&cfg, &actor)?);
        }
        Command::ListConnections { user_id } => {
            let actor = storage
                .actor_by_id(UserId(user_id))
                .await?
                .ok_or_else(|| anyhow!("no user with id {user_id}"))?;
            let connections = storage.list_connections_for_user(actor.id).await?;
            for detail in &connections {
                let other = projection::counterparty(detail, &actor);
                println!(
                    "{}\t{}\twith={}\tinitiated_by={}",
                    detail.connection.id,
                    detail.connection.status,
                    other.display_name(),
                    detail.connection.initiated_by
                );
            }
            if connections.is_empty() {
                println!("no connections for user_id={user_id}");
            }
        }
    }

    Ok(())
}
