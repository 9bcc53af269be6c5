use anyhow::Context;
use bookstore_auth::{NewIdentity, SqlIdentityStore, ROLE_CUSTOMER};
use bookstore_db::Database;
use bookstore_kernel::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Bookstore service administration")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending schema migrations and exit
    Migrate,
    /// Register a login identity
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "BOOKSTORE_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Repeat to grant several roles
        #[arg(long = "role", default_value = ROLE_CUSTOMER)]
        roles: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => bookstore_api::run(settings).await,
        Command::Migrate => {
            let applied = bookstore_api::migrate(&settings).await?;
            tracing::info!(applied, "migrations complete");
            Ok(())
        }
        Command::CreateUser {
            username,
            email,
            password,
            roles,
        } => {
            bookstore_api::migrate(&settings).await?;
            let db = Database::connect(
                &settings.database.url,
                settings.database.max_connections,
                settings.database.operation_timeout(),
            )
            .await
            .context("failed to open database")?;

            let identity = SqlIdentityStore::new(db.clone())
                .create_user(&NewIdentity {
                    username,
                    email,
                    password,
                    roles,
                })
                .await
                .context("failed to create user")?;
            db.close().await;

            tracing::info!(username = %identity.username, id = %identity.id, "user created");
            Ok(())
        }
    }
}
