//! Bazaar CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (application tables and the session store)
//! bz-cli migrate
//!
//! # Create the first admin account
//! bz-cli user create -e ops@example.com -p 'long passphrase' -r admin
//!
//! # Put the marketplace into maintenance mode
//! bz-cli platform maintenance on --message "Back at 14:00 UTC"
//!
//! # End tracked sessions past their idle or absolute limits
//! bz-cli sessions prune
//! ```
//!
//! All commands read `BAZAAR_DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use bazaar_core::Role;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "bz-cli")]
#[command(author, version, about = "Bazaar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Show or change the platform lock flags
    Platform {
        #[command(subcommand)]
        action: PlatformAction,
    },
    /// Maintain tracked sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an account with a password
    Create {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "BAZAAR_NEW_USER_PASSWORD")]
        password: String,

        #[arg(short, long)]
        name: Option<String>,

        /// customer, seller, editor, content_manager or admin
        #[arg(short, long, default_value = "customer")]
        role: Role,
    },
    /// Change the role of an existing account
    SetRole {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        role: Role,
    },
    /// Disable an account and end its sessions
    Disable {
        #[arg(short, long)]
        email: String,
    },
    /// Re-enable a disabled account
    Enable {
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Subcommand)]
enum PlatformAction {
    /// Print the current flags as JSON
    Status,
    /// Switch maintenance mode; turning it on ends non-admin sessions
    Maintenance {
        state: Switch,

        /// Message shown to visitors while maintenance is on
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Lock or unlock checkout
    CheckoutLock { state: Switch },
    /// Lock or unlock self-service registration
    RegistrationLock { state: Switch },
}

#[derive(Subcommand)]
enum SessionsAction {
    /// End sessions that are idle or too old, and delete expired cookie sessions
    Prune {
        #[arg(long, default_value_t = 30)]
        idle_minutes: i64,

        #[arg(long, default_value_t = 12)]
        max_age_hours: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                name,
                role,
            } => {
                commands::user::create(&pool, &email, &password, name.as_deref(), role).await?;
            }
            UserAction::SetRole { email, role } => {
                commands::user::set_role(&pool, &email, role).await?;
            }
            UserAction::Disable { email } => commands::user::set_disabled(&pool, &email, true).await?,
            UserAction::Enable { email } => commands::user::set_disabled(&pool, &email, false).await?,
        },
        Commands::Platform { action } => match action {
            PlatformAction::Status => commands::platform::status(&pool).await?,
            PlatformAction::Maintenance { state, message } => {
                commands::platform::maintenance(&pool, state.is_on(), message).await?;
            }
            PlatformAction::CheckoutLock { state } => {
                commands::platform::checkout_lock(&pool, state.is_on()).await?;
            }
            PlatformAction::RegistrationLock { state } => {
                commands::platform::registration_lock(&pool, state.is_on()).await?;
            }
        },
        Commands::Sessions { action } => match action {
            SessionsAction::Prune {
                idle_minutes,
                max_age_hours,
            } => commands::sessions::prune(&pool, idle_minutes, max_age_hours).await?,
        },
    }
    Ok(())
}
