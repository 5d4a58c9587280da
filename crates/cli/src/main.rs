//! Desguace Murcia CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! dsg-cli migrate
//!
//! # Create a staff user
//! dsg-cli admin create -u admin -e admin@desguacesmurcia.com -p '...' -r admin
//!
//! # Seed shipping zones and provinces, or the default import schedules
//! dsg-cli seed shipping
//! dsg-cli seed schedules
//!
//! # Back up the database
//! dsg-cli backup create
//! dsg-cli backup list
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create staff users
//! - `seed` - Insert reference data
//! - `backup` - Create and list SQL backups

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "dsg-cli")]
#[command(author, version, about = "Desguace Murcia CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage staff users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Insert reference data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Create and list SQL backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new staff user
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`admin` or `manager`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Shipping zones, provinces and a default method
    Shipping,
    /// Default import schedules (inactive)
    Schedules,
}

#[derive(Subcommand)]
enum BackupAction {
    /// Dump the database to a new backup file
    Create,
    /// List backups, newest first
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                username,
                email,
                password,
                role,
            } => {
                commands::admin::create_user(&username, &email, &password, &role).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Shipping => commands::seed::seed_shipping().await?,
            SeedTarget::Schedules => commands::seed::seed_schedules().await?,
        },
        Commands::Backup { action } => match action {
            BackupAction::Create => commands::backup::create().await?,
            BackupAction::List => commands::backup::list().await?,
        },
    }
    Ok(())
}
