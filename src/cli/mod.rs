use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod auth;
pub mod inbox;
pub mod serve;
pub mod signin;

use auth::ServiceKind;

#[derive(Subcommand)]
enum Command {
    /// Complete a pending email sign-in for a device
    Signin {
        /// Device identity used to pick the mailbox
        #[arg(long, default_value = "")]
        device: String,

        /// Mailbox address, overriding the device mapping
        #[arg(long)]
        email: Option<String>,
    },
    /// Show the latest sign-in mail for a mailbox
    Inbox {
        /// Device identity used to pick the mailbox
        #[arg(long, default_value = "")]
        device: String,

        /// Mailbox address, overriding the device mapping
        #[arg(long)]
        email: Option<String>,

        /// How many messages to show
        #[arg(long, default_value = "5")]
        limit: u32,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Perform OAuth authentication and print tokens
    Auth {
        #[arg(long, value_enum)]
        service: ServiceKind,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Signin { device, email }) => {
            signin::run(&device, email.as_deref()).await?;
        }
        Some(Command::Inbox {
            device,
            email,
            limit,
        }) => {
            inbox::run(&device, email.as_deref(), limit).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Auth { service }) => {
            auth::run(service).await?;
        }
        None => {}
    }

    Ok(())
}
