//! Vibefront CLI - block authoring tools.
//!
//! # Usage
//!
//! ```bash
//! # Validate a vibe-code source file
//! vf-cli validate block.js
//!
//! # Validate and print the full report as JSON
//! vf-cli validate block.js --json
//!
//! # Render a source file against the demo storefront
//! vf-cli render block.js --device mobile --user-type customer
//!
//! # Render with a block config record
//! vf-cli render block.js --config config.json
//! ```
//!
//! # Commands
//!
//! - `validate` - Run the code validator over a source file
//! - `render` - Execute a source file in the sandbox against demo data

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vibefront_core::types::{DeviceClass, UserType};

mod commands;

#[derive(Parser)]
#[command(name = "vf-cli")]
#[command(author, version, about = "Vibefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a vibe-code source file
    Validate {
        /// Path to the source file
        file: PathBuf,

        /// Print the full validation report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a vibe-code source file against the demo storefront
    Render {
        /// Path to the source file
        file: PathBuf,

        /// Path to a JSON file used as the block's config record
        #[arg(long)]
        config: Option<PathBuf>,

        /// Visitor device class (`desktop`, `tablet`, `mobile`)
        #[arg(long, default_value = "desktop")]
        device: String,

        /// Visitor user type (`guest`, `customer`)
        #[arg(long = "user-type", default_value = "guest")]
        user_type: String,
    },
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
        Commands::Validate { file, json } => commands::validate::run(&file, json).await?,
        Commands::Render {
            file,
            config,
            device,
            user_type,
        } => {
            let device = parse_device(&device)?;
            let user_type = parse_user_type(&user_type)?;
            commands::render::run(&file, config.as_deref(), device, user_type).await?;
        }
    }
    Ok(())
}

fn parse_device(value: &str) -> Result<DeviceClass, String> {
    match value {
        "desktop" => Ok(DeviceClass::Desktop),
        "tablet" => Ok(DeviceClass::Tablet),
        "mobile" => Ok(DeviceClass::Mobile),
        other => Err(format!(
            "unknown device '{other}' (expected desktop, tablet, or mobile)"
        )),
    }
}

fn parse_user_type(value: &str) -> Result<UserType, String> {
    match value {
        "guest" => Ok(UserType::Guest),
        "customer" => Ok(UserType::Customer),
        other => Err(format!(
            "unknown user type '{other}' (expected guest or customer)"
        )),
    }
}
