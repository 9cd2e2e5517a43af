//! zonesync CLI
//!
//! Command-line tools for exploring the zonesync engine.
//!
//! # Commands
//!
//! - `demo` - Run a scripted two-device sync against the in-memory store
//! - `classify` - Show how a remote error code is handled

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// zonesync command-line tools.
#[derive(Parser)]
#[command(name = "zonesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted two-device sync against the in-memory store
    Demo {
        /// Well-known zone name
        #[arg(short, long, default_value = "todos")]
        zone: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the retry strategy for a remote error code
    Classify {
        /// Error code, by name (`zone_busy`) or number (`23`)
        code: String,

        /// Treat programming errors as fatal
        #[arg(short, long)]
        strict: bool,

        /// Suggested retry delay in seconds
        #[arg(short, long)]
        retry_after: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List every remote error code with its strategy
    Codes {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Demo { zone, format } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::demo::run(&zone, &format))?;
        }
        Commands::Classify {
            code,
            strict,
            retry_after,
            format,
        } => {
            commands::classify::run(&code, strict, retry_after, &format)?;
        }
        Commands::Codes { format } => {
            commands::classify::list(&format)?;
        }
        Commands::Version => {
            println!("zonesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
