use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chilib",
    about = "Chili B. - a calm, low-friction background wellness copilot",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate and print today's protocol
    Protocol {
        /// Last night's sleep, in hours
        #[arg(long)]
        sleep_hours: Option<f64>,
        /// Number of meetings on today's calendar
        #[arg(long)]
        meetings: Option<u32>,
        /// Extra pantry items for this run, on top of the stored list
        /// (repeatable or comma-separated)
        #[arg(long, value_delimiter = ',')]
        pantry: Vec<String>,
        /// Skip the gateway entirely and use the local generator
        #[arg(long)]
        offline: bool,
        /// Gateway base URL (defaults to the configured host/port)
        #[arg(long)]
        gateway: Option<String>,
    },
    /// One chat turn with Chili B.
    Chat {
        message: String,
        /// Stream the reply as it arrives
        #[arg(long)]
        stream: bool,
        /// Gateway base URL (defaults to the configured host/port)
        #[arg(long)]
        gateway: Option<String>,
    },
    /// Manage the stored pantry list
    Pantry {
        #[command(subcommand)]
        action: PantryAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum PantryAction {
    /// Print the stored pantry items
    List,
    /// Add an item
    Add { item: String },
    /// Remove an item
    Remove { item: String },
}
