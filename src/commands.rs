use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sd-uploader")]
#[command(about = "Uploads new photos from removable storage to a network share", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch for the card and upload on every insertion (default)
    Watch,
    /// Run one upload session now
    Upload,
    /// List uploads interrupted mid-transfer
    InFlight,
    /// Forget every uploaded fingerprint
    ResetLedger,
    /// Print local free space, pending upload size and share free space
    Storage,
    /// Print configuration values
    PrintConfig,
    /// Write Config.toml with default values if it does not exist
    WriteDefaultConfig,
}
