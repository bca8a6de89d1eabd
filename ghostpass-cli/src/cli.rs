use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ghostpass",
    version,
    about = "Ghost Pass CLI: mint, present and scan ephemeral QR passes",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,
}

/// Where passes are minted or checked
#[derive(Args, Debug, Clone, Default)]
pub struct AuthorityArgs {
    /// Issuer/verifier base URL (uses config default if not specified)
    #[arg(long, env = "GHOSTPASS_SERVER")]
    pub server: Option<String>,

    /// Server port
    #[arg(long, env = "GHOSTPASS_PORT")]
    pub port: Option<u16>,

    /// Bearer session credential
    #[arg(long, env = "GHOSTPASS_SESSION", hide_env_values = true)]
    pub session: Option<String>,

    /// Path to a PEM CA certificate for the server
    #[arg(long, env = "GHOSTPASS_CA")]
    pub ca: Option<PathBuf>,

    /// Mint locally with this private key instead of calling a server
    #[arg(long, env = "GHOSTPASS_AUTHORITY_KEY", conflicts_with = "server")]
    pub key: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an Ed25519 root key pair for a local authority
    Keygen {
        /// Where to write the private key; the public key goes next to it
        /// with a `.pub` suffix
        #[arg(short, long, default_value = "ghostpass.pem")]
        out: PathBuf,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Mint a single pass
    Issue {
        /// Subject (wallet holder) to issue for
        #[arg(short, long)]
        subject: String,

        /// Capability flag, e.g. `health=true`; repeatable
        #[arg(short = 'p', long = "permission", value_name = "NAME=BOOL")]
        permissions: Vec<String>,

        /// Output only the QR payload (useful for piping into `scan`)
        #[arg(long)]
        payload_only: bool,

        #[command(flatten)]
        authority: AuthorityArgs,
    },

    /// Show a live, rotating pass in the terminal
    Present {
        /// Subject (wallet holder) to present
        #[arg(short, long)]
        subject: String,

        /// Capability flag, e.g. `health=true`; repeatable
        #[arg(short = 'p', long = "permission", value_name = "NAME=BOOL")]
        permissions: Vec<String>,

        /// Stop after this many passes have been shown
        #[arg(long)]
        rotations: Option<usize>,

        #[command(flatten)]
        authority: AuthorityArgs,
    },

    /// Verify QR payloads at the door
    Scan {
        /// Payload to scan; reads one payload per line from stdin if omitted
        payload: Option<String>,

        /// Ring the terminal bell on each outcome
        #[arg(long)]
        bell: bool,

        #[command(flatten)]
        authority: AuthorityArgs,
    },

    /// Check a pass offline: signature and validity window only
    Verify {
        /// The opaque pass token
        token: String,

        /// Issuer public key, PEM or `ed25519/<hex>`
        #[arg(long, env = "GHOSTPASS_PUBLIC_KEY", conflicts_with = "public_key_file")]
        public_key: Option<String>,

        /// Path to a PEM public key file
        #[arg(long, conflicts_with = "public_key")]
        public_key_file: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create a configuration file with defaults
    Init {
        /// Overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key to get (omit to show all)
        key: Option<String>,
    },

    /// Show the configuration file path
    Path,
}
