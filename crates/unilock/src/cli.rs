//! Clap derive structures for the `unilock` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unilock -- watch and unlock UniFi Access doors
#[derive(Debug, Parser)]
#[command(
    name = "unilock",
    version,
    about = "Watch and unlock UniFi Access doors from the command line",
    long_about = "Mirrors the state of UniFi Access hubs and readers over the developer API.\n\n\
        Devices are discovered over HTTPS; live lock, door and sensor state\n\
        arrives on the hub's notification stream.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "UNILOCK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub URL (overrides profile)
    #[arg(long, env = "UNILOCK_HUB", global = true)]
    pub hub: Option<String>,

    /// Developer API token
    #[arg(long, env = "UNILOCK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UNILOCK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "UNILOCK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "UNILOCK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover devices and show their state
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show the hub's door listing
    Doors,

    /// Remote-unlock a door
    Unlock(UnlockArgs),

    /// Stream live state changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Show a single device by ID
    pub id: Option<String>,
}

// ── Unlock ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UnlockArgs {
    /// Door ID to unlock
    #[arg(required_unless_present = "device", conflicts_with = "device")]
    pub door_id: Option<String>,

    /// Unlock the door this device is mounted on
    #[arg(long)]
    pub device: Option<String>,

    /// Seconds to wait for the hub to report the device's door
    #[arg(long, default_value = "10")]
    pub wait: u64,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also print the full device record after every event
    #[arg(long)]
    pub snapshots: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the current configuration (tokens masked)
    Show,

    /// Create or replace a profile (takes the URL from --hub)
    Init {
        /// Read the token from this environment variable instead of storing it
        #[arg(long, conflicts_with = "plaintext")]
        token_env: Option<String>,

        /// Store the token in the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },

    /// Store a profile's token in the system keyring
    SetToken {
        /// Profile to update (defaults to the active profile)
        profile: Option<String>,
    },
}
