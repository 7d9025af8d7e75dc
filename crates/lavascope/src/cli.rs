//! Clap derive structures for the `lavascope` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use lavascope_core::{IpType, ProtocolChoice, SourceType};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lavascope -- manage Vultr firewall groups and rules
#[derive(Debug, Parser)]
#[command(
    name = "lavascope",
    version,
    about = "Manage Vultr firewall groups and rules from the command line",
    long_about = "Lists, creates, updates and deletes Vultr firewall groups and their rules.\n\n\
        Mutations are applied optimistically and rolled back if the API rejects them.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "LAVASCOPE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "LAVASCOPE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Vultr API key
    #[arg(long, env = "LAVASCOPE_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LAVASCOPE_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in milliseconds (overrides profile)
    #[arg(long, env = "LAVASCOPE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Outbound proxy URL (http, https or socks5; overrides profile)
    #[arg(long, env = "LAVASCOPE_PROXY", global = true)]
    pub proxy: Option<String>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Manage firewall groups
    #[command(alias = "g")]
    Groups(GroupsArgs),

    /// Manage rules inside a firewall group
    #[command(alias = "r")]
    Rules(RulesArgs),

    /// Show this machine's public IP address
    MyIp(MyIpArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Groups ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Subcommand)]
pub enum GroupsCommand {
    /// List firewall groups
    #[command(alias = "ls")]
    List {
        /// Keep running and reprint whenever the group list changes
        #[arg(long, short = 'w')]
        watch: bool,
    },

    /// Show one group with its rules
    Get {
        /// Group ID
        id: String,
    },

    /// Create a firewall group
    Create {
        /// Group description
        description: String,
    },

    /// Change a group's description
    Update {
        /// Group ID
        id: String,

        /// New description
        description: String,
    },

    /// Delete a firewall group and all its rules
    #[command(alias = "rm")]
    Delete {
        /// Group ID
        id: String,
    },
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List the rules of a group
    #[command(alias = "ls")]
    List {
        /// Group ID
        group: String,
    },

    /// Show one rule
    Get {
        /// Group ID
        group: String,

        /// Rule ID
        rule: u64,
    },

    /// Add a rule to a group
    Create(RuleCreateArgs),

    /// Delete a rule from a group
    #[command(alias = "rm")]
    Delete {
        /// Group ID
        group: String,

        /// Rule ID
        rule: u64,
    },
}

#[derive(Debug, Args)]
pub struct RuleCreateArgs {
    /// Group ID
    pub group: String,

    /// IP family (v4, v6)
    #[arg(long, default_value = "v4")]
    pub ip_type: IpType,

    /// Protocol or named service (ssh, http, https, http3, mysql,
    /// postgresql, dns-udp, dns-tcp, ms-rdp, icmp, tcp, udp, gre, esp, ah)
    #[arg(long, default_value = "ssh")]
    pub protocol: ProtocolChoice,

    /// Port or range; defaults to the service's port
    #[arg(long, default_value = "")]
    pub port: String,

    /// Traffic source (anywhere, my-ip, custom, cloudflare, load-balancer)
    #[arg(long, default_value = "anywhere")]
    pub source: SourceType,

    /// Address[/mask] for custom sources, or the load balancer ID
    #[arg(long, default_value = "")]
    pub subnet: String,

    /// Free-form note
    #[arg(long, default_value = "")]
    pub notes: String,
}

// ── My IP ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MyIpArgs {
    /// Look up the IPv6 address instead of IPv4
    #[arg(long, short = '6')]
    pub ipv6: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the loaded configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Store an API key for the active profile
    SetToken {
        /// Write the key into the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
