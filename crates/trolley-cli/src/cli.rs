use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "trolley")]
#[command(about = "Shared shopping lists that keep working offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the list database and the offline cache
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Configuration profile to use
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Act as if the network were unreachable
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show every list you own or that was shared with you
    #[command(alias = "ls")]
    Lists {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a new list
    #[command(alias = "new")]
    Create {
        /// List name
        name: String,
        /// Comma-separated items ("Milk, Eggs, Bread")
        items: String,
        /// Include this list in share notifications
        #[arg(long)]
        public: bool,
    },
    /// Rename a list or replace its items
    Edit {
        /// List ID prefix or exact name
        list: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New comma-separated items; checked state is kept for names that stay
        #[arg(long)]
        items: Option<String>,
    },
    /// Delete a list you own
    Delete {
        /// List ID prefix or exact name
        list: String,
    },
    /// Give another user access to a list you own
    Share {
        /// List ID prefix or exact name
        list: String,
        /// E-mail address or user ID
        target: String,
        /// E-mail the target about your public lists
        #[arg(long)]
        notify: bool,
    },
    /// Check or uncheck an item
    Toggle {
        /// List ID prefix or exact name
        list: String,
        /// Item number as shown by `trolley lists` (starting at 1)
        item: usize,
    },
    /// Follow your lists live until interrupted
    Watch {
        /// Seconds between pulls from the remote database
        #[arg(long, default_value = "15")]
        refresh_secs: u64,
    },
    /// Configure endpoints and keys
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign up, sign in, and sign out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Turso database URL for the shared list database
        #[arg(long, value_name = "URL")]
        database_url: Option<String>,
        /// Turso database auth token
        #[arg(long, value_name = "TOKEN")]
        database_auth_token: Option<String>,
        /// Notification API base URL
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Keep the current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the effective configuration (secrets redacted)
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Name shown in share notifications
        #[arg(long, value_name = "NAME")]
        display_name: Option<String>,
    },
    /// Sign in with e-mail and password and store the session in the keychain
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Name shown in share notifications
        #[arg(long, value_name = "NAME")]
        display_name: Option<String>,
    },
    /// Show who is signed in
    Status,
    /// Sign out and clear the stored session
    Logout,
}
