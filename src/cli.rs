use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "twachat")]
#[command(author, version, about = "Session, realtime channel and page loaders for the Mini App chat backend", long_about = None)]
pub struct Cli {
    /// Raw init data; falls back to the TWA_INIT_DATA environment variable
    #[arg(long, global = true)]
    pub init_data: Option<String>,

    /// Config file (TOML); TWACHAT_* variables override it
    #[arg(long, global = true, default_value = crate::core::config::CONFIG_FILE)]
    pub config: String,

    /// Mirror logs into this file
    #[arg(long, global = true, env = crate::core::config::LOG_FILE_ENV)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap a session and print the resolved identity
    Whoami,

    /// Load the "chat with a match" page
    Chat {
        /// The match's user id
        match_id: String,
    },

    /// Create a chat with a match
    StartChat {
        /// The match's user id
        match_id: String,
    },

    /// Load a chat room (match + messages)
    Room {
        chat_id: i64,

        /// Page query string that may carry `match=<json>`
        #[arg(long)]
        query: Option<String>,
    },

    /// List the user's chats
    Chats,

    /// Delete a chat
    DeleteChat { chat_id: i64 },

    /// Keep a realtime channel open and print events; re-bootstraps on close
    Listen,

    /// Post a message through the realtime channel
    Send { chat_id: i64, text: String },

    /// Check the init data signature with the bot token
    Verify {
        #[arg(long, env = "BOT_TOKEN")]
        bot_token: String,

        /// Reject init data older than this many seconds
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
