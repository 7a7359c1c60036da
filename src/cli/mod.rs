mod folder;
mod token;

use std::path::PathBuf;

use anyhow::Result;
use bmagent::{
    config::Config,
    repository::{Flag, SequenceSet},
    store::SqliteStore,
};
use clap::Subcommand;
use log::debug;

use crate::cli::{
    folder::{ack, add, expunge, list, list_folders, set_flags},
    token::AckToken,
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all folders with their message counts
    Folders,
    /// Print the messages of a folder selected by a message set like `1:4,7,9:*`
    List {
        folder: String,
        set: SequenceSet,
        /// Interpret the set as uids instead of sequence numbers
        #[arg(long)]
        uid: bool,
    },
    /// Store a new message
    Add {
        folder: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "")]
        subject: String,
        /// File holding the body, `-` for stdin
        body: PathBuf,
    },
    /// Replace the flags of a message
    Flag {
        folder: String,
        uid: u64,
        /// Flags like `\Seen` or `\Deleted`
        flags: Vec<Flag>,
    },
    /// Remove all messages flagged `\Deleted`
    Expunge { folder: String },
    /// Mark the message expecting this hex encoded acknowledgment as acknowledged
    Ack { folder: String, token: AckToken },
}

impl Command {
    /// Folder the command works on, if it is about a single one.
    pub fn folder(&self) -> Option<&str> {
        match self {
            Command::Folders => None,
            Command::List { folder, .. }
            | Command::Add { folder, .. }
            | Command::Flag { folder, .. }
            | Command::Expunge { folder }
            | Command::Ack { folder, .. } => Some(folder),
        }
    }
}

pub fn run(command: Command, config: &Config) -> Result<()> {
    debug!("opening store in {}", config.statedir().display());
    let store = SqliteStore::open(config.statedir())?;

    match command {
        Command::Folders => list_folders(&store, config),
        Command::List { folder, set, uid } => list(&store, config, &folder, &set, uid),
        Command::Add {
            folder,
            from,
            to,
            subject,
            body,
        } => add(&store, config, &folder, from, to, &subject, &body),
        Command::Flag { folder, uid, flags } => set_flags(&store, config, &folder, uid, &flags),
        Command::Expunge { folder } => expunge(&store, config, &folder),
        Command::Ack { folder, token } => ack(&store, config, &folder, &token),
    }
}
