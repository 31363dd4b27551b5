use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "notevault",
    bin_name = "notevault",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Markdown vault with automatic git backups", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// App data directory (defaults to $NOTEVAULT_DATA, then the OS data dir)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Print JSON instead of formatted text
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Do not wait for a pending backup before exiting
    #[arg(long, global = true, help_heading = "Options")]
    pub no_backup: bool,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes
    #[command(alias = "ls", display_order = 1)]
    List {
        /// Only notes in this notebook
        #[arg(long, short)]
        notebook: Option<String>,
    },

    /// Print a note's Markdown
    #[command(alias = "cat", display_order = 2)]
    Show {
        /// Note path, with or without `.md`
        path: String,
    },

    /// Create or replace a note (reads stdin unless --file is given)
    #[command(display_order = 3)]
    Write {
        /// Note path, with or without `.md`
        path: String,

        /// Read the Markdown from this file
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Delete notes
    #[command(alias = "rm", display_order = 4)]
    Remove {
        /// Note paths
        #[arg(required = true, num_args = 1..)]
        paths: Vec<String>,
    },

    /// Duplicate a note, copying its attachments
    #[command(alias = "cp", display_order = 5)]
    Copy {
        /// Source note path
        source: String,
        /// Target note path
        target: String,
    },

    /// Store a file as an attachment of a note and print its link
    #[command(display_order = 6)]
    Attach {
        /// Note path the attachment belongs to
        note: String,

        /// File to attach
        file: PathBuf,

        /// Stored file name (defaults to the file's own name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Rebuild the index from the Markdown files
    #[command(display_order = 7)]
    Reindex,

    /// Git backup status and control
    #[command(display_order = 8)]
    Backup {
        #[command(subcommand)]
        action: Option<BackupAction>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum BackupAction {
    /// Show backup state (default)
    Status,
    /// Commit the vault now
    Now,
    /// Turn automatic backups on
    Enable,
    /// Turn automatic backups off
    Disable,
}
